//! Configuration loading and root folder resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority, applied by the binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const ENV_ROOT_FOLDER: &str = "MOODGEN_ROOT_FOLDER";
pub const ENV_PORT: &str = "MOODGEN_PORT";
pub const ENV_GEMINI_API_KEY: &str = "MOODGEN_GEMINI_API_KEY";
pub const ENV_GENERATOR_URL: &str = "MOODGEN_GENERATOR_URL";

/// Subdirectory of the root folder holding WAV files
pub const AUDIO_DIR_NAME: &str = "generated";

/// Catalog database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "moodgen.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for generated audio and the catalog database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub enhancer: EnhancerConfig,

    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Mood classifier (Gemini) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_classifier_model")]
    pub model: String,

    /// API key; `MOODGEN_GEMINI_API_KEY` takes precedence
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,
}

/// Music generator inference server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
}

/// Audio enhancer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnhancerConfig {
    /// Blend the pre-emphasized harmonic component in `harmonize`
    #[serde(default)]
    pub pre_emphasis: bool,
}

/// Lifecycle policy for stored audio files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Files older than this are purged; 0 disables age-based purge
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    /// Upper bound on stored files; oldest are purged first
    #[serde(default = "default_max_files")]
    pub max_files: Option<usize>,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5790
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_classifier_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_classifier_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_classifier_timeout_secs() -> u64 {
    30
}

fn default_generator_endpoint() -> String {
    "http://127.0.0.1:8765".to_string()
}

fn default_generator_timeout_secs() -> u64 {
    600
}

fn default_ttl_hours() -> u64 {
    24
}

fn default_max_files() -> Option<usize> {
    Some(500)
}

fn default_sweep_interval_secs() -> u64 {
    600
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            host: default_host(),
            port: default_port(),
            logging: LoggingConfig::default(),
            classifier: ClassifierConfig::default(),
            generator: GeneratorConfig::default(),
            enhancer: EnhancerConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_classifier_endpoint(),
            model: default_classifier_model(),
            api_key: None,
            timeout_secs: default_classifier_timeout_secs(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generator_endpoint(),
            timeout_secs: default_generator_timeout_secs(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            max_files: default_max_files(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl RetentionConfig {
    /// `None` when age-based purge is disabled or the TTL does not fit in seconds
    pub fn ttl(&self) -> Option<Duration> {
        if self.ttl_hours == 0 {
            return None;
        }
        self.ttl_hours.checked_mul(3600).map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl TomlConfig {
    /// Apply environment variable overrides on top of TOML values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var(ENV_PORT) {
            match port.parse::<u16>() {
                Ok(p) => self.port = p,
                Err(_) => warn!("Ignoring invalid {}={}", ENV_PORT, port),
            }
        }
        if let Ok(url) = std::env::var(ENV_GENERATOR_URL) {
            if !url.trim().is_empty() {
                self.generator.endpoint = url;
            }
        }
    }
}

/// Default configuration file location (`~/.config/moodgen/moodgen-studio.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("moodgen").join("moodgen-studio.toml"))
}

/// Load TOML configuration, falling back to defaults when the file is missing
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write configuration as TOML, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Resolve the root folder: CLI > `MOODGEN_ROOT_FOLDER` > TOML > platform default
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// OS-dependent default root folder
pub fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("moodgen"))
        .unwrap_or_else(|| PathBuf::from("./moodgen_data"))
}

/// Resolve the classifier API key: environment first, then TOML
pub fn resolve_classifier_api_key(config: &ClassifierConfig) -> Result<String> {
    let env_key = std::env::var(ENV_GEMINI_API_KEY)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = config.api_key.clone().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!("Classifier API key found in environment and TOML. Using environment.");
    }

    if let Some(key) = env_key {
        info!("Classifier API key loaded from environment variable");
        return Ok(key);
    }
    if let Some(key) = toml_key {
        info!("Classifier API key loaded from TOML config");
        return Ok(key);
    }

    Err(Error::Config(format!(
        "Classifier API key not configured. Set {} or classifier.api_key in the TOML config",
        ENV_GEMINI_API_KEY
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Creates the root folder layout on startup
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create root and audio directories if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.audio_dir())?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root_folder.join(AUDIO_DIR_NAME)
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5790);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.classifier.model, "gemini-1.5-flash");
        assert!(!config.enhancer.pre_emphasis);
        assert_eq!(config.retention.ttl(), Some(Duration::from_secs(24 * 3600)));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 6000

            [enhancer]
            pre_emphasis = true
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 6000);
        assert!(config.enhancer.pre_emphasis);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.retention.max_files, Some(500));
    }

    #[test]
    fn test_zero_ttl_disables_age_purge() {
        let retention = RetentionConfig {
            ttl_hours: 0,
            ..Default::default()
        };
        assert_eq!(retention.ttl(), None);
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let retention = RetentionConfig {
            ttl_hours: u64::MAX,
            ..Default::default()
        };
        assert_eq!(retention.ttl(), None);

        let retention = RetentionConfig {
            ttl_hours: u64::MAX / 3600,
            ..Default::default()
        };
        assert_eq!(retention.ttl(), Some(Duration::from_secs(u64::MAX / 3600 * 3600)));
    }

    #[test]
    fn test_initializer_layout() {
        let init = RootFolderInitializer::new(PathBuf::from("/srv/moodgen"));
        assert_eq!(init.audio_dir(), PathBuf::from("/srv/moodgen/generated"));
        assert_eq!(init.database_path(), PathBuf::from("/srv/moodgen/moodgen.db"));
    }
}
