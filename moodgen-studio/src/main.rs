//! moodgen-studio - mood-to-music web service
//!
//! Turns a free-text mood description into a generated music clip, with
//! optional harmonic enhancement of stored clips.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use moodgen_common::config::{self, LoggingConfig, RootFolderInitializer, TomlConfig};
use moodgen_studio::services::{
    retention, AudioEnhancer, FileStore, GeminiClassifier, HttpMusicGenerator, ModelGate, MusicGenerator,
    RetentionPolicy,
};
use moodgen_studio::AppState;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "moodgen-studio")]
#[command(about = "Mood-to-music generation service")]
#[command(version)]
struct Args {
    /// TOML config file (defaults to ~/.config/moodgen/moodgen-studio.toml)
    #[arg(short, long, global = true, env = "MOODGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for generated audio and the catalog database
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Generate a single clip and write it to a file
    Generate {
        #[arg(short, long)]
        prompt: String,

        /// Clip length in seconds
        #[arg(short, long, default_value_t = 20.0)]
        duration: f64,

        #[arg(short, long, default_value = "output.wav")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(config::default_config_path);
    let mut toml_config = match &config_path {
        Some(path) => config::load_toml_config(path)?,
        None => TomlConfig::default(),
    };
    toml_config.apply_env_overrides();

    init_tracing(&toml_config.logging)?;

    info!("Starting moodgen-studio v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Build: {} ({}) built {}",
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);

    match args.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            if let Some(port) = port {
                toml_config.port = port;
            }
            serve(toml_config, root_folder).await
        }
        Command::Generate {
            prompt,
            duration,
            output,
        } => generate_once(toml_config, root_folder, &prompt, duration, &output).await,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "moodgen_studio={level},moodgen_common={level},tower_http={level}",
            level = logging.level
        ))
    });

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}

/// Open the root folder, catalog and collaborators; start loading the model
async fn build_state(toml_config: &TomlConfig, root_folder: PathBuf) -> Result<AppState> {
    info!("Root folder: {}", root_folder.display());
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let pool = moodgen_common::db::init_database_pool(&db_path)
        .await
        .context("Failed to open catalog database")?;

    let store = Arc::new(FileStore::new(pool, initializer.audio_dir()));

    let api_key = config::resolve_classifier_api_key(&toml_config.classifier)?;
    let classifier = Arc::new(
        GeminiClassifier::new(&toml_config.classifier, api_key).context("Failed to create classifier client")?,
    );

    let model_gate = Arc::new(ModelGate::new());
    let generator_config = toml_config.generator.clone();
    info!("Music generator endpoint: {}", generator_config.endpoint);
    model_gate.spawn_load(async move {
        let generator = HttpMusicGenerator::connect(&generator_config).await?;
        Ok(Arc::new(generator) as Arc<dyn MusicGenerator>)
    });

    let enhancer = AudioEnhancer::new(toml_config.enhancer.pre_emphasis);
    Ok(AppState::new(store, classifier, model_gate, enhancer))
}

async fn serve(toml_config: TomlConfig, root_folder: PathBuf) -> Result<()> {
    let state = build_state(&toml_config, root_folder).await?;

    let policy = RetentionPolicy::from(&toml_config.retention);
    let sweeper = retention::spawn_sweeper(
        Arc::clone(&state.store),
        policy,
        toml_config.retention.sweep_interval(),
    );

    let app = moodgen_studio::build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let ip: std::net::IpAddr = toml_config
        .host
        .parse()
        .with_context(|| format!("Invalid host address: {}", toml_config.host))?;
    let addr = SocketAddr::new(ip, toml_config.port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("Server shutdown complete");
    Ok(())
}

async fn generate_once(
    toml_config: TomlConfig,
    root_folder: PathBuf,
    prompt: &str,
    duration: f64,
    output: &Path,
) -> Result<()> {
    let state = build_state(&toml_config, root_folder).await?;

    info!("Generating music for prompt: {}", prompt);
    let outcome = state
        .orchestrator
        .generate(prompt, duration)
        .await
        .context("Generation failed")?;

    tokio::fs::copy(&outcome.stored.path, output)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let c = &outcome.classification;
    println!("Classification:");
    println!("  Genre: {}", c.genre);
    println!("  Mood:  {}", c.mood);
    println!("  Tempo: {}", c.tempo);
    println!("Prompt: {}", outcome.prompt);
    println!(
        "Saved {} ({:.1} s, {} tokens) to {}",
        outcome.stored.identifier,
        outcome.effective_duration,
        outcome.max_new_tokens,
        output.display()
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
