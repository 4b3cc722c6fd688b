//! Persistent store for generated and enhanced clips
//!
//! WAV files live flat in the audio directory; the `audio_files` table
//! catalogs them. Identifiers double as file names:
//! `<kind>_<8 lowercase hex>.wav`. Anything else is rejected before it can
//! reach the filesystem.

use super::wav_codec::{self, WavError};
use chrono::{DateTime, SecondsFormat, Utc};
use moodgen_common::Waveform;
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

const IDENTIFIER_HEX_LEN: usize = 8;
const WAV_EXTENSION: &str = ".wav";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Audio file not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wav(#[from] WavError),

    #[error("Storage task failed: {0}")]
    Task(String),
}

/// Origin of a stored clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioKind {
    Generated,
    Harmonized,
    Reharmonized,
}

impl AudioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioKind::Generated => "generated",
            AudioKind::Harmonized => "harmonized",
            AudioKind::Reharmonized => "reharmonized",
        }
    }
}

impl fmt::Display for AudioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generated" => Ok(AudioKind::Generated),
            "harmonized" => Ok(AudioKind::Harmonized),
            "reharmonized" => Ok(AudioKind::Reharmonized),
            other => Err(format!("unknown audio kind: {}", other)),
        }
    }
}

/// Fresh identifier for `kind`
pub fn new_identifier(kind: AudioKind) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}_{}{}", kind.as_str(), &hex[..IDENTIFIER_HEX_LEN], WAV_EXTENSION)
}

/// Kind encoded in a well-formed identifier, `None` otherwise
pub fn parse_identifier(identifier: &str) -> Option<AudioKind> {
    let stem = identifier.strip_suffix(WAV_EXTENSION)?;
    let (kind, hex) = stem.rsplit_once('_')?;
    let hex_ok = hex.len() == IDENTIFIER_HEX_LEN
        && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !hex_ok {
        return None;
    }
    kind.parse().ok()
}

/// Catalog row for a stored clip
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAudioFile {
    pub identifier: String,
    pub kind: AudioKind,
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: u64,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Limits enforced by [`FileStore::purge`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionPolicy {
    /// Maximum age; `None` keeps files regardless of age
    pub ttl: Option<Duration>,
    /// Maximum number of files; oldest go first
    pub max_files: Option<usize>,
}

/// Files removed by a purge pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub expired: usize,
    pub over_quota: usize,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.expired + self.over_quota
    }
}

/// SQLite-cataloged WAV store
pub struct FileStore {
    pool: SqlitePool,
    audio_dir: PathBuf,
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl FileStore {
    pub fn new(pool: SqlitePool, audio_dir: PathBuf) -> Self {
        Self { pool, audio_dir }
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    /// Persist `waveform` under a new identifier
    pub async fn save(&self, waveform: &Waveform, kind: AudioKind) -> Result<StoredAudioFile, StoreError> {
        tokio::fs::create_dir_all(&self.audio_dir).await?;

        let identifier = new_identifier(kind);
        let path = self.audio_dir.join(&identifier);
        let partial = self.audio_dir.join(format!("{}.part", identifier));

        write_atomically(waveform, &partial, &path).await?;

        let created_at = Utc::now();
        let stored = StoredAudioFile {
            identifier,
            kind,
            sample_rate: waveform.sample_rate(),
            channels: waveform.channel_count(),
            frames: waveform.frames() as u64,
            path,
            created_at,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO audio_files (identifier, kind, sample_rate, channels, frames, path, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stored.identifier)
        .bind(kind.as_str())
        .bind(stored.sample_rate as i64)
        .bind(stored.channels as i64)
        .bind(stored.frames as i64)
        .bind(stored.path.to_string_lossy().to_string())
        .bind(format_timestamp(&created_at))
        .execute(&self.pool)
        .await;

        if let Err(e) = inserted {
            // Do not leave an uncataloged file behind
            let _ = tokio::fs::remove_file(&stored.path).await;
            return Err(e.into());
        }

        info!(
            identifier = %stored.identifier,
            kind = %kind,
            frames = stored.frames,
            sample_rate = stored.sample_rate,
            "Stored audio file"
        );
        Ok(stored)
    }

    /// Catalog entry for `identifier`, verified to exist on disk
    pub async fn lookup(&self, identifier: &str) -> Result<StoredAudioFile, StoreError> {
        if parse_identifier(identifier).is_none() {
            debug!(identifier, "Rejected malformed identifier");
            return Err(StoreError::NotFound(identifier.to_string()));
        }

        let row = sqlx::query(
            "SELECT identifier, kind, sample_rate, channels, frames, path, created_at FROM audio_files WHERE identifier = ?",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;

        let stored = row_to_stored(&row)?;
        if !tokio::fs::try_exists(&stored.path).await.unwrap_or(false) {
            warn!(identifier, path = %stored.path.display(), "Cataloged file missing on disk");
            return Err(StoreError::NotFound(identifier.to_string()));
        }
        Ok(stored)
    }

    /// Path of the WAV file for streaming
    pub async fn path_of(&self, identifier: &str) -> Result<PathBuf, StoreError> {
        Ok(self.lookup(identifier).await?.path)
    }

    /// Decode a stored clip
    pub async fn load(&self, identifier: &str) -> Result<Waveform, StoreError> {
        let stored = self.lookup(identifier).await?;
        let path = stored.path.clone();
        let decoded = tokio::task::spawn_blocking(move || wav_codec::read_file(&path))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?;

        match decoded {
            Ok(waveform) => Ok(waveform),
            // File removed between lookup and read
            Err(WavError::Format(hound::Error::IoError(e))) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(identifier.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Number of cataloged files
    pub async fn count(&self) -> Result<usize, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audio_files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    /// Remove files older than the TTL, then the oldest files over quota
    pub async fn purge(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> Result<PurgeReport, StoreError> {
        let mut report = PurgeReport::default();

        // A TTL too large to represent expires nothing
        let cutoff = policy
            .ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| now.checked_sub_signed(ttl));
        if let Some(cutoff) = cutoff {
            let expired: Vec<(String, String)> =
                sqlx::query_as("SELECT identifier, path FROM audio_files WHERE created_at < ?")
                    .bind(format_timestamp(&cutoff))
                    .fetch_all(&self.pool)
                    .await?;
            for (identifier, path) in expired {
                self.remove(&identifier, Path::new(&path)).await?;
                report.expired += 1;
            }
        }

        if let Some(max_files) = policy.max_files {
            let count = self.count().await?;
            if count > max_files {
                let excess = (count - max_files) as i64;
                let oldest: Vec<(String, String)> = sqlx::query_as(
                    "SELECT identifier, path FROM audio_files ORDER BY created_at ASC, identifier ASC LIMIT ?",
                )
                .bind(excess)
                .fetch_all(&self.pool)
                .await?;
                for (identifier, path) in oldest {
                    self.remove(&identifier, Path::new(&path)).await?;
                    report.over_quota += 1;
                }
            }
        }

        if report.total() > 0 {
            info!(
                expired = report.expired,
                over_quota = report.over_quota,
                "Purged stored audio files"
            );
        }
        Ok(report)
    }

    async fn remove(&self, identifier: &str, path: &Path) -> Result<(), StoreError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        sqlx::query("DELETE FROM audio_files WHERE identifier = ?")
            .bind(identifier)
            .execute(&self.pool)
            .await?;
        debug!(identifier, "Removed audio file");
        Ok(())
    }
}

/// Write `waveform` to `partial`, then move it to `path`. The partial file is
/// removed when either step fails.
async fn write_atomically(waveform: &Waveform, partial: &Path, path: &Path) -> Result<(), StoreError> {
    let to_write = waveform.clone();
    let partial_for_task = partial.to_path_buf();
    let written = match tokio::task::spawn_blocking(move || wav_codec::write_pcm16_file(&partial_for_task, &to_write)).await
    {
        Ok(result) => result.map_err(StoreError::from),
        Err(e) => Err(StoreError::Task(e.to_string())),
    };

    let moved = match written {
        Ok(()) => tokio::fs::rename(partial, path).await.map_err(StoreError::from),
        Err(e) => Err(e),
    };

    if let Err(e) = moved {
        warn!(path = %partial.display(), error = %e, "Discarding partial audio file");
        let _ = tokio::fs::remove_file(partial).await;
        return Err(e);
    }
    Ok(())
}

fn row_to_stored(row: &sqlx::sqlite::SqliteRow) -> Result<StoredAudioFile, StoreError> {
    let identifier: String = row.try_get("identifier")?;
    let kind_str: String = row.try_get("kind")?;
    let kind = kind_str
        .parse::<AudioKind>()
        .map_err(|e: String| StoreError::Database(sqlx::Error::Decode(e.into())))?;
    let created_at_str: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;
    let path: String = row.try_get("path")?;

    Ok(StoredAudioFile {
        identifier,
        kind,
        sample_rate: row.try_get::<i64, _>("sample_rate")? as u32,
        channels: row.try_get::<i64, _>("channels")? as u16,
        frames: row.try_get::<i64, _>("frames")? as u64,
        path: PathBuf::from(path),
        created_at,
    })
}

#[cfg(test)]
impl FileStore {
    /// Backdate a catalog entry
    pub(crate) async fn set_created_at(&self, identifier: &str, created_at: DateTime<Utc>) {
        sqlx::query("UPDATE audio_files SET created_at = ? WHERE identifier = ?")
            .bind(format_timestamp(&created_at))
            .bind(identifier)
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store(dir: &Path) -> FileStore {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        moodgen_common::db::init_tables(&pool).await.unwrap();
        FileStore::new(pool, dir.join("generated"))
    }

    #[test]
    fn test_identifier_format() {
        for kind in [AudioKind::Generated, AudioKind::Harmonized, AudioKind::Reharmonized] {
            let id = new_identifier(kind);
            assert!(id.starts_with(kind.as_str()));
            assert!(id.ends_with(".wav"));
            assert_eq!(id.len(), kind.as_str().len() + 1 + 8 + 4);
            assert_eq!(parse_identifier(&id), Some(kind));
        }
    }

    #[test]
    fn test_parse_identifier_rejects_malformed() {
        assert_eq!(parse_identifier("generated_0a1b2c3d.wav"), Some(AudioKind::Generated));
        assert_eq!(parse_identifier("generated_0A1B2C3D.wav"), None);
        assert_eq!(parse_identifier("generated_0a1b2c3.wav"), None);
        assert_eq!(parse_identifier("generated_0a1b2c3d.mp3"), None);
        assert_eq!(parse_identifier("../generated_0a1b2c3d.wav"), None);
        assert_eq!(parse_identifier("mixed_0a1b2c3d.wav"), None);
        assert_eq!(parse_identifier("generated_0a1b/c3d.wav"), None);
        assert_eq!(parse_identifier(""), None);
    }

    #[tokio::test]
    async fn test_purge_by_age() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path()).await;
        let wave = Waveform::mono(vec![0.1; 100], 16000);

        let old = store.save(&wave, AudioKind::Generated).await.unwrap();
        let fresh = store.save(&wave, AudioKind::Harmonized).await.unwrap();
        let now = Utc::now();
        store
            .set_created_at(&old.identifier, now - chrono::Duration::hours(48))
            .await;

        let policy = RetentionPolicy {
            ttl: Some(Duration::from_secs(24 * 3600)),
            max_files: None,
        };
        let report = store.purge(&policy, now).await.unwrap();

        assert_eq!(report, PurgeReport { expired: 1, over_quota: 0 });
        assert!(!old.path.exists());
        assert!(matches!(store.load(&old.identifier).await, Err(StoreError::NotFound(_))));
        assert!(store.load(&fresh.identifier).await.is_ok());
    }

    #[tokio::test]
    async fn test_purge_by_quota_removes_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path()).await;
        let wave = Waveform::mono(vec![0.1; 100], 16000);
        let now = Utc::now();

        let mut ids = Vec::new();
        for age_minutes in [30, 20, 10] {
            let stored = store.save(&wave, AudioKind::Generated).await.unwrap();
            store
                .set_created_at(&stored.identifier, now - chrono::Duration::minutes(age_minutes))
                .await;
            ids.push(stored.identifier);
        }

        let policy = RetentionPolicy {
            ttl: None,
            max_files: Some(1),
        };
        let report = store.purge(&policy, now).await.unwrap();

        assert_eq!(report, PurgeReport { expired: 0, over_quota: 2 });
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.lookup(&ids[2]).await.is_ok());
        assert!(store.lookup(&ids[0]).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_rename_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("generated_0000000a.wav.part");
        // A non-empty directory cannot be replaced by a file
        let target = dir.path().join("generated_0000000a.wav");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("occupied"), b"x").unwrap();

        let waveform = Waveform::mono(vec![0.25; 256], 16000);
        let result = write_atomically(&waveform, &partial, &target).await;

        assert!(result.is_err());
        assert!(!partial.exists());
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let partial = missing.join("generated_0000000b.wav.part");
        let target = missing.join("generated_0000000b.wav");

        let waveform = Waveform::mono(vec![0.25; 256], 16000);
        let result = write_atomically(&waveform, &partial, &target).await;

        assert!(matches!(result, Err(StoreError::Wav(_))));
        assert!(!partial.exists());
        assert!(!target.exists());
    }
}
