//! Background sweeper enforcing the retention policy

use super::file_store::{FileStore, RetentionPolicy};
use chrono::Utc;
use moodgen_common::config::RetentionConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            ttl: config.ttl(),
            max_files: config.max_files,
        }
    }
}

/// Purge every `interval`, starting immediately
pub fn spawn_sweeper(store: Arc<FileStore>, policy: RetentionPolicy, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            ttl_secs = policy.ttl.map(|d| d.as_secs()),
            max_files = policy.max_files,
            interval_secs = interval.as_secs(),
            "Retention sweeper started"
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = store.purge(&policy, Utc::now()).await {
                tracing::warn!(error = %e, "Retention sweep failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use moodgen_common::Waveform;

    #[test]
    fn test_policy_from_config() {
        let policy = RetentionPolicy::from(&RetentionConfig::default());
        assert_eq!(policy.ttl, Some(Duration::from_secs(24 * 3600)));
        assert_eq!(policy.max_files, Some(500));

        let disabled = RetentionConfig {
            ttl_hours: 0,
            max_files: None,
            sweep_interval_secs: 60,
        };
        let policy = RetentionPolicy::from(&disabled);
        assert_eq!(policy.ttl, None);
        assert_eq!(policy.max_files, None);
    }

    #[tokio::test]
    async fn test_sweeper_enforces_quota() {
        let dir = tempfile::tempdir().unwrap();
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        moodgen_common::db::init_tables(&pool).await.unwrap();
        let store = Arc::new(FileStore::new(pool, dir.path().to_path_buf()));

        let wave = Waveform::mono(vec![0.0; 64], 16000);
        for _ in 0..3 {
            store.save(&wave, crate::services::file_store::AudioKind::Generated).await.unwrap();
        }

        let policy = RetentionPolicy {
            ttl: None,
            max_files: Some(2),
        };
        let handle = spawn_sweeper(Arc::clone(&store), policy, Duration::from_millis(10));

        let mut remaining = store.count().await.unwrap();
        for _ in 0..100 {
            if remaining <= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            remaining = store.count().await.unwrap();
        }
        handle.abort();
        assert_eq!(remaining, 2);
    }
}
