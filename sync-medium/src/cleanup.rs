//! Background cleanup task for expired payloads.
//!
//! Runs periodically to delete payloads that have exceeded their TTL.

use crate::sqlite::SqliteMedium;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Cleanup schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Seconds between cleanup passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Whether the task runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_enabled() -> bool {
    true
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            enabled: default_enabled(),
        }
    }
}

/// Spawn a background cleanup task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_task(medium: Arc<SqliteMedium>, config: CleanupConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Cleanup task disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!("Cleanup task started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;

            match medium.cleanup_expired().await {
                Ok(deleted) => {
                    if deleted > 0 {
                        tracing::info!("Cleanup: deleted {} expired payloads", deleted);
                    } else {
                        tracing::debug!("Cleanup: no expired payloads");
                    }
                }
                Err(e) => {
                    tracing::error!("Cleanup error: {}", e);
                }
            }
        }
    })
}
