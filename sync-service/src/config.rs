//! Configuration loading for the transfer service.
//!
//! Configuration is loaded from a TOML file (default: `transfer.toml`).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sync_core::{IdRuleSet, RetryPolicy, RuleError};
use sync_engine::{InnerIds, SyncSettings};
use sync_medium::CleanupConfig;
use sync_types::{IdRule, ResType, SyncRole};

/// Largest page size accepted.
pub const MAX_PAGE_SIZE: usize = 2000;

/// Root configuration of the transfer service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Sync loop configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Transfer medium configuration.
    #[serde(default)]
    pub medium: MediumConfig,
    /// Medium cleanup task configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// Id ownership rules of every source environment.
    #[serde(default)]
    pub id_rules: Vec<IdRuleConfig>,
    /// Inner container ids of the source environments, by environment name.
    #[serde(default)]
    pub inner_ids: HashMap<String, InnerIds>,
}

/// Sync loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Name of the local environment.
    #[serde(default)]
    pub env: String,
    /// Role of the local environment (default: src).
    #[serde(default = "default_role")]
    pub role: SyncRole,
    /// Run the full-sync loop (default: true).
    #[serde(default = "default_true")]
    pub enable_full_sync: bool,
    /// Run the incremental loops (default: true).
    #[serde(default = "default_true")]
    pub enable_incr_sync: bool,
    /// Seconds between two full-sync sweeps (default: 1 day).
    #[serde(default = "default_full_sync_interval")]
    pub full_sync_interval_secs: u64,
    /// TTL of the full-sync cluster lock in seconds (default: 1 hour).
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
    /// Records per page (default: 500).
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Idle pause between polls in milliseconds (default: 1000).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Changes read per watch cycle (default: 200).
    #[serde(default = "default_watch_batch_size")]
    pub watch_batch_size: usize,
    /// Attempts per step before giving up (default: 3).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Lower bound of the delay between attempts (default: 200).
    #[serde(default = "default_retry_min_delay")]
    pub retry_min_delay_ms: u64,
    /// Upper bound of the delay between attempts (default: 2000).
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

/// Transfer medium configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MediumConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
    /// Lifetime of a queued payload in seconds (default: 7 days).
    #[serde(default = "default_payload_ttl")]
    pub payload_ttl_secs: u64,
}

/// One id ownership rule.
#[derive(Debug, Clone, Deserialize)]
pub struct IdRuleConfig {
    /// Source environment owning the ids.
    pub env: String,
    /// Resource kind the rule applies to.
    pub resource: ResType,
    /// First owned id.
    pub start_id: i64,
    /// Last owned id, omitted for no upper bound.
    #[serde(default)]
    pub end_id: Option<i64>,
    /// Distance between owned ids (default: 1).
    #[serde(default = "default_step")]
    pub step: i64,
}

impl IdRuleConfig {
    fn rule(&self) -> IdRule {
        IdRule {
            start_id: self.start_id,
            end_id: self.end_id,
            step: self.step,
        }
    }
}

// Default value functions
fn default_role() -> SyncRole {
    SyncRole::Src
}

fn default_true() -> bool {
    true
}

fn default_full_sync_interval() -> u64 {
    24 * 60 * 60 // 1 day
}

fn default_lock_ttl() -> u64 {
    60 * 60 // 1 hour
}

fn default_page_size() -> usize {
    500
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_watch_batch_size() -> usize {
    200
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_min_delay() -> u64 {
    200
}

fn default_retry_max_delay() -> u64 {
    2000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("medium.db")
}

fn default_payload_ttl() -> u64 {
    7 * 24 * 60 * 60 // 7 days
}

fn default_step() -> i64 {
    1
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            env: String::new(),
            role: default_role(),
            enable_full_sync: true,
            enable_incr_sync: true,
            full_sync_interval_secs: default_full_sync_interval(),
            lock_ttl_secs: default_lock_ttl(),
            page_size: default_page_size(),
            poll_interval_ms: default_poll_interval(),
            watch_batch_size: default_watch_batch_size(),
            retry_attempts: default_retry_attempts(),
            retry_min_delay_ms: default_retry_min_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
        }
    }
}

impl Default for MediumConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            payload_ttl_secs: default_payload_ttl(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load a configuration file and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sync = &self.sync;
        if sync.env.trim().is_empty() {
            return Err(ConfigError::Invalid("sync.env must not be empty".into()));
        }
        if sync.page_size == 0 || sync.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "sync.page_size must be within [1, {}], got {}",
                MAX_PAGE_SIZE, sync.page_size
            )));
        }
        if sync.watch_batch_size == 0 {
            return Err(ConfigError::Invalid("sync.watch_batch_size must be >= 1".into()));
        }
        if sync.retry_attempts == 0 {
            return Err(ConfigError::Invalid("sync.retry_attempts must be >= 1".into()));
        }
        if sync.retry_min_delay_ms > sync.retry_max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "sync.retry_min_delay_ms ({}) exceeds sync.retry_max_delay_ms ({})",
                sync.retry_min_delay_ms, sync.retry_max_delay_ms
            )));
        }

        let rules = self.rule_set()?;
        match sync.role {
            SyncRole::Src => {
                if !rules.has_env(&sync.env) {
                    return Err(ConfigError::Invalid(format!(
                        "source {} has no id rules",
                        sync.env
                    )));
                }
            }
            SyncRole::Dest => {
                if let Some(env) = rules.envs().find(|env| !self.inner_ids.contains_key(*env)) {
                    return Err(ConfigError::Invalid(format!(
                        "no inner ids configured for source {}",
                        env
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build the validated id rule set.
    pub fn rule_set(&self) -> Result<IdRuleSet, ConfigError> {
        let mut rules = IdRuleSet::new();
        for entry in &self.id_rules {
            rules.add(&entry.env, entry.resource, entry.rule())?;
        }
        Ok(rules)
    }

    /// Settings of the sync loops.
    pub fn settings(&self) -> SyncSettings {
        let sync = &self.sync;
        let mut settings = SyncSettings::new(sync.env.clone(), sync.role);
        settings.page_size = sync.page_size;
        settings.full_sync_interval = Duration::from_secs(sync.full_sync_interval_secs.max(1));
        settings.lock_ttl = Duration::from_secs(sync.lock_ttl_secs);
        settings.poll_interval = Duration::from_millis(sync.poll_interval_ms);
        settings.watch_batch_size = sync.watch_batch_size;
        settings.retry = RetryPolicy::new(
            sync.retry_attempts,
            Duration::from_millis(sync.retry_min_delay_ms),
            Duration::from_millis(sync.retry_max_delay_ms),
        );
        settings
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// An id rule is malformed.
    #[error("invalid id rule: {0}")]
    Rule(#[from] RuleError),
    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
