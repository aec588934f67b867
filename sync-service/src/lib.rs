//! # sync-service
//!
//! Transfer service for cmdb-sync: configuration, startup checks and the
//! sync loops of one environment.
//!
//! ## Features
//!
//! - **TOML configuration**: every field defaulted, validated before start
//! - **Capability gate**: a destination only syncs when its platform setting
//!   enables externally assigned ids
//! - **Role wiring**: source full-sync and watchers, or destination full-sync
//!   and poller
//! - **Trigger**: start a full sync on demand
//!
//! ## Example
//!
//! ```ignore
//! use sync_service::{Collaborators, Config, TransferService};
//!
//! let config = Config::load(Path::new("transfer.toml"))?;
//! let service = TransferService::start(&config, collaborators).await?;
//! service.trigger_full_sync(None)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod service;

pub use config::{Config, ConfigError, IdRuleConfig, MediumConfig, SyncConfig};
pub use error::{Result, ServiceError};
pub use service::{id_generator_enabled, open_medium, Collaborators, ServiceState, TransferService};
