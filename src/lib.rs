//! # Graveyards - respawn points for a multiplayer game server
//!
//! Graveyards are named locations in a game world. When an actor dies they
//! come back at the nearest graveyard they are allowed to use, and are
//! protected from hostiles for a short time afterwards. Graveyards can be
//! hidden until an actor walks close enough to discover them.
//!
//! ## Module Organization
//!
//! - [`model`] - validated value types: names, search keys, worlds, locations, graveyards, discoveries
//! - [`store`] - SQLite persistence, proximity queries and schema migration
//! - [`tasks`] - the recurring discovery scan and per-actor safety timers
//! - [`respawn`] - respawn placement
//! - [`host`] - traits the hosting game server implements
//! - [`config`] - TOML configuration
//!
//! ## Wiring
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use graveyards::config::Config;
//! use graveyards::host::{Host, Notifier};
//! use graveyards::respawn::RespawnPlanner;
//! use graveyards::store::GraveyardStoreBuilder;
//! use graveyards::tasks::{DiscoveryScan, DiscoveryTask, SafetyManager};
//!
//! async fn wire(host: Arc<dyn Host>, notifier: Arc<dyn Notifier>) -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     // migration runs inside open(), before anything else sees the store
//!     let store = Arc::new(GraveyardStoreBuilder::new(&config.storage.db_path).open()?);
//!
//!     let scan = Arc::new(DiscoveryScan::new(store.clone(), host.clone(), notifier.clone()));
//!     let discovery = DiscoveryTask::new(scan);
//!     discovery.start(&config.discovery);
//!
//!     let safety = Arc::new(SafetyManager::new(notifier.clone(), config.safety.clone()));
//!     let planner = RespawnPlanner::new(store, host, notifier, safety);
//!     # let _ = planner;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod host;
pub mod logutil;
pub mod model;
pub mod respawn;
pub mod store;
pub mod tasks;
