//! progtrack - duty progress tracking and sync
//!
//! Tracks a player's progress through repeatable multi-step duties and
//! reconciles it with a remote authoritative service. In-world events
//! flow through a filtering pipeline into a local mirror; the mirror
//! serves synchronous reads without touching the network and pushes
//! writes to the service through a cooldown gate and a short-TTL
//! response cache.
//!
//! # Modules
//!
//! - [`events`] - inbound event types and the broadcast bus
//! - [`tracker`] - event filtering pipeline and session state
//! - [`mirror`] - local completion/progress state, remote reconciliation
//! - [`gateway`] - progress service client (HTTP + caching wrapper)
//! - [`cooldown`] - per-class minimum-interval gating
//! - [`cache`] - TTL cache of remote query results
//! - [`lookup`] - duty catalog reference data
//! - [`config`] - configuration types and loading

pub mod cache;
pub mod cli;
pub mod config;
pub mod cooldown;
pub mod domain;
pub mod events;
pub mod gateway;
pub mod lookup;
pub mod mirror;
pub mod tracker;

// Re-export commonly used types
pub use cache::{CacheKey, CachedValue, ResponseCache};
pub use config::Config;
pub use cooldown::{CooldownGate, GateConfig, GateDecision, OpClass, Throttled};
pub use domain::{ActionId, DutyDescriptor, DutyId, DutyKind, LocationId, ProgPoint};
pub use events::{ActorInfo, EventBus, GameEvent};
pub use gateway::{BulkOutcome, CachedProgress, HttpProgressClient, ProgressClient, RemoteError};
pub use lookup::{DutyLookup, StaticDutyLookup};
pub use mirror::{BulkReport, LocalCompletion, ProgressMirror, RefreshStats, SyncError};
pub use tracker::{ActionTracker, TrackerPolicy};
