//! # threeway-app
//!
//! Application layer: the synchronization engine, its schedulers, and
//! **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that transports must implement:
//!   - `DeviceTransport`: discovery and per-device connections
//!   - `DeviceClient`: get/set binary state, read brightness
//! - Hold the in-memory state: `DeviceRegistry`, `RaceWindows`
//! - Run the use-cases:
//!   - `SyncEngine`: propagate state changes across switch groups
//!   - `DiscoveryScheduler`: front-loaded periodic discovery
//!   - `RefreshScheduler`: per-device polling with drift detection
//!   - `DebugReporter`: periodic snapshot of devices that are on
//! - Wire them together behind `Coordinator`
//!
//! ## Dependency rule
//! Depends on `threeway-domain` only (plus `tokio` for tasks, timers and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod ports;
pub mod race;
pub mod refresh;
pub mod registry;
pub mod report;
pub mod sync_engine;
