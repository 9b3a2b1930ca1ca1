//! Zone membership tracking and capability propagation for Craftzone.
//!
//! This crate owns the incremental state that decides which capability
//! level every connected agent currently holds: per-zone fixture
//! aggregates, the bidirectional agent/zone membership relation, and the
//! time-sliced pass that re-scans every agent once per interval.
//!
//! All mutation happens on one logical thread. Host lifecycle signals go
//! through [`Tracker::handle_event`] and are applied synchronously; the
//! [`PassScheduler`] is advanced once per host tick and does a bounded
//! slice of work each time.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `craftzone-config.yaml`.
//! - [`zone`] -- [`ZoneRegistry`]: fixtures, cached aggregates, members.
//! - [`agent`] -- [`AgentIndex`]: per-agent records and membership writes.
//! - [`scanner`] -- Proximity and authorization scan, membership diff.
//! - [`propagator`] -- Effective level recompute and craft cancellation.
//! - [`scheduler`] -- [`PassScheduler`] state machine and pacing.
//! - [`shutdown`] -- [`ShutdownSignal`] shared stop flag.
//! - [`tracker`] -- [`Tracker`], the context object tying it together.

pub mod agent;
pub mod config;
pub mod propagator;
pub mod scanner;
pub mod scheduler;
pub mod shutdown;
pub mod tracker;
pub mod zone;

pub use agent::{AgentIndex, AgentRecord};
pub use config::{ConfigError, CraftzoneConfig, LoggingConfig, SimulationConfig, TrackerConfig};
pub use propagator::LevelChange;
pub use scanner::MembershipDiff;
pub use scheduler::{PassProgress, PassScheduler, PassState, PassStats};
pub use shutdown::ShutdownSignal;
pub use tracker::{SliceOutcome, Tracker};
pub use zone::{Zone, ZoneRegistry};
