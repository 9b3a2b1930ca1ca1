//! Shared type definitions for the Craftzone capability tracker.
//!
//! This crate is the single source of truth for the identifiers, levels,
//! geometry, and lifecycle events exchanged between the tracker core and the
//! host simulation, along with the collaborator traits the core consumes.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`level`] -- Capability levels and tier flags
//! - [`geometry`] -- Vectors, bounding boxes, separation distance
//! - [`events`] -- Lifecycle signals from the host and notices back to it
//! - [`host`] -- Collaborator traits ([`Host`] and its parts)

pub mod events;
pub mod geometry;
pub mod host;
pub mod ids;
pub mod level;

// Re-export all public types at crate root for convenience.
pub use events::{LifecycleEvent, Notice};
pub use geometry::{Aabb, Vec3};
pub use host::{
    AccessControl, CANCEL_CRAFT_PERMISSION, CapabilitySink, CraftQueue, Host, HostError,
    Notifier, PendingOperation, Permissions, SpatialQuery, StructureFilter, StructureRef,
    USE_PERMISSION,
};
pub use ids::{AgentId, FixtureId, OperationId, StructureId, ZoneId};
pub use level::{CapabilityFlags, Level, MAX_TIER, NO_CAPABILITY};
