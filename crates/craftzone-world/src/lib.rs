//! Simulated host world for the Craftzone capability tracker.
//!
//! The tracker core never touches game objects directly; it talks to a host
//! through the collaborator traits in `craftzone-types`. This crate is an
//! in-memory host that implements all of them, used by the engine binary
//! and by the core's tests.
//!
//! # Modules
//!
//! - [`error`] -- Error types for world operations.
//! - [`sim`] -- [`SimWorld`]: agents, zones, structures, craft queues, and
//!   the record of everything the tracker published.
//! - [`starting_world`] -- Default four-base layout with seeded agents.

pub mod error;
pub mod sim;
pub mod starting_world;

// Re-export primary types at crate root.
pub use error::WorldError;
pub use sim::{AGENT_HALF_EXTENTS, FIXTURE_HALF_EXTENTS, SimWorld, WORLD_HALF_SIZE};
pub use starting_world::{StartingBase, StartingWorld, WorldLayout, create_starting_world};
