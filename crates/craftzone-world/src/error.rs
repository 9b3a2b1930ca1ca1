//! Error types for the `craftzone-world` crate.

use craftzone_types::{AgentId, FixtureId, ZoneId};

/// Errors from simulated world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The agent is not in the world.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// The zone does not exist.
    #[error("zone not found: {0}")]
    ZoneNotFound(ZoneId),

    /// No structure carries this fixture.
    #[error("fixture not found: {0}")]
    FixtureNotFound(FixtureId),

    /// A starting world could not be laid out.
    #[error("invalid world layout: {reason}")]
    InvalidLayout {
        /// What is wrong with the layout.
        reason: String,
    },
}
