//! Collaborator interfaces the tracker consumes from the host simulation.
//!
//! The tracker owns no game objects. Everything it needs to know about the
//! world (where agents stand, which structures are nearby, who is authorized
//! where, what is queued for crafting) comes through these traits, and every
//! side effect it produces (capability flags, cancellations, notices) goes
//! back out through them. A host implements all of them and receives
//! [`Host`] for free.

use serde::{Deserialize, Serialize};

use crate::events::Notice;
use crate::geometry::{Aabb, Vec3};
use crate::ids::{AgentId, OperationId, StructureId, ZoneId};
use crate::level::{CapabilityFlags, Level};

/// Permission an agent needs for the tracker to extend its range at all.
pub const USE_PERMISSION: &str = "craftzone.use";

/// Permission allowing the tracker to cancel an agent's queued crafts when
/// its level drops below what they require.
pub const CANCEL_CRAFT_PERMISSION: &str = "craftzone.cancelcraft";

/// Errors raised by host collaborators.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The operation is no longer queued for the agent.
    #[error("operation {operation} is not queued for agent {agent}")]
    OperationNotFound {
        /// The agent.
        agent: AgentId,
        /// The missing operation.
        operation: OperationId,
    },

    /// The host refused to cancel the operation.
    #[error("operation {operation} could not be cancelled: {reason}")]
    CancelRejected {
        /// The operation.
        operation: OperationId,
        /// Host-supplied explanation.
        reason: String,
    },
}

/// Which structures a spatial query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureFilter {
    /// Every structure.
    Any,
    /// Only structures that sit inside some governing zone.
    Governed,
}

/// A structure returned by [`SpatialQuery::query_nearby`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureRef {
    /// The structure.
    pub id: StructureId,
    /// Its world-space bounds.
    pub bounds: Aabb,
}

/// A deferred craft operation held by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// The operation.
    pub id: OperationId,
    /// Minimum capability level needed to finish it.
    pub required_level: Level,
}

/// Spatial primitives: agent bounds, nearby structures, governing zones.
pub trait SpatialQuery {
    /// Current bounding volume of the agent, or `None` if it has no body
    /// in the world (dead, sleeping off-map, already despawned).
    fn agent_bounds(&self, agent: AgentId) -> Option<Aabb>;

    /// Structures within `radius` meters of `center`. May return extra
    /// candidates; callers apply their own exact distance test.
    fn query_nearby(&self, center: Vec3, radius: f32, filter: StructureFilter)
    -> Vec<StructureRef>;

    /// The authorization zone dominating the structure's area, if any.
    fn governing_zone(&self, structure: StructureId) -> Option<ZoneId>;
}

/// Zone authorization lists.
pub trait AccessControl {
    /// Whether `agent` is on `zone`'s authorization list. `None` means the
    /// zone no longer has an authority and is treated as "not authorized".
    fn is_authorized(&self, zone: ZoneId, agent: AgentId) -> Option<bool>;
}

/// Per-agent permission lookups.
pub trait Permissions {
    /// Whether the agent holds the named permission.
    fn has_permission(&self, agent: AgentId, permission: &str) -> bool;
}

/// Per-agent deferred craft queues.
pub trait CraftQueue {
    /// Operations currently queued for the agent.
    fn pending_operations(&self, agent: AgentId) -> Vec<PendingOperation>;

    /// Cancel a queued operation, refunding whatever the host refunds.
    fn cancel_operation(&mut self, agent: AgentId, operation: OperationId)
    -> Result<(), HostError>;
}

/// Receives the effective capability level for an agent.
pub trait CapabilitySink {
    /// Publish a new effective level and its tier flags.
    fn apply_capability(&mut self, agent: AgentId, level: Level, flags: CapabilityFlags);
}

/// Best-effort user-facing messages.
pub trait Notifier {
    /// Show `notice` to the agent. Fire-and-forget.
    fn notify(&mut self, agent: AgentId, notice: &Notice);
}

/// Everything the tracker needs from the host.
pub trait Host:
    SpatialQuery + AccessControl + Permissions + CraftQueue + CapabilitySink + Notifier
{
}

impl<T> Host for T where
    T: SpatialQuery + AccessControl + Permissions + CraftQueue + CapabilitySink + Notifier + ?Sized
{
}
