//! Lifecycle signals the host forwards to the tracker, and user-facing
//! notices the tracker sends back.

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, FixtureId, OperationId, ZoneId};
use crate::level::Level;

/// A lifecycle signal raised by the host simulation.
///
/// Every variant is handled synchronously by the tracker; none of them wait
/// for the periodic scan pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// An agent came online.
    AgentConnected {
        /// The connecting agent.
        agent: AgentId,
    },
    /// An agent went offline.
    AgentDisconnected {
        /// The departing agent.
        agent: AgentId,
    },
    /// A fixture finished building inside a zone.
    StructureBuilt {
        /// Zone governing the fixture's area.
        zone: ZoneId,
        /// The new fixture.
        fixture: FixtureId,
        /// Capability level the fixture grants.
        level: Level,
        /// Agent who placed it, when known.
        owner: Option<AgentId>,
    },
    /// A fixture was destroyed or picked up.
    StructureDestroyed {
        /// Zone the fixture belonged to.
        zone: ZoneId,
        /// The removed fixture.
        fixture: FixtureId,
    },
    /// An agent was added to a zone's authorization list.
    AuthorizationGranted {
        /// The zone.
        zone: ZoneId,
        /// The newly authorized agent.
        agent: AgentId,
    },
    /// An agent was removed from a zone's authorization list.
    AuthorizationRevoked {
        /// The zone.
        zone: ZoneId,
        /// The de-authorized agent.
        agent: AgentId,
    },
    /// A zone's authorization list was wiped.
    AuthorizationListCleared {
        /// The zone.
        zone: ZoneId,
        /// Agent who cleared the list, when known.
        cleared_by: Option<AgentId>,
    },
    /// An agent's own permissions or group memberships changed.
    PermissionChanged {
        /// The affected agent.
        agent: AgentId,
    },
    /// A group's permissions changed; every connected agent may be affected.
    GroupPermissionChanged,
    /// An agent stepped inside a fixture's direct-use trigger volume.
    DirectProximityEntered {
        /// The agent.
        agent: AgentId,
        /// Level granted by the fixture it is standing beside.
        level: Level,
    },
    /// An agent left the direct-use trigger volume.
    DirectProximityLeft {
        /// The agent.
        agent: AgentId,
    },
}

/// A message the tracker asks the host to show an agent.
///
/// Delivery is best-effort; the host decides how to render it (chat line,
/// game tip, toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    /// The agent's fixture now covers its whole zone.
    RangeExtended,
    /// Queued crafts were cancelled because the agent's level dropped.
    CraftsCancelled {
        /// The cancelled operations.
        operations: Vec<OperationId>,
        /// Level that remained after the drop.
        level: Level,
    },
}

impl core::fmt::Display for Notice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::RangeExtended => write!(
                f,
                "Your workbench range has been increased to work inside your building"
            ),
            Self::CraftsCancelled { operations, level } => write!(
                f,
                "{} queued craft(s) were cancelled: your workbench level dropped to {level}",
                operations.len()
            ),
        }
    }
}
