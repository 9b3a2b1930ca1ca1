//! Effective capability level: compute, publish, and enforce on drops.
//!
//! An agent's effective level is the highest aggregate among its zones,
//! further maxed with any direct-proximity bonus. [`recompute`] publishes it
//! only when it differs from the last published value, so any number of
//! triggers in one tick (zone entry, exit, fixture destroyed, authorization
//! revoked) collapse into at most one visible change.
//!
//! When the level goes down, queued crafts that now need more than the
//! agent has are cancelled, provided the agent holds
//! [`CANCEL_CRAFT_PERMISSION`]. Cancellation is best-effort: a refusal from
//! the host is logged and counted, and the new level is applied regardless.

use craftzone_types::{
    AgentId, CANCEL_CRAFT_PERMISSION, CapabilityFlags, Host, Level, NO_CAPABILITY, Notice,
    OperationId,
};
use tracing::{debug, info, warn};

use crate::agent::{AgentIndex, AgentRecord};
use crate::zone::ZoneRegistry;

/// A published change to an agent's effective level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelChange {
    /// The agent.
    pub agent: AgentId,
    /// Level published before this change.
    pub previous: Level,
    /// Level published now.
    pub current: Level,
    /// Crafts cancelled because they required more than `current`.
    pub cancelled: Vec<OperationId>,
    /// Cancellations the host refused.
    pub failed_cancellations: usize,
}

impl LevelChange {
    /// Whether the level went down.
    pub const fn is_drop(&self) -> bool {
        self.current < self.previous
    }
}

/// Effective level for a record given current zone aggregates.
pub fn effective_level(record: &AgentRecord, zones: &ZoneRegistry) -> Level {
    let from_zones = record
        .zones()
        .iter()
        .map(|&zone| zones.aggregate_level(zone))
        .max()
        .unwrap_or(NO_CAPABILITY);
    record
        .direct_bonus()
        .map_or(from_zones, |bonus| from_zones.max(bonus))
}

/// Recompute and, if it changed, publish the agent's effective level.
///
/// Returns `None` when the agent is untracked or the level is unchanged;
/// in both cases nothing is published and nothing is cancelled.
pub fn recompute<H>(
    zones: &ZoneRegistry,
    agents: &mut AgentIndex,
    host: &mut H,
    agent: AgentId,
    notify_on_cancel: bool,
) -> Option<LevelChange>
where
    H: Host + ?Sized,
{
    let record = agents.get_mut(agent)?;
    let previous = record.applied_level();
    let current = effective_level(record, zones);
    if current == previous {
        return None;
    }

    record.set_applied_level(current);
    host.apply_capability(agent, current, CapabilityFlags::from_level(current));
    debug!(agent_id = %agent, previous, current, "capability level changed");

    let mut change = LevelChange {
        agent,
        previous,
        current,
        cancelled: Vec::new(),
        failed_cancellations: 0,
    };

    if change.is_drop() {
        cancel_unaffordable(host, &mut change, notify_on_cancel);
    }

    Some(change)
}

/// Cancel every queued craft that needs more than `change.current`.
fn cancel_unaffordable<H>(host: &mut H, change: &mut LevelChange, notify_on_cancel: bool)
where
    H: Host + ?Sized,
{
    let agent = change.agent;
    if !host.has_permission(agent, CANCEL_CRAFT_PERMISSION) {
        return;
    }

    let unaffordable: Vec<OperationId> = host
        .pending_operations(agent)
        .into_iter()
        .filter(|op| op.required_level > change.current)
        .map(|op| op.id)
        .collect();

    for operation in unaffordable {
        match host.cancel_operation(agent, operation) {
            Ok(()) => change.cancelled.push(operation),
            Err(e) => {
                warn!(
                    agent_id = %agent,
                    operation_id = %operation,
                    error = %e,
                    "failed to cancel craft after level drop"
                );
                change.failed_cancellations = change.failed_cancellations.saturating_add(1);
            }
        }
    }

    if change.cancelled.is_empty() {
        return;
    }

    info!(
        agent_id = %agent,
        cancelled = change.cancelled.len(),
        level = change.current,
        "cancelled crafts above new capability level"
    );

    if notify_on_cancel {
        host.notify(
            agent,
            &Notice::CraftsCancelled {
                operations: change.cancelled.clone(),
                level: change.current,
            },
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use craftzone_types::{FixtureId, Vec3, ZoneId};
    use craftzone_world::SimWorld;

    use super::*;

    struct Fixture {
        world: SimWorld,
        zones: ZoneRegistry,
        agents: AgentIndex,
        agent: AgentId,
        zone: ZoneId,
    }

    fn setup(level: Level) -> Fixture {
        let mut world = SimWorld::new();
        let mut zones = ZoneRegistry::new();
        let mut agents = AgentIndex::new();
        let agent = world.spawn_agent(Vec3::ZERO);
        let zone = ZoneId::new();
        let _ = zones.on_fixture_built(zone, level, FixtureId::new());
        let _ = agents.get_or_create(agent);
        let _ = agents.join(agent, zone, &mut zones);
        Fixture {
            world,
            zones,
            agents,
            agent,
            zone,
        }
    }

    #[test]
    fn effective_level_is_max_of_zones_and_bonus() {
        let mut f = setup(2);
        let other = ZoneId::new();
        let _ = f.zones.on_fixture_built(other, 1, FixtureId::new());
        let _ = f.agents.join(f.agent, other, &mut f.zones);
        assert_eq!(effective_level(f.agents.get(f.agent).unwrap(), &f.zones), 2);

        f.agents.get_mut(f.agent).unwrap().set_direct_bonus(Some(3));
        assert_eq!(effective_level(f.agents.get(f.agent).unwrap(), &f.zones), 3);
    }

    #[test]
    fn no_zones_and_no_bonus_is_zero() {
        let record = AgentRecord::default();
        assert_eq!(effective_level(&record, &ZoneRegistry::new()), 0);
    }

    #[test]
    fn recompute_publishes_once_then_is_idempotent() {
        let mut f = setup(2);
        let change = recompute(&f.zones, &mut f.agents, &mut f.world, f.agent, true).unwrap();
        assert_eq!((change.previous, change.current), (0, 2));
        assert_eq!(f.world.applied_level(f.agent), Some(2));
        assert!(f.world.flags(f.agent).unwrap().tier2);

        assert!(recompute(&f.zones, &mut f.agents, &mut f.world, f.agent, true).is_none());
        assert_eq!(f.world.capability_updates(f.agent), 1);
    }

    #[test]
    fn drop_cancels_only_crafts_above_new_level() {
        let mut f = setup(3);
        let _ = recompute(&f.zones, &mut f.agents, &mut f.world, f.agent, true);
        let keep = f.world.queue_operation(f.agent, 1);
        let drop = f.world.queue_operation(f.agent, 3);

        let _ = f.agents.leave(f.agent, f.zone, &mut f.zones);
        f.agents.get_mut(f.agent).unwrap().set_direct_bonus(Some(1));
        let change = recompute(&f.zones, &mut f.agents, &mut f.world, f.agent, true).unwrap();

        assert_eq!(change.current, 1);
        assert_eq!(change.cancelled, vec![drop]);
        assert_eq!(f.world.pending_ids(f.agent), vec![keep]);
        assert_eq!(f.world.notices_for(f.agent).len(), 1);
    }

    #[test]
    fn no_cancellation_without_permission() {
        let mut f = setup(2);
        let _ = recompute(&f.zones, &mut f.agents, &mut f.world, f.agent, true);
        let op = f.world.queue_operation(f.agent, 2);
        f.world.revoke_permission(f.agent, CANCEL_CRAFT_PERMISSION);

        let _ = f.agents.leave(f.agent, f.zone, &mut f.zones);
        let change = recompute(&f.zones, &mut f.agents, &mut f.world, f.agent, true).unwrap();

        assert_eq!(change.current, 0);
        assert!(change.cancelled.is_empty());
        assert_eq!(f.world.pending_ids(f.agent), vec![op]);
        assert!(f.world.notices_for(f.agent).is_empty());
    }

    #[test]
    fn notice_suppressed_when_disabled() {
        let mut f = setup(2);
        let _ = recompute(&f.zones, &mut f.agents, &mut f.world, f.agent, false);
        let _ = f.world.queue_operation(f.agent, 2);

        let _ = f.agents.leave(f.agent, f.zone, &mut f.zones);
        let change = recompute(&f.zones, &mut f.agents, &mut f.world, f.agent, false).unwrap();

        assert_eq!(change.cancelled.len(), 1);
        assert!(f.world.notices_for(f.agent).is_empty());
    }

    #[test]
    fn failed_cancellation_still_applies_level() {
        let mut f = setup(2);
        let _ = recompute(&f.zones, &mut f.agents, &mut f.world, f.agent, true);
        let _ = f.world.queue_operation(f.agent, 2);
        f.world.reject_cancellations(true);

        let _ = f.agents.leave(f.agent, f.zone, &mut f.zones);
        let change = recompute(&f.zones, &mut f.agents, &mut f.world, f.agent, true).unwrap();

        assert_eq!(change.current, 0);
        assert_eq!(change.failed_cancellations, 1);
        assert!(change.cancelled.is_empty());
        assert_eq!(f.world.applied_level(f.agent), Some(0));
    }

    #[test]
    fn rise_never_cancels() {
        let mut f = setup(1);
        let op = f.world.queue_operation(f.agent, 3);
        let change = recompute(&f.zones, &mut f.agents, &mut f.world, f.agent, true).unwrap();
        assert!(!change.is_drop());
        assert!(change.cancelled.is_empty());
        assert_eq!(f.world.pending_ids(f.agent), vec![op]);
    }
}
