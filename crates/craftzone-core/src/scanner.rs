//! Proximity scan: which zones does an agent qualify for right now?
//!
//! A scan re-evaluates distance and authorization from scratch on every
//! call. Nothing is carried over from the previous scan except the
//! membership set it is diffed against.
//!
//! 1. Ask the host for structures near the agent's bounds, using a sphere
//!    that contains every point within `base_distance` of the box.
//! 2. Drop candidates whose exact box-to-box separation exceeds the base
//!    distance, then collapse the rest to their governing zones.
//! 3. Keep the zones whose authorization list accepts the agent.
//! 4. Diff against the agent's membership and apply the diff symmetrically.
//!
//! The scan itself never changes capability levels. Callers follow it with
//! [`propagator::recompute`](crate::propagator::recompute), which is where a
//! lost zone turns into a level drop and craft cancellation.

use std::collections::BTreeSet;

use craftzone_types::{AccessControl, AgentId, SpatialQuery, StructureFilter, ZoneId};
use tracing::debug;

use crate::agent::AgentIndex;
use crate::zone::ZoneRegistry;

/// Zones an agent entered and left in one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// Zones the agent now qualifies for but did not before.
    pub entered: BTreeSet<ZoneId>,
    /// Zones the agent belonged to but no longer qualifies for.
    pub left: BTreeSet<ZoneId>,
}

impl MembershipDiff {
    /// Whether membership did not change.
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.left.is_empty()
    }
}

/// Compute the set of zones `agent` currently qualifies for.
///
/// An agent with no bounds (not in the world) qualifies for nothing. A
/// zone whose authorization lookup returns `None` is treated as not
/// authorizing the agent.
pub fn qualifying_zones<H>(host: &H, agent: AgentId, base_distance: f32) -> BTreeSet<ZoneId>
where
    H: SpatialQuery + AccessControl + ?Sized,
{
    let Some(bounds) = host.agent_bounds(agent) else {
        return BTreeSet::new();
    };

    let reach = bounds.expanded(base_distance);
    let radius = reach.half_extents().length();
    let candidates = host.query_nearby(reach.center(), radius, StructureFilter::Governed);

    let nearby_zones: BTreeSet<ZoneId> = candidates
        .iter()
        .filter(|candidate| reach.intersects(&candidate.bounds))
        .filter(|candidate| bounds.separation(&candidate.bounds) <= base_distance)
        .filter_map(|candidate| host.governing_zone(candidate.id))
        .collect();

    nearby_zones
        .into_iter()
        .filter(|&zone| host.is_authorized(zone, agent).unwrap_or(false))
        .collect()
}

/// Scan one agent and bring its zone membership up to date.
///
/// Untracked agents are skipped and yield an empty diff. Leaving and
/// entering a zone are applied through [`AgentIndex`] so both sides of the
/// relation stay in agreement.
pub fn scan<H>(
    zones: &mut ZoneRegistry,
    agents: &mut AgentIndex,
    host: &H,
    agent: AgentId,
    base_distance: f32,
) -> MembershipDiff
where
    H: SpatialQuery + AccessControl + ?Sized,
{
    let Some(record) = agents.get(agent) else {
        return MembershipDiff::default();
    };

    let now = qualifying_zones(host, agent, base_distance);
    let before = record.zones();

    let diff = MembershipDiff {
        entered: now.difference(before).copied().collect(),
        left: before.difference(&now).copied().collect(),
    };

    for &zone in &diff.left {
        if agents.leave(agent, zone, zones) {
            debug!(agent_id = %agent, zone_id = %zone, "agent left zone");
        }
    }
    for &zone in &diff.entered {
        if agents.join(agent, zone, zones) {
            debug!(
                agent_id = %agent,
                zone_id = %zone,
                aggregate = zones.aggregate_level(zone),
                "agent entered zone"
            );
        }
    }

    diff
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use craftzone_types::{Aabb, FixtureId, Vec3};
    use craftzone_world::SimWorld;

    use super::*;

    const BASE: f32 = 3.0;

    fn agent_at(world: &mut SimWorld, agents: &mut AgentIndex, x: f32) -> AgentId {
        let a = world.spawn_agent(Vec3::new(x, 0.0, 0.0));
        let _ = agents.get_or_create(a);
        a
    }

    fn zone_with_bench(world: &mut SimWorld, x: f32) -> ZoneId {
        let zone = world.create_zone();
        let _ = world.place_block(zone, Aabb::from_center(Vec3::new(x, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)));
        let _ = world.place_fixture(zone, FixtureId::new(), 1, Vec3::new(x, 0.0, 0.0));
        zone
    }

    #[test]
    fn authorized_agent_within_distance_qualifies() {
        let mut world = SimWorld::new();
        let mut agents = AgentIndex::new();
        let zone = zone_with_bench(&mut world, 0.0);
        let a = agent_at(&mut world, &mut agents, 2.0);
        world.authorize(zone, a);

        assert_eq!(qualifying_zones(&world, a, BASE), BTreeSet::from([zone]));
    }

    #[test]
    fn unauthorized_agent_does_not_qualify() {
        let mut world = SimWorld::new();
        let mut agents = AgentIndex::new();
        let _zone = zone_with_bench(&mut world, 0.0);
        let a = agent_at(&mut world, &mut agents, 2.0);

        assert!(qualifying_zones(&world, a, BASE).is_empty());
    }

    #[test]
    fn distant_agent_does_not_qualify() {
        let mut world = SimWorld::new();
        let mut agents = AgentIndex::new();
        let zone = zone_with_bench(&mut world, 0.0);
        // Block faces at x = 1.0, agent faces at x = 49.5.
        let a = agent_at(&mut world, &mut agents, 50.0);
        world.authorize(zone, a);

        assert!(qualifying_zones(&world, a, BASE).is_empty());
    }

    #[test]
    fn zone_without_authority_counts_as_unauthorized() {
        let mut world = SimWorld::new();
        let mut agents = AgentIndex::new();
        let zone = zone_with_bench(&mut world, 0.0);
        let a = agent_at(&mut world, &mut agents, 2.0);
        world.authorize(zone, a);
        world.remove_authority(zone);

        assert!(qualifying_zones(&world, a, BASE).is_empty());
    }

    #[test]
    fn scan_reports_entered_then_left() {
        let mut world = SimWorld::new();
        let mut zones = ZoneRegistry::new();
        let mut agents = AgentIndex::new();
        let zone = zone_with_bench(&mut world, 0.0);
        let a = agent_at(&mut world, &mut agents, 2.0);
        world.authorize(zone, a);

        let diff = scan(&mut zones, &mut agents, &world, a, BASE);
        assert_eq!(diff.entered, BTreeSet::from([zone]));
        assert!(diff.left.is_empty());
        assert!(zones.get(zone).unwrap().is_member(a));

        let again = scan(&mut zones, &mut agents, &world, a, BASE);
        assert!(again.is_empty());

        world.move_agent(a, Vec3::new(80.0, 0.0, 0.0));
        let diff = scan(&mut zones, &mut agents, &world, a, BASE);
        assert_eq!(diff.left, BTreeSet::from([zone]));
        assert!(zones.members(zone).is_empty());
        assert!(agents.get(a).unwrap().zones().is_empty());
    }

    #[test]
    fn moving_between_zones_swaps_membership() {
        let mut world = SimWorld::new();
        let mut zones = ZoneRegistry::new();
        let mut agents = AgentIndex::new();
        let west = zone_with_bench(&mut world, 0.0);
        let east = zone_with_bench(&mut world, 40.0);
        let a = agent_at(&mut world, &mut agents, 2.0);
        world.authorize(west, a);
        world.authorize(east, a);

        let _ = scan(&mut zones, &mut agents, &world, a, BASE);
        world.move_agent(a, Vec3::new(38.0, 0.0, 0.0));
        let diff = scan(&mut zones, &mut agents, &world, a, BASE);

        assert_eq!(diff.entered, BTreeSet::from([east]));
        assert_eq!(diff.left, BTreeSet::from([west]));
        assert_eq!(agents.get(a).unwrap().zones(), &BTreeSet::from([east]));
    }

    #[test]
    fn untracked_agent_yields_empty_diff() {
        let mut world = SimWorld::new();
        let mut zones = ZoneRegistry::new();
        let mut agents = AgentIndex::new();
        let zone = zone_with_bench(&mut world, 0.0);
        let a = world.spawn_agent(Vec3::new(1.0, 0.0, 0.0));
        world.authorize(zone, a);

        assert!(scan(&mut zones, &mut agents, &world, a, BASE).is_empty());
        assert!(zones.members(zone).is_empty());
    }
}
