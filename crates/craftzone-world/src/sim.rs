//! [`SimWorld`]: an in-memory host implementing every collaborator trait.
//!
//! Agents are axis-aligned boxes on a flat plane. Structures are boxes that
//! either belong to a zone (foundations, fixtures) or float free. Zones
//! carry an authorization list that can be cleared or removed outright.
//! Everything the tracker publishes back (capability levels, notices,
//! cancellations) is recorded so callers can inspect it.

use std::collections::{BTreeMap, BTreeSet};

use craftzone_types::{
    Aabb, AccessControl, AgentId, CANCEL_CRAFT_PERMISSION, CapabilityFlags, CapabilitySink, CraftQueue,
    FixtureId, HostError, Level, Notice, Notifier, OperationId, PendingOperation, Permissions,
    SpatialQuery, StructureFilter, StructureId, StructureRef, USE_PERMISSION, Vec3, ZoneId,
};
use rand::Rng;
use tracing::{debug, trace};

use crate::error::WorldError;

/// Half extents of every agent's bounding box.
pub const AGENT_HALF_EXTENTS: Vec3 = Vec3::new(0.5, 0.9, 0.5);

/// Half extents of a fixture's bounding box.
pub const FIXTURE_HALF_EXTENTS: Vec3 = Vec3::new(0.5, 0.5, 0.5);

/// Agents cannot wander beyond this distance from the origin on x or z.
pub const WORLD_HALF_SIZE: f32 = 200.0;

#[derive(Debug, Clone, Default)]
struct AgentBody {
    position: Vec3,
    permissions: BTreeSet<String>,
    queue: Vec<PendingOperation>,
    applied: Option<(Level, CapabilityFlags)>,
    capability_updates: usize,
    notices: Vec<Notice>,
}

#[derive(Debug, Clone, Default)]
struct ZoneState {
    /// `None` once the zone's authority has been removed.
    authorized: Option<BTreeSet<AgentId>>,
}

#[derive(Debug, Clone, Copy)]
struct Placed {
    zone: Option<ZoneId>,
    bounds: Aabb,
    fixture: Option<(FixtureId, Level)>,
}

/// In-memory host world.
#[derive(Debug, Clone, Default)]
pub struct SimWorld {
    agents: BTreeMap<AgentId, AgentBody>,
    zones: BTreeMap<ZoneId, ZoneState>,
    structures: BTreeMap<StructureId, Placed>,
    reject_cancellations: bool,
}

impl SimWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    // ---- agents ----

    /// Spawn an agent at `position` holding the use and cancel permissions.
    pub fn spawn_agent(&mut self, position: Vec3) -> AgentId {
        let id = AgentId::new();
        let body = AgentBody {
            position,
            permissions: [USE_PERMISSION, CANCEL_CRAFT_PERMISSION]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            ..AgentBody::default()
        };
        self.agents.insert(id, body);
        trace!(agent_id = %id, "agent spawned");
        id
    }

    /// Remove an agent's body. Its zone authorizations are left in place.
    pub fn despawn_agent(&mut self, agent: AgentId) -> Result<(), WorldError> {
        if self.agents.remove(&agent).is_none() {
            return Err(WorldError::AgentNotFound(agent));
        }
        trace!(agent_id = %agent, "agent despawned");
        Ok(())
    }

    /// Teleport an agent. Unknown agents are ignored.
    pub fn move_agent(&mut self, agent: AgentId, position: Vec3) {
        if let Some(body) = self.agents.get_mut(&agent) {
            body.position = position;
        }
    }

    /// Current position of an agent.
    pub fn position(&self, agent: AgentId) -> Option<Vec3> {
        self.agents.get(&agent).map(|body| body.position)
    }

    /// Move every agent by a random step of at most `step` meters on x and
    /// z, staying inside the world bounds.
    pub fn wander<R: Rng + ?Sized>(&mut self, rng: &mut R, step: f32) {
        if step.is_nan() || step <= 0.0 {
            return;
        }
        for body in self.agents.values_mut() {
            let dx = rng.random_range(-step..=step);
            let dz = rng.random_range(-step..=step);
            let moved = body.position.plus(Vec3::new(dx, 0.0, dz));
            body.position = Vec3::new(
                moved.x.clamp(-WORLD_HALF_SIZE, WORLD_HALF_SIZE),
                moved.y,
                moved.z.clamp(-WORLD_HALF_SIZE, WORLD_HALF_SIZE),
            );
        }
    }

    /// All agents in the world, in stable order.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    /// Grant a permission. Unknown agents are ignored.
    pub fn grant_permission(&mut self, agent: AgentId, permission: &str) {
        if let Some(body) = self.agents.get_mut(&agent) {
            body.permissions.insert(permission.to_owned());
        }
    }

    /// Revoke a permission. Unknown agents are ignored.
    pub fn revoke_permission(&mut self, agent: AgentId, permission: &str) {
        if let Some(body) = self.agents.get_mut(&agent) {
            body.permissions.remove(permission);
        }
    }

    // ---- zones and structures ----

    /// Create a zone with an empty authorization list.
    pub fn create_zone(&mut self) -> ZoneId {
        let id = ZoneId::new();
        self.zones.insert(
            id,
            ZoneState {
                authorized: Some(BTreeSet::new()),
            },
        );
        id
    }

    /// All zones, in stable order.
    pub fn zone_ids(&self) -> Vec<ZoneId> {
        self.zones.keys().copied().collect()
    }

    /// Place a structure governed by `zone`.
    pub fn place_block(&mut self, zone: ZoneId, bounds: Aabb) -> StructureId {
        self.insert_structure(Placed {
            zone: Some(zone),
            bounds,
            fixture: None,
        })
    }

    /// Place a structure outside any zone.
    pub fn place_loose_block(&mut self, bounds: Aabb) -> StructureId {
        self.insert_structure(Placed {
            zone: None,
            bounds,
            fixture: None,
        })
    }

    /// Place a capability fixture of `level` centered at `position`.
    pub fn place_fixture(
        &mut self,
        zone: ZoneId,
        fixture: FixtureId,
        level: Level,
        position: Vec3,
    ) -> StructureId {
        self.insert_structure(Placed {
            zone: Some(zone),
            bounds: Aabb::from_center(position, FIXTURE_HALF_EXTENTS),
            fixture: Some((fixture, level)),
        })
    }

    /// Remove a fixture's structure and return the zone it was in.
    pub fn destroy_fixture(&mut self, fixture: FixtureId) -> Result<ZoneId, WorldError> {
        let found = self
            .structures
            .iter()
            .find(|(_, placed)| placed.fixture.is_some_and(|(f, _)| f == fixture))
            .map(|(&id, placed)| (id, placed.zone));
        let Some((structure, zone)) = found else {
            return Err(WorldError::FixtureNotFound(fixture));
        };
        self.structures.remove(&structure);
        debug!(fixture_id = %fixture, structure_id = %structure, "fixture destroyed");
        zone.ok_or(WorldError::FixtureNotFound(fixture))
    }

    /// Every fixture as `(zone, fixture, level)`.
    pub fn fixtures(&self) -> Vec<(ZoneId, FixtureId, Level)> {
        self.structures
            .values()
            .filter_map(|placed| {
                let zone = placed.zone?;
                let (fixture, level) = placed.fixture?;
                Some((zone, fixture, level))
            })
            .collect()
    }

    fn insert_structure(&mut self, placed: Placed) -> StructureId {
        let id = StructureId::new();
        self.structures.insert(id, placed);
        id
    }

    // ---- authorization ----

    /// Add an agent to a zone's authorization list.
    pub fn authorize(&mut self, zone: ZoneId, agent: AgentId) {
        if let Some(list) = self.list_mut(zone) {
            list.insert(agent);
        }
    }

    /// Remove an agent from a zone's authorization list.
    pub fn deauthorize(&mut self, zone: ZoneId, agent: AgentId) {
        if let Some(list) = self.list_mut(zone) {
            list.remove(&agent);
        }
    }

    /// Empty a zone's authorization list.
    pub fn clear_authorizations(&mut self, zone: ZoneId) {
        if let Some(list) = self.list_mut(zone) {
            list.clear();
        }
    }

    /// Remove the zone's authority entirely, so lookups return `None`.
    pub fn remove_authority(&mut self, zone: ZoneId) {
        if let Some(state) = self.zones.get_mut(&zone) {
            state.authorized = None;
        }
    }

    /// Agents on a zone's authorization list.
    pub fn authorized_agents(&self, zone: ZoneId) -> Result<Vec<AgentId>, WorldError> {
        let state = self.zones.get(&zone).ok_or(WorldError::ZoneNotFound(zone))?;
        Ok(state
            .authorized
            .as_ref()
            .map(|list| list.iter().copied().collect())
            .unwrap_or_default())
    }

    fn list_mut(&mut self, zone: ZoneId) -> Option<&mut BTreeSet<AgentId>> {
        self.zones.get_mut(&zone)?.authorized.as_mut()
    }

    // ---- crafting and published state ----

    /// Queue a craft needing `required_level`. Unknown agents get an id
    /// for an operation that is never stored.
    pub fn queue_operation(&mut self, agent: AgentId, required_level: Level) -> OperationId {
        let id = OperationId::new();
        if let Some(body) = self.agents.get_mut(&agent) {
            body.queue.push(PendingOperation { id, required_level });
        }
        id
    }

    /// Ids of the agent's queued crafts, in queue order.
    pub fn pending_ids(&self, agent: AgentId) -> Vec<OperationId> {
        self.agents
            .get(&agent)
            .map(|body| body.queue.iter().map(|op| op.id).collect())
            .unwrap_or_default()
    }

    /// Make every cancellation fail (or succeed again).
    pub const fn reject_cancellations(&mut self, reject: bool) {
        self.reject_cancellations = reject;
    }

    /// Level last published for the agent, if any was.
    pub fn applied_level(&self, agent: AgentId) -> Option<Level> {
        self.agents.get(&agent)?.applied.map(|(level, _)| level)
    }

    /// Tier flags last published for the agent, if any were.
    pub fn flags(&self, agent: AgentId) -> Option<CapabilityFlags> {
        self.agents.get(&agent)?.applied.map(|(_, flags)| flags)
    }

    /// How many times a level was published for the agent.
    pub fn capability_updates(&self, agent: AgentId) -> usize {
        self.agents
            .get(&agent)
            .map_or(0, |body| body.capability_updates)
    }

    /// Notices shown to the agent, oldest first.
    pub fn notices_for(&self, agent: AgentId) -> Vec<Notice> {
        self.agents
            .get(&agent)
            .map(|body| body.notices.clone())
            .unwrap_or_default()
    }
}

impl SpatialQuery for SimWorld {
    fn agent_bounds(&self, agent: AgentId) -> Option<Aabb> {
        self.agents
            .get(&agent)
            .map(|body| Aabb::from_center(body.position, AGENT_HALF_EXTENTS))
    }

    fn query_nearby(&self, center: Vec3, radius: f32, filter: StructureFilter) -> Vec<StructureRef> {
        let probe = Aabb::from_center(center, Vec3::ZERO);
        self.structures
            .iter()
            .filter(|(_, placed)| match filter {
                StructureFilter::Any => true,
                StructureFilter::Governed => placed.zone.is_some(),
            })
            .filter(|(_, placed)| probe.separation(&placed.bounds) <= radius)
            .map(|(&id, placed)| StructureRef {
                id,
                bounds: placed.bounds,
            })
            .collect()
    }

    fn governing_zone(&self, structure: StructureId) -> Option<ZoneId> {
        self.structures.get(&structure)?.zone
    }
}

impl AccessControl for SimWorld {
    fn is_authorized(&self, zone: ZoneId, agent: AgentId) -> Option<bool> {
        let list = self.zones.get(&zone)?.authorized.as_ref()?;
        Some(list.contains(&agent))
    }
}

impl Permissions for SimWorld {
    fn has_permission(&self, agent: AgentId, permission: &str) -> bool {
        self.agents
            .get(&agent)
            .is_some_and(|body| body.permissions.contains(permission))
    }
}

impl CraftQueue for SimWorld {
    fn pending_operations(&self, agent: AgentId) -> Vec<PendingOperation> {
        self.agents
            .get(&agent)
            .map(|body| body.queue.clone())
            .unwrap_or_default()
    }

    fn cancel_operation(&mut self, agent: AgentId, operation: OperationId) -> Result<(), HostError> {
        if self.reject_cancellations {
            return Err(HostError::CancelRejected {
                operation,
                reason: "cancellations are disabled".to_owned(),
            });
        }
        let body = self
            .agents
            .get_mut(&agent)
            .ok_or(HostError::OperationNotFound { agent, operation })?;
        let before = body.queue.len();
        body.queue.retain(|op| op.id != operation);
        if body.queue.len() == before {
            return Err(HostError::OperationNotFound { agent, operation });
        }
        Ok(())
    }
}

impl CapabilitySink for SimWorld {
    fn apply_capability(&mut self, agent: AgentId, level: Level, flags: CapabilityFlags) {
        if let Some(body) = self.agents.get_mut(&agent) {
            body.applied = Some((level, flags));
            body.capability_updates = body.capability_updates.saturating_add(1);
        }
    }
}

impl Notifier for SimWorld {
    fn notify(&mut self, agent: AgentId, notice: &Notice) {
        if let Some(body) = self.agents.get_mut(&agent) {
            trace!(agent_id = %agent, %notice, "notice");
            body.notices.push(notice.clone());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn spawned_agent_has_default_permissions_and_bounds() {
        let mut world = SimWorld::new();
        let a = world.spawn_agent(Vec3::new(1.0, 0.0, 2.0));
        assert!(world.has_permission(a, USE_PERMISSION));
        assert!(world.has_permission(a, CANCEL_CRAFT_PERMISSION));
        assert!(!world.has_permission(a, "other.permission"));
        let bounds = world.agent_bounds(a).unwrap();
        assert_eq!(bounds.center(), Vec3::new(1.0, 0.0, 2.0));
        assert!(world.agent_bounds(AgentId::new()).is_none());
    }

    #[test]
    fn query_filters_ungoverned_structures() {
        let mut world = SimWorld::new();
        let zone = world.create_zone();
        let governed = world.place_block(zone, Aabb::from_center(Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0)));
        let loose = world.place_loose_block(Aabb::from_center(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.5, 0.5, 0.5)));

        let any: Vec<StructureId> = world
            .query_nearby(Vec3::ZERO, 5.0, StructureFilter::Any)
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert!(any.contains(&governed) && any.contains(&loose));

        let only_governed = world.query_nearby(Vec3::ZERO, 5.0, StructureFilter::Governed);
        assert_eq!(only_governed.len(), 1);
        assert_eq!(world.governing_zone(governed), Some(zone));
        assert_eq!(world.governing_zone(loose), None);
    }

    #[test]
    fn query_respects_radius() {
        let mut world = SimWorld::new();
        let zone = world.create_zone();
        let _ = world.place_block(zone, Aabb::from_center(Vec3::new(10.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)));
        assert!(world.query_nearby(Vec3::ZERO, 8.0, StructureFilter::Any).is_empty());
        assert_eq!(world.query_nearby(Vec3::ZERO, 9.5, StructureFilter::Any).len(), 1);
    }

    #[test]
    fn authorization_list_lifecycle() {
        let mut world = SimWorld::new();
        let zone = world.create_zone();
        let a = world.spawn_agent(Vec3::ZERO);
        assert_eq!(world.is_authorized(zone, a), Some(false));
        world.authorize(zone, a);
        assert_eq!(world.is_authorized(zone, a), Some(true));
        world.clear_authorizations(zone);
        assert_eq!(world.is_authorized(zone, a), Some(false));
        world.remove_authority(zone);
        assert_eq!(world.is_authorized(zone, a), None);
        assert_eq!(world.is_authorized(ZoneId::new(), a), None);
    }

    #[test]
    fn cancel_removes_queued_operation() {
        let mut world = SimWorld::new();
        let a = world.spawn_agent(Vec3::ZERO);
        let first = world.queue_operation(a, 1);
        let second = world.queue_operation(a, 3);
        world.cancel_operation(a, second).unwrap();
        assert_eq!(world.pending_ids(a), vec![first]);
        assert!(matches!(
            world.cancel_operation(a, second),
            Err(HostError::OperationNotFound { .. })
        ));
    }

    #[test]
    fn rejected_cancellation_keeps_queue() {
        let mut world = SimWorld::new();
        let a = world.spawn_agent(Vec3::ZERO);
        let op = world.queue_operation(a, 2);
        world.reject_cancellations(true);
        assert!(matches!(
            world.cancel_operation(a, op),
            Err(HostError::CancelRejected { .. })
        ));
        assert_eq!(world.pending_ids(a), vec![op]);
    }

    #[test]
    fn destroy_fixture_reports_zone() {
        let mut world = SimWorld::new();
        let zone = world.create_zone();
        let fixture = FixtureId::new();
        let _ = world.place_fixture(zone, fixture, 2, Vec3::ZERO);
        assert_eq!(world.fixtures(), vec![(zone, fixture, 2)]);
        assert_eq!(world.destroy_fixture(fixture).unwrap(), zone);
        assert!(world.fixtures().is_empty());
        assert!(matches!(
            world.destroy_fixture(fixture),
            Err(WorldError::FixtureNotFound(_))
        ));
    }

    #[test]
    fn sink_and_notifier_record_output() {
        let mut world = SimWorld::new();
        let a = world.spawn_agent(Vec3::ZERO);
        world.apply_capability(a, 2, CapabilityFlags::from_level(2));
        world.notify(a, &Notice::RangeExtended);
        assert_eq!(world.applied_level(a), Some(2));
        assert!(world.flags(a).unwrap().tier2);
        assert_eq!(world.capability_updates(a), 1);
        assert_eq!(world.notices_for(a), vec![Notice::RangeExtended]);
    }

    #[test]
    fn wander_stays_in_bounds() {
        let mut world = SimWorld::new();
        let a = world.spawn_agent(Vec3::new(WORLD_HALF_SIZE, 0.0, -WORLD_HALF_SIZE));
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..50 {
            world.wander(&mut rng, 5.0);
        }
        let p = world.position(a).unwrap();
        assert!(p.x.abs() <= WORLD_HALF_SIZE && p.z.abs() <= WORLD_HALF_SIZE);
    }

    #[test]
    fn despawn_unknown_agent_fails() {
        let mut world = SimWorld::new();
        let a = world.spawn_agent(Vec3::ZERO);
        world.despawn_agent(a).unwrap();
        assert!(matches!(
            world.despawn_agent(a),
            Err(WorldError::AgentNotFound(_))
        ));
    }
}
