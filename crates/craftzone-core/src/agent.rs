//! Per-agent tracking state and the bidirectional membership relation.
//!
//! [`AgentIndex`] owns one [`AgentRecord`] per connected agent. It is also
//! the only place that writes zone membership: [`AgentIndex::join`] and
//! [`AgentIndex::leave`] update `AgentRecord::zones` and `Zone::members` in
//! the same step, so the two sides never disagree outside that call.

use std::collections::{BTreeMap, BTreeSet};

use craftzone_types::{AgentId, Level, NO_CAPABILITY, ZoneId};

use crate::zone::ZoneRegistry;

/// Tracking state for one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentRecord {
    /// Zones the agent currently belongs to.
    zones: BTreeSet<ZoneId>,
    /// Level most recently published for the agent.
    applied_level: Level,
    /// Level granted by standing directly beside a fixture, if any.
    direct_bonus: Option<Level>,
    /// Whether the agent was already told its range covers the zone.
    build_notified: bool,
}

impl AgentRecord {
    /// Zones the agent currently belongs to.
    pub const fn zones(&self) -> &BTreeSet<ZoneId> {
        &self.zones
    }

    /// Level most recently published for the agent.
    pub const fn applied_level(&self) -> Level {
        self.applied_level
    }

    /// Active direct-proximity bonus.
    pub const fn direct_bonus(&self) -> Option<Level> {
        self.direct_bonus
    }

    /// Whether the build notice has been shown this session.
    pub const fn build_notified(&self) -> bool {
        self.build_notified
    }

    pub(crate) const fn set_applied_level(&mut self, level: Level) {
        self.applied_level = level;
    }

    pub(crate) const fn set_direct_bonus(&mut self, bonus: Option<Level>) {
        self.direct_bonus = bonus;
    }

    pub(crate) const fn mark_build_notified(&mut self) {
        self.build_notified = true;
    }
}

/// Owns every [`AgentRecord`], keyed by agent.
#[derive(Debug, Clone, Default)]
pub struct AgentIndex {
    agents: BTreeMap<AgentId, AgentRecord>,
}

impl AgentIndex {
    /// Create an empty index.
    pub const fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
        }
    }

    /// Return the agent's record, creating a fresh one (no zones, level 0)
    /// on first reference.
    pub fn get_or_create(&mut self, agent: AgentId) -> &mut AgentRecord {
        self.agents.entry(agent).or_default()
    }

    /// Look up an agent without creating it.
    pub fn get(&self, agent: AgentId) -> Option<&AgentRecord> {
        self.agents.get(&agent)
    }

    pub(crate) fn get_mut(&mut self, agent: AgentId) -> Option<&mut AgentRecord> {
        self.agents.get_mut(&agent)
    }

    /// Whether the agent is tracked.
    pub fn contains(&self, agent: AgentId) -> bool {
        self.agents.contains_key(&agent)
    }

    /// Level most recently published for the agent (0 if untracked).
    pub fn applied_level(&self, agent: AgentId) -> Level {
        self.agents
            .get(&agent)
            .map_or(NO_CAPABILITY, AgentRecord::applied_level)
    }

    /// Number of tracked agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agents are tracked.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Snapshot of all tracked agent IDs in stable order.
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    /// Iterate over all records.
    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &AgentRecord)> {
        self.agents.iter()
    }

    /// Add the agent to the zone on both sides of the relation.
    ///
    /// Returns `false` (and changes nothing) if the agent is untracked or
    /// already a member.
    pub fn join(&mut self, agent: AgentId, zone: ZoneId, zones: &mut ZoneRegistry) -> bool {
        let Some(record) = self.agents.get_mut(&agent) else {
            return false;
        };
        if !record.zones.insert(zone) {
            return false;
        }
        zones.get_or_create(zone).insert_member(agent);
        true
    }

    /// Remove the agent from the zone on both sides of the relation.
    ///
    /// Returns `false` if the agent was not a member.
    pub fn leave(&mut self, agent: AgentId, zone: ZoneId, zones: &mut ZoneRegistry) -> bool {
        let was_member = self
            .agents
            .get_mut(&agent)
            .is_some_and(|record| record.zones.remove(&zone));
        if let Some(z) = zones.get_mut(zone) {
            z.remove_member(agent);
        }
        was_member
    }

    /// Remove the agent from every zone it belongs to. Returns the zones
    /// it left.
    pub fn detach_all(&mut self, agent: AgentId, zones: &mut ZoneRegistry) -> BTreeSet<ZoneId> {
        let Some(record) = self.agents.get_mut(&agent) else {
            return BTreeSet::new();
        };
        let left = core::mem::take(&mut record.zones);
        for &zone in &left {
            if let Some(z) = zones.get_mut(zone) {
                z.remove_member(agent);
            }
        }
        left
    }

    /// Detach the agent from every zone and delete its record.
    ///
    /// Callers that need the capability drop to run its side effects
    /// (craft cancellation) must recompute between [`detach_all`] and this
    /// call; see [`Tracker::disconnect_agent`].
    ///
    /// [`detach_all`]: Self::detach_all
    /// [`Tracker::disconnect_agent`]: crate::tracker::Tracker::disconnect_agent
    pub fn remove(&mut self, agent: AgentId, zones: &mut ZoneRegistry) -> Option<AgentRecord> {
        let _ = self.detach_all(agent, zones);
        self.agents.remove(&agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership_agrees(index: &AgentIndex, zones: &ZoneRegistry) -> bool {
        let forward = index.iter().all(|(agent, record)| {
            record
                .zones()
                .iter()
                .all(|&z| zones.get(z).is_some_and(|zone| zone.is_member(*agent)))
        });
        let backward = zones.iter().all(|(zone_id, zone)| {
            zone.members().iter().all(|&a| {
                index
                    .get(a)
                    .is_some_and(|record| record.zones().contains(zone_id))
            })
        });
        forward && backward
    }

    #[test]
    fn new_record_starts_empty() {
        let mut index = AgentIndex::new();
        let a = AgentId::new();
        let record = index.get_or_create(a);
        assert!(record.zones().is_empty());
        assert_eq!(record.applied_level(), 0);
        assert_eq!(record.direct_bonus(), None);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn join_and_leave_are_symmetric_and_idempotent() {
        let mut index = AgentIndex::new();
        let mut zones = ZoneRegistry::new();
        let a = AgentId::new();
        let z = ZoneId::new();
        let _ = index.get_or_create(a);

        assert!(index.join(a, z, &mut zones));
        assert!(!index.join(a, z, &mut zones));
        assert!(zones.get(z).is_some_and(|zone| zone.is_member(a)));
        assert!(membership_agrees(&index, &zones));

        assert!(index.leave(a, z, &mut zones));
        assert!(!index.leave(a, z, &mut zones));
        assert!(zones.members(z).is_empty());
        assert!(membership_agrees(&index, &zones));
    }

    #[test]
    fn untracked_agent_cannot_join() {
        let mut index = AgentIndex::new();
        let mut zones = ZoneRegistry::new();
        let z = ZoneId::new();
        assert!(!index.join(AgentId::new(), z, &mut zones));
        assert!(zones.get(z).is_none());
    }

    #[test]
    fn remove_clears_every_membership() {
        let mut index = AgentIndex::new();
        let mut zones = ZoneRegistry::new();
        let a = AgentId::new();
        let b = AgentId::new();
        let z1 = ZoneId::new();
        let z2 = ZoneId::new();
        let _ = index.get_or_create(a);
        let _ = index.get_or_create(b);
        let _ = index.join(a, z1, &mut zones);
        let _ = index.join(a, z2, &mut zones);
        let _ = index.join(b, z1, &mut zones);

        let removed = index.remove(a, &mut zones);
        assert!(removed.is_some());
        assert!(!index.contains(a));
        assert_eq!(zones.members(z1), vec![b]);
        assert!(zones.members(z2).is_empty());
        assert!(membership_agrees(&index, &zones));
    }

    #[test]
    fn detach_all_reports_left_zones() {
        let mut index = AgentIndex::new();
        let mut zones = ZoneRegistry::new();
        let a = AgentId::new();
        let z1 = ZoneId::new();
        let z2 = ZoneId::new();
        let _ = index.get_or_create(a);
        let _ = index.join(a, z1, &mut zones);
        let _ = index.join(a, z2, &mut zones);

        let left = index.detach_all(a, &mut zones);
        assert_eq!(left.len(), 2);
        assert!(index.contains(a));
        assert!(index.get(a).is_some_and(|r| r.zones().is_empty()));
        assert!(membership_agrees(&index, &zones));
    }
}
