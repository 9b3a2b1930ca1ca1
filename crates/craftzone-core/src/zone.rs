//! Capability zones: fixture sets, cached aggregate level, and members.
//!
//! A [`Zone`] exists for every governing authorization the tracker has seen,
//! either because a fixture was built under it or because an agent qualified
//! for it. Its aggregate level is cached so the propagator can read it in
//! O(1): building a fixture raises the cache directly, while destroying one
//! triggers a full recompute since only a rescan can tell whether the
//! maximum went down.
//!
//! Membership is written only through [`AgentIndex`](crate::agent::AgentIndex)
//! so that `Zone::members` and `AgentRecord::zones` always agree.

use std::collections::{BTreeMap, BTreeSet};

use craftzone_types::{AgentId, FixtureId, Level, NO_CAPABILITY, ZoneId};
use tracing::trace;

/// Runtime state of one capability zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zone {
    /// Fixtures under this zone and the level each grants.
    fixtures: BTreeMap<FixtureId, Level>,
    /// Cached `max(fixtures)`, or 0 when there are none.
    aggregate: Level,
    /// Fixture currently providing the aggregate (last built among ties).
    top_fixture: Option<FixtureId>,
    /// Agents currently qualifying for this zone.
    members: BTreeSet<AgentId>,
}

impl Zone {
    /// Cached aggregate capability level.
    pub const fn aggregate_level(&self) -> Level {
        self.aggregate
    }

    /// Fixture the cached aggregate was last taken from.
    pub const fn top_fixture(&self) -> Option<FixtureId> {
        self.top_fixture
    }

    /// All fixtures and their levels.
    pub const fn fixtures(&self) -> &BTreeMap<FixtureId, Level> {
        &self.fixtures
    }

    /// Agents currently qualifying for this zone.
    pub const fn members(&self) -> &BTreeSet<AgentId> {
        &self.members
    }

    /// Whether the agent is a member.
    pub fn is_member(&self, agent: AgentId) -> bool {
        self.members.contains(&agent)
    }

    /// A zone with no fixtures and no members carries no state worth keeping.
    pub fn is_inert(&self) -> bool {
        self.fixtures.is_empty() && self.members.is_empty()
    }

    pub(crate) fn insert_member(&mut self, agent: AgentId) -> bool {
        self.members.insert(agent)
    }

    pub(crate) fn remove_member(&mut self, agent: AgentId) -> bool {
        self.members.remove(&agent)
    }

    fn recompute_aggregate(&mut self) {
        // Ties go to the highest FixtureId in key order, not to the most
        // recently built fixture; the numeric aggregate is the same either way.
        match self.fixtures.iter().max_by_key(|&(_, level)| *level) {
            Some((&fixture, &level)) => {
                self.aggregate = level;
                self.top_fixture = Some(fixture);
            }
            None => {
                self.aggregate = NO_CAPABILITY;
                self.top_fixture = None;
            }
        }
    }
}

/// Owns every [`Zone`], keyed by its governing authorization.
#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    zones: BTreeMap<ZoneId, Zone>,
}

impl ZoneRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            zones: BTreeMap::new(),
        }
    }

    /// Return the zone, creating an empty one on first reference.
    pub fn get_or_create(&mut self, zone: ZoneId) -> &mut Zone {
        self.zones.entry(zone).or_default()
    }

    /// Look up a zone without creating it.
    pub fn get(&self, zone: ZoneId) -> Option<&Zone> {
        self.zones.get(&zone)
    }

    pub(crate) fn get_mut(&mut self, zone: ZoneId) -> Option<&mut Zone> {
        self.zones.get_mut(&zone)
    }

    /// Record a newly built fixture and return the zone's new aggregate.
    ///
    /// A fresh fixture can only raise the maximum, so the cache is updated
    /// in O(1): a level at or above the current aggregate (or the zone's
    /// first fixture) becomes the aggregate. Re-reporting a known fixture
    /// with a different level falls back to a full recompute, since that
    /// may lower the maximum.
    pub fn on_fixture_built(&mut self, zone_id: ZoneId, level: Level, fixture: FixtureId) -> Level {
        let zone = self.get_or_create(zone_id);

        if let Some(previous) = zone.fixtures.insert(fixture, level) {
            if previous != level {
                zone.recompute_aggregate();
            }
            return zone.aggregate;
        }

        if zone.fixtures.len() == 1 || level >= zone.aggregate {
            zone.aggregate = level;
            zone.top_fixture = Some(fixture);
        }

        trace!(
            zone_id = %zone_id,
            fixture_id = %fixture,
            level,
            aggregate = zone.aggregate,
            "fixture built"
        );
        zone.aggregate
    }

    /// Remove a fixture and recompute the zone's aggregate over what is
    /// left. Returns the new aggregate (0 for an unknown zone).
    pub fn on_fixture_removed(&mut self, zone_id: ZoneId, fixture: FixtureId) -> Level {
        let Some(zone) = self.zones.get_mut(&zone_id) else {
            return NO_CAPABILITY;
        };
        if zone.fixtures.remove(&fixture).is_some() {
            zone.recompute_aggregate();
            trace!(
                zone_id = %zone_id,
                fixture_id = %fixture,
                aggregate = zone.aggregate,
                "fixture removed"
            );
        }
        zone.aggregate
    }

    /// Cached aggregate for a zone; 0 if the zone is unknown or empty.
    pub fn aggregate_level(&self, zone: ZoneId) -> Level {
        self.zones
            .get(&zone)
            .map_or(NO_CAPABILITY, Zone::aggregate_level)
    }

    /// Snapshot of a zone's members (empty for an unknown zone).
    pub fn members(&self, zone: ZoneId) -> Vec<AgentId> {
        self.zones
            .get(&zone)
            .map(|z| z.members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of zones currently held.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Whether no zones are held.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Iterate over all zones.
    pub fn iter(&self) -> impl Iterator<Item = (&ZoneId, &Zone)> {
        self.zones.iter()
    }

    /// Drop zones with no fixtures and no members. Returns how many were
    /// dropped.
    pub fn prune_inert(&mut self) -> usize {
        let before = self.zones.len();
        self.zones.retain(|_, zone| !zone.is_inert());
        before.saturating_sub(self.zones.len())
    }
}
