//! The tracker: one explicit context object for the whole core.
//!
//! [`Tracker`] owns the [`ZoneRegistry`] and [`AgentIndex`] and is handed to
//! whoever needs them (event handlers, the [`PassScheduler`]) by reference.
//! There is no global instance. Every host lifecycle signal lands in
//! [`Tracker::handle_event`] and is applied synchronously, bypassing the
//! periodic pass, so access-control changes are never delayed by it.
//!
//! [`PassScheduler`]: crate::scheduler::PassScheduler

use std::collections::BTreeSet;

use craftzone_types::{
    AgentId, CapabilityFlags, FixtureId, Host, Level, LifecycleEvent, NO_CAPABILITY, Notice,
    USE_PERMISSION, ZoneId,
};
use tracing::{debug, info, trace};

use crate::agent::AgentIndex;
use crate::config::TrackerConfig;
use crate::propagator::{self, LevelChange};
use crate::scanner::{self, MembershipDiff};
use crate::zone::ZoneRegistry;

/// What happened to one agent during a pass slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceOutcome {
    /// The agent was scanned and its level recomputed.
    Scanned {
        /// Membership changes from the scan.
        diff: MembershipDiff,
        /// Level change, if the level moved.
        change: Option<LevelChange>,
    },
    /// The agent disconnected since the pass started.
    Missing,
    /// The agent lacks [`USE_PERMISSION`]; its memberships were dropped.
    NotPermitted {
        /// Level reset, if it had been elevated.
        change: Option<LevelChange>,
    },
}

/// Owns all zone and agent state and applies host lifecycle signals.
#[derive(Debug, Clone)]
pub struct Tracker {
    config: TrackerConfig,
    zones: ZoneRegistry,
    agents: AgentIndex,
}

impl Tracker {
    /// Create an empty tracker. The configuration is clamped into range.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config: config.validated(),
            zones: ZoneRegistry::new(),
            agents: AgentIndex::new(),
        }
    }

    /// The (validated) configuration in effect.
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Read access to the zone registry.
    pub const fn zones(&self) -> &ZoneRegistry {
        &self.zones
    }

    /// Read access to the agent index.
    pub const fn agents(&self) -> &AgentIndex {
        &self.agents
    }

    /// Level last published for the agent.
    pub fn effective_level(&self, agent: AgentId) -> Level {
        self.agents.applied_level(agent)
    }

    /// Register pre-existing fixtures and already-connected agents when the
    /// tracker starts. No build notices are sent for bootstrapped fixtures.
    pub fn bootstrap<H, F, A>(&mut self, fixtures: F, agents: A, host: &mut H) -> Vec<LevelChange>
    where
        H: Host + ?Sized,
        F: IntoIterator<Item = (ZoneId, FixtureId, Level)>,
        A: IntoIterator<Item = AgentId>,
    {
        let mut fixture_count: usize = 0;
        for (zone, fixture, level) in fixtures {
            let _ = self.zones.on_fixture_built(zone, level, fixture);
            fixture_count = fixture_count.saturating_add(1);
        }

        let changes: Vec<LevelChange> = agents
            .into_iter()
            .filter_map(|agent| self.connect_agent(agent, host))
            .collect();

        info!(
            fixtures = fixture_count,
            zones = self.zones.len(),
            agents = self.agents.len(),
            "tracker bootstrapped"
        );
        changes
    }

    /// Apply one host lifecycle signal. Returns every level change it caused.
    pub fn handle_event<H>(&mut self, event: &LifecycleEvent, host: &mut H) -> Vec<LevelChange>
    where
        H: Host + ?Sized,
    {
        match *event {
            LifecycleEvent::AgentConnected { agent } => {
                self.connect_agent(agent, host).into_iter().collect()
            }
            LifecycleEvent::AgentDisconnected { agent } => {
                self.disconnect_agent(agent, host).into_iter().collect()
            }
            LifecycleEvent::StructureBuilt {
                zone,
                fixture,
                level,
                owner,
            } => self.fixture_built(zone, fixture, level, owner, host),
            LifecycleEvent::StructureDestroyed { zone, fixture } => {
                self.fixture_destroyed(zone, fixture, host)
            }
            LifecycleEvent::AuthorizationGranted { zone, agent }
            | LifecycleEvent::AuthorizationRevoked { zone, agent } => {
                debug!(zone_id = %zone, agent_id = %agent, "authorization changed");
                self.refresh_agent(agent, host).into_iter().collect()
            }
            LifecycleEvent::AuthorizationListCleared { zone, cleared_by } => {
                self.authorization_list_cleared(zone, cleared_by, host)
            }
            LifecycleEvent::PermissionChanged { agent } => {
                self.refresh_agent(agent, host).into_iter().collect()
            }
            LifecycleEvent::GroupPermissionChanged => self.refresh_all(host),
            LifecycleEvent::DirectProximityEntered { agent, level } => {
                self.set_direct_bonus(agent, Some(level), host).into_iter().collect()
            }
            LifecycleEvent::DirectProximityLeft { agent } => {
                self.set_direct_bonus(agent, None, host).into_iter().collect()
            }
        }
    }

    /// Start tracking an agent and evaluate it immediately.
    pub fn connect_agent<H>(&mut self, agent: AgentId, host: &mut H) -> Option<LevelChange>
    where
        H: Host + ?Sized,
    {
        let _ = self.agents.get_or_create(agent);
        debug!(agent_id = %agent, "agent connected");
        self.refresh_agent(agent, host)
    }

    /// Stop tracking an agent.
    ///
    /// The agent first loses every zone (both sides of the relation), then
    /// its level is recomputed as if it had walked out of all of them, which
    /// runs the usual cancellation policy, and only then is its record
    /// deleted. Unknown agents are ignored.
    pub fn disconnect_agent<H>(&mut self, agent: AgentId, host: &mut H) -> Option<LevelChange>
    where
        H: Host + ?Sized,
    {
        if !self.agents.contains(agent) {
            return None;
        }
        let change = self.suspend(agent, host);
        let _ = self.agents.remove(agent, &mut self.zones);
        debug!(agent_id = %agent, "agent disconnected");
        change
    }

    /// A fixture finished building. Every member of the zone (and the
    /// owner, if tracked) is recomputed right away, and the owner gets a
    /// one-time notice if enabled.
    pub fn fixture_built<H>(
        &mut self,
        zone: ZoneId,
        fixture: FixtureId,
        level: Level,
        owner: Option<AgentId>,
        host: &mut H,
    ) -> Vec<LevelChange>
    where
        H: Host + ?Sized,
    {
        let aggregate = self.zones.on_fixture_built(zone, level, fixture);
        debug!(zone_id = %zone, fixture_id = %fixture, level, aggregate, "fixture built");

        let mut affected: BTreeSet<AgentId> = self.zones.members(zone).into_iter().collect();
        affected.extend(owner);
        let changes = self.recompute_each(affected, host);

        if let Some(owner) = owner {
            self.notify_range_extended(owner, host);
        }
        changes
    }

    /// A fixture was destroyed. Every member of the zone is recomputed.
    pub fn fixture_destroyed<H>(
        &mut self,
        zone: ZoneId,
        fixture: FixtureId,
        host: &mut H,
    ) -> Vec<LevelChange>
    where
        H: Host + ?Sized,
    {
        let aggregate = self.zones.on_fixture_removed(zone, fixture);
        debug!(zone_id = %zone, fixture_id = %fixture, aggregate, "fixture destroyed");
        let members = self.zones.members(zone);
        self.recompute_each(members, host)
    }

    /// A zone's authorization list was wiped: rescan every member and the
    /// agent who wiped it.
    pub fn authorization_list_cleared<H>(
        &mut self,
        zone: ZoneId,
        cleared_by: Option<AgentId>,
        host: &mut H,
    ) -> Vec<LevelChange>
    where
        H: Host + ?Sized,
    {
        let mut affected: BTreeSet<AgentId> = self.zones.members(zone).into_iter().collect();
        affected.extend(cleared_by);
        debug!(zone_id = %zone, affected = affected.len(), "authorization list cleared");
        affected
            .into_iter()
            .filter_map(|agent| self.refresh_agent(agent, host))
            .collect()
    }

    /// Set or clear the agent's direct-proximity bonus and recompute.
    ///
    /// An agent without [`USE_PERMISSION`] holds no bonus: it is suspended
    /// exactly as a pass would suspend it, so its level stays 0.
    pub fn set_direct_bonus<H>(
        &mut self,
        agent: AgentId,
        bonus: Option<Level>,
        host: &mut H,
    ) -> Option<LevelChange>
    where
        H: Host + ?Sized,
    {
        if !self.agents.contains(agent) {
            return None;
        }
        if !host.has_permission(agent, USE_PERMISSION) {
            trace!(agent_id = %agent, "direct bonus ignored, agent not permitted");
            return self.suspend(agent, host);
        }
        let record = self.agents.get_mut(agent)?;
        if record.direct_bonus() == bonus {
            return None;
        }
        record.set_direct_bonus(bonus);
        self.recompute(agent, host)
    }

    /// Re-evaluate one agent outside the pass cadence: scan and recompute
    /// if it holds [`USE_PERMISSION`], otherwise drop its memberships.
    pub fn refresh_agent<H>(&mut self, agent: AgentId, host: &mut H) -> Option<LevelChange>
    where
        H: Host + ?Sized,
    {
        match self.evaluate(agent, host) {
            SliceOutcome::Scanned { change, .. } | SliceOutcome::NotPermitted { change } => change,
            SliceOutcome::Missing => None,
        }
    }

    /// Re-evaluate every tracked agent immediately.
    pub fn refresh_all<H>(&mut self, host: &mut H) -> Vec<LevelChange>
    where
        H: Host + ?Sized,
    {
        self.agents
            .ids()
            .into_iter()
            .filter_map(|agent| self.refresh_agent(agent, host))
            .collect()
    }

    /// Evaluate one agent. This is the body of a pass slice.
    ///
    /// Live state is re-read on every call, so an agent that vanished
    /// between slices is reported as [`SliceOutcome::Missing`] rather than
    /// treated as an error.
    pub fn evaluate<H>(&mut self, agent: AgentId, host: &mut H) -> SliceOutcome
    where
        H: Host + ?Sized,
    {
        if !self.agents.contains(agent) {
            return SliceOutcome::Missing;
        }
        if !host.has_permission(agent, USE_PERMISSION) {
            return SliceOutcome::NotPermitted {
                change: self.suspend(agent, host),
            };
        }
        let diff = scanner::scan(
            &mut self.zones,
            &mut self.agents,
            host,
            agent,
            self.config.base_distance_meters,
        );
        let change = self.recompute(agent, host);
        SliceOutcome::Scanned { diff, change }
    }

    /// Drop zones with no fixtures and no members.
    pub fn prune_inert_zones(&mut self) -> usize {
        self.zones.prune_inert()
    }

    /// Hand every elevated agent back to level 0 and forget all state.
    ///
    /// Used on unload. Queued crafts are left alone: the host's own range
    /// checks take over once the tracker is gone. Returns how many agents
    /// were reset.
    pub fn release_all<H>(&mut self, host: &mut H) -> usize
    where
        H: Host + ?Sized,
    {
        let mut reset: usize = 0;
        for (&agent, record) in self.agents.iter() {
            if record.applied_level() != NO_CAPABILITY {
                host.apply_capability(
                    agent,
                    NO_CAPABILITY,
                    CapabilityFlags::from_level(NO_CAPABILITY),
                );
                reset = reset.saturating_add(1);
            }
        }
        self.agents = AgentIndex::new();
        self.zones = ZoneRegistry::new();
        info!(reset, "tracker released all agents");
        reset
    }

    /// Drop every membership and the direct bonus, then recompute (which
    /// resets an elevated level to 0 and runs craft cancellation).
    fn suspend<H>(&mut self, agent: AgentId, host: &mut H) -> Option<LevelChange>
    where
        H: Host + ?Sized,
    {
        let left = self.agents.detach_all(agent, &mut self.zones);
        if let Some(record) = self.agents.get_mut(agent) {
            record.set_direct_bonus(None);
        }
        if !left.is_empty() {
            debug!(agent_id = %agent, zones = left.len(), "agent lost all zones");
        }
        self.recompute(agent, host)
    }

    fn recompute<H>(&mut self, agent: AgentId, host: &mut H) -> Option<LevelChange>
    where
        H: Host + ?Sized,
    {
        propagator::recompute(
            &self.zones,
            &mut self.agents,
            host,
            agent,
            self.config.notify_on_craft_cancel,
        )
    }

    fn recompute_each<H, I>(&mut self, agents: I, host: &mut H) -> Vec<LevelChange>
    where
        H: Host + ?Sized,
        I: IntoIterator<Item = AgentId>,
    {
        agents
            .into_iter()
            .filter_map(|agent| self.recompute(agent, host))
            .collect()
    }

    fn notify_range_extended<H>(&mut self, owner: AgentId, host: &mut H)
    where
        H: Host + ?Sized,
    {
        if !self.config.notify_on_build || !host.has_permission(owner, USE_PERMISSION) {
            return;
        }
        let Some(record) = self.agents.get_mut(owner) else {
            return;
        };
        if record.build_notified() {
            return;
        }
        record.mark_build_notified();
        host.notify(owner, &Notice::RangeExtended);
    }
}
