//! Random host activity that produces lifecycle events.
//!
//! Stands in for players: every tick agents wander, and now and then an
//! agent is added to or dropped from a base's authorization list, a base's
//! fixture is destroyed or rebuilt, or an agent's use permission flips.
//! Each change is applied to the [`SimWorld`] first and then reported as the
//! [`LifecycleEvent`] a real host would raise.

use craftzone_types::{AgentId, FixtureId, Level, LifecycleEvent, Permissions, USE_PERMISSION};
use craftzone_world::{SimWorld, StartingBase};
use rand::Rng;
use rand::rngs::SmallRng;
use tracing::{trace, warn};

/// Chance per tick that one authorization is toggled.
const AUTH_TOGGLE_CHANCE: f64 = 0.02;

/// Chance per tick that one base's fixture is destroyed or rebuilt.
const FIXTURE_CHURN_CHANCE: f64 = 0.005;

/// Chance per tick that one agent's use permission flips.
const PERMISSION_FLIP_CHANCE: f64 = 0.002;

#[derive(Debug, Clone, Copy)]
struct BaseSite {
    base: StartingBase,
    /// Fixture currently standing, if any.
    standing: Option<FixtureId>,
}

/// Generates host-side changes from a seeded RNG.
#[derive(Debug)]
pub struct HostActivity {
    rng: SmallRng,
    sites: Vec<BaseSite>,
    agents: Vec<AgentId>,
    wander_step: f32,
}

impl HostActivity {
    /// Create an activity source over the given bases and agents.
    pub fn new(
        rng: SmallRng,
        bases: &[StartingBase],
        agents: Vec<AgentId>,
        wander_step: f32,
    ) -> Self {
        Self {
            rng,
            sites: bases
                .iter()
                .map(|&base| BaseSite {
                    base,
                    standing: Some(base.fixture),
                })
                .collect(),
            agents,
            wander_step,
        }
    }

    /// Advance the host by one tick and return the events it raised.
    pub fn tick(&mut self, world: &mut SimWorld) -> Vec<LifecycleEvent> {
        world.wander(&mut self.rng, self.wander_step);

        let mut events = Vec::new();
        if self.rng.random_bool(AUTH_TOGGLE_CHANCE) {
            events.extend(self.toggle_authorization(world));
        }
        if self.rng.random_bool(FIXTURE_CHURN_CHANCE) {
            events.extend(self.churn_fixture(world));
        }
        if self.rng.random_bool(PERMISSION_FLIP_CHANCE) {
            events.extend(self.flip_permission(world));
        }
        events
    }

    fn pick_agent(&mut self) -> Option<AgentId> {
        if self.agents.is_empty() {
            return None;
        }
        let index = self.rng.random_range(0..self.agents.len());
        self.agents.get(index).copied()
    }

    fn pick_site(&mut self) -> Option<usize> {
        if self.sites.is_empty() {
            return None;
        }
        Some(self.rng.random_range(0..self.sites.len()))
    }

    fn toggle_authorization(&mut self, world: &mut SimWorld) -> Option<LifecycleEvent> {
        let agent = self.pick_agent()?;
        let index = self.pick_site()?;
        let zone = self.sites.get(index)?.base.zone;
        let authorized = world.authorized_agents(zone).ok()?.contains(&agent);
        if authorized {
            world.deauthorize(zone, agent);
            trace!(agent_id = %agent, zone_id = %zone, "authorization revoked");
            Some(LifecycleEvent::AuthorizationRevoked { zone, agent })
        } else {
            world.authorize(zone, agent);
            trace!(agent_id = %agent, zone_id = %zone, "authorization granted");
            Some(LifecycleEvent::AuthorizationGranted { zone, agent })
        }
    }

    fn churn_fixture(&mut self, world: &mut SimWorld) -> Option<LifecycleEvent> {
        let index = self.pick_site()?;
        let level: Level = self.rng.random_range(1..=3);
        let site = self.sites.get_mut(index)?;
        let zone = site.base.zone;

        if let Some(fixture) = site.standing {
            if let Err(e) = world.destroy_fixture(fixture) {
                // Already gone from the world; still report it so the tracker drops it.
                warn!(
                    zone_id = %zone,
                    fixture_id = %fixture,
                    error = %e,
                    "fixture missing on destroy"
                );
            }
            site.standing = None;
            return Some(LifecycleEvent::StructureDestroyed { zone, fixture });
        }

        let owner = match world.authorized_agents(zone) {
            Ok(agents) => agents.first().copied(),
            Err(e) => {
                warn!(zone_id = %zone, error = %e, "fixture rebuild skipped");
                return None;
            }
        };
        let fixture = FixtureId::new();
        let _ = world.place_fixture(zone, fixture, level, site.base.center);
        site.standing = Some(fixture);
        Some(LifecycleEvent::StructureBuilt {
            zone,
            fixture,
            level,
            owner,
        })
    }

    fn flip_permission(&mut self, world: &mut SimWorld) -> Option<LifecycleEvent> {
        let agent = self.pick_agent()?;
        if world.has_permission(agent, USE_PERMISSION) {
            world.revoke_permission(agent, USE_PERMISSION);
        } else {
            world.grant_permission(agent, USE_PERMISSION);
        }
        Some(LifecycleEvent::PermissionChanged { agent })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::unreachable,
    clippy::arithmetic_side_effects
)]
mod tests {
    use craftzone_world::{WorldLayout, create_starting_world};
    use rand::SeedableRng;

    use super::*;

    fn activity() -> (SimWorld, HostActivity) {
        let (world, start) = create_starting_world(&WorldLayout::default()).unwrap();
        let activity =
            HostActivity::new(SmallRng::seed_from_u64(5), &start.bases, start.agents, 0.5);
        (world, activity)
    }

    #[test]
    fn churn_alternates_destroy_and_rebuild() {
        let (mut world, mut activity) = activity();
        let before = world.fixtures().len();

        let first = activity.churn_fixture(&mut world).unwrap();
        assert!(matches!(first, LifecycleEvent::StructureDestroyed { .. }));
        assert_eq!(world.fixtures().len(), before - 1);

        // The world always agrees with what each site thinks is standing.
        for _ in 0..64 {
            let _ = activity.churn_fixture(&mut world);
        }
        let standing = activity.sites.iter().filter(|s| s.standing.is_some()).count();
        assert_eq!(world.fixtures().len(), standing);
    }

    #[test]
    fn churn_reports_fixture_already_gone_from_world() {
        let (mut world, mut activity) = activity();
        activity.sites.truncate(1);
        let fixture = activity.sites.first().unwrap().standing.unwrap();
        let _ = world.destroy_fixture(fixture).unwrap();

        let event = activity.churn_fixture(&mut world).unwrap();
        assert!(matches!(
            event,
            LifecycleEvent::StructureDestroyed { fixture: f, .. } if f == fixture
        ));
        assert!(activity.sites.first().unwrap().standing.is_none());

        // The next churn rebuilds, and world and site agree again.
        let rebuilt = activity.churn_fixture(&mut world).unwrap();
        assert!(matches!(rebuilt, LifecycleEvent::StructureBuilt { .. }));
        assert_eq!(world.fixtures().len(), 4);
    }

    #[test]
    fn toggle_reports_what_it_did() {
        let (mut world, mut activity) = activity();
        for _ in 0..20 {
            match activity.toggle_authorization(&mut world).unwrap() {
                LifecycleEvent::AuthorizationGranted { zone, agent } => {
                    assert!(world.authorized_agents(zone).unwrap().contains(&agent));
                }
                LifecycleEvent::AuthorizationRevoked { zone, agent } => {
                    assert!(!world.authorized_agents(zone).unwrap().contains(&agent));
                }
                other => unreachable!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn permission_flip_round_trips() {
        let (mut world, mut activity) = activity();
        activity.agents.truncate(1);
        let agent = *activity.agents.first().unwrap();
        assert!(world.has_permission(agent, USE_PERMISSION));
        let _ = activity.flip_permission(&mut world);
        assert!(!world.has_permission(agent, USE_PERMISSION));
        let _ = activity.flip_permission(&mut world);
        assert!(world.has_permission(agent, USE_PERMISSION));
    }
}
