//! Default starting world for the simulated host.
//!
//! Lays out four bases on a 60 m grid. Each base is a 3 x 3 floor of
//! foundation blocks governed by its own zone, with one capability fixture
//! at its center. Agents are scattered over the whole area from a seeded
//! RNG, each authorized on a random subset of bases and holding one queued
//! craft, so a run exercises entry, exit, level drops, and cancellation.

use craftzone_types::{Aabb, AgentId, FixtureId, Level, Vec3, ZoneId};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::WorldError;
use crate::sim::SimWorld;

/// Distance between neighbouring base centers.
const BASE_SPACING: f32 = 60.0;

/// Edge length of one foundation block.
const FOUNDATION_SIZE: f32 = 3.0;

/// Fixture level at each base, in layout order.
const BASE_LEVELS: [Level; 4] = [1, 2, 3, 2];

/// Parameters for [`create_starting_world`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldLayout {
    /// Agents to spawn.
    pub agent_count: usize,
    /// RNG seed for placement and authorization.
    pub seed: u64,
    /// Chance that an agent is authorized on any given base.
    pub authorization_chance: f64,
}

impl Default for WorldLayout {
    fn default() -> Self {
        Self {
            agent_count: 24,
            seed: 42,
            authorization_chance: 0.5,
        }
    }
}

/// A base in the starting world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartingBase {
    /// The base's zone.
    pub zone: ZoneId,
    /// Its capability fixture.
    pub fixture: FixtureId,
    /// The fixture's level.
    pub level: Level,
    /// Center of the base floor.
    pub center: Vec3,
}

/// Identifiers created by [`create_starting_world`].
#[derive(Debug, Clone, PartialEq)]
pub struct StartingWorld {
    /// Every base, in layout order.
    pub bases: Vec<StartingBase>,
    /// Every spawned agent.
    pub agents: Vec<AgentId>,
}

/// Build the default world.
///
/// # Errors
///
/// Returns [`WorldError::InvalidLayout`] if `authorization_chance` is not a
/// probability.
pub fn create_starting_world(layout: &WorldLayout) -> Result<(SimWorld, StartingWorld), WorldError> {
    if !(0.0..=1.0).contains(&layout.authorization_chance) {
        return Err(WorldError::InvalidLayout {
            reason: format!(
                "authorization_chance must be within [0, 1], got {}",
                layout.authorization_chance
            ),
        });
    }

    let mut world = SimWorld::new();
    let mut rng = SmallRng::seed_from_u64(layout.seed);

    let bases: Vec<StartingBase> = BASE_LEVELS
        .iter()
        .zip(base_centers())
        .map(|(&level, center)| build_base(&mut world, center, level))
        .collect();

    let extent = BASE_SPACING + FOUNDATION_SIZE * 3.0;
    let agents: Vec<AgentId> = (0..layout.agent_count)
        .map(|_| {
            let position = Vec3::new(
                rng.random_range(-FOUNDATION_SIZE * 3.0..=extent),
                0.0,
                rng.random_range(-FOUNDATION_SIZE * 3.0..=extent),
            );
            let agent = world.spawn_agent(position);
            for base in &bases {
                if rng.random_bool(layout.authorization_chance) {
                    world.authorize(base.zone, agent);
                }
            }
            let _ = world.queue_operation(agent, rng.random_range(1..=3));
            agent
        })
        .collect();

    info!(
        bases = bases.len(),
        agents = agents.len(),
        seed = layout.seed,
        "starting world created"
    );

    Ok((world, StartingWorld { bases, agents }))
}

fn base_centers() -> [Vec3; 4] {
    [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(BASE_SPACING, 0.0, 0.0),
        Vec3::new(0.0, 0.0, BASE_SPACING),
        Vec3::new(BASE_SPACING, 0.0, BASE_SPACING),
    ]
}

fn build_base(world: &mut SimWorld, center: Vec3, level: Level) -> StartingBase {
    let zone = world.create_zone();
    let half = Vec3::new(FOUNDATION_SIZE / 2.0, 0.1, FOUNDATION_SIZE / 2.0);
    for dx in [-FOUNDATION_SIZE, 0.0, FOUNDATION_SIZE] {
        for dz in [-FOUNDATION_SIZE, 0.0, FOUNDATION_SIZE] {
            let block_center = center.plus(Vec3::new(dx, 0.0, dz));
            let _ = world.place_block(zone, Aabb::from_center(block_center, half));
        }
    }
    let fixture = FixtureId::new();
    let _ = world.place_fixture(zone, fixture, level, center);
    StartingBase {
        zone,
        fixture,
        level,
        center,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use craftzone_types::{AccessControl, SpatialQuery, StructureFilter};

    use super::*;

    #[test]
    fn default_layout_builds_four_bases() {
        let (world, start) = create_starting_world(&WorldLayout::default()).unwrap();
        assert_eq!(start.bases.len(), 4);
        assert_eq!(start.agents.len(), 24);
        assert_eq!(world.fixtures().len(), 4);
        assert_eq!(world.zone_ids().len(), 4);
    }

    #[test]
    fn base_floor_is_governed_by_its_zone() {
        let (world, start) = create_starting_world(&WorldLayout::default()).unwrap();
        let base = start.bases.first().unwrap();
        let near = world.query_nearby(base.center, 1.0, StructureFilter::Governed);
        assert!(!near.is_empty());
        assert!(near
            .iter()
            .all(|s| world.governing_zone(s.id) == Some(base.zone)));
    }

    #[test]
    fn same_seed_gives_same_authorizations() {
        let layout = WorldLayout {
            agent_count: 10,
            ..WorldLayout::default()
        };
        let (a, sa) = create_starting_world(&layout).unwrap();
        let (b, sb) = create_starting_world(&layout).unwrap();
        let grants = |w: &SimWorld, s: &StartingWorld| -> Vec<bool> {
            s.agents
                .iter()
                .flat_map(|&agent| {
                    s.bases
                        .iter()
                        .map(move |base| w.is_authorized(base.zone, agent) == Some(true))
                })
                .collect()
        };
        assert_eq!(grants(&a, &sa), grants(&b, &sb));
    }

    #[test]
    fn every_agent_starts_with_one_craft() {
        let (world, start) = create_starting_world(&WorldLayout::default()).unwrap();
        assert!(start.agents.iter().all(|&a| world.pending_ids(a).len() == 1));
    }

    #[test]
    fn rejects_bad_probability() {
        let layout = WorldLayout {
            authorization_chance: 1.5,
            ..WorldLayout::default()
        };
        assert!(matches!(
            create_starting_world(&layout),
            Err(WorldError::InvalidLayout { .. })
        ));
    }
}
