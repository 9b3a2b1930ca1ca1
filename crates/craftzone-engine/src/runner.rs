//! Host tick loop.
//!
//! [`Engine`] owns the simulated world, the tracker, and the pass
//! scheduler. [`Engine::run`] ticks at the configured frame rate on a tokio
//! interval. Each tick:
//!
//! 1. the host moves agents and may raise lifecycle events,
//! 2. every event is applied to the tracker synchronously,
//! 3. the scheduler advances by one slice.
//!
//! The loop ends when the shared [`ShutdownSignal`] is raised, either by
//! Ctrl-C or by reaching `max_ticks`. The scheduler sees the signal at its
//! next slice boundary, after which every elevated agent is released.

use std::time::Duration;

use craftzone_core::{
    CraftzoneConfig, PassProgress, PassScheduler, PassStats, ShutdownSignal, Tracker,
};
use craftzone_world::{SimWorld, WorldLayout, create_starting_world};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::activity::HostActivity;
use crate::error::EngineError;

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The configured `max_ticks` was reached.
    MaxTicksReached,
    /// Shutdown was requested from outside (Ctrl-C).
    Interrupted,
}

/// Outcome of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// Why the run ended.
    pub end_reason: EndReason,
    /// Host ticks executed.
    pub ticks: u64,
    /// Scheduler counters at the end.
    pub stats: PassStats,
    /// Agents reset to level 0 on release.
    pub released: usize,
}

/// Everything the host loop drives.
#[derive(Debug)]
pub struct Engine {
    world: SimWorld,
    tracker: Tracker,
    scheduler: PassScheduler,
    activity: HostActivity,
    shutdown: ShutdownSignal,
    max_ticks: u64,
    tick_period: Duration,
}

impl Engine {
    /// Build the starting world and bootstrap the tracker over it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::World`] if the starting world cannot be built.
    pub fn new(config: &CraftzoneConfig, shutdown: ShutdownSignal) -> Result<Self, EngineError> {
        let layout = WorldLayout {
            agent_count: usize::try_from(config.simulation.agent_count).unwrap_or(usize::MAX),
            seed: config.simulation.seed,
            ..WorldLayout::default()
        };
        let (mut world, start) = create_starting_world(&layout)?;

        let mut tracker = Tracker::new(config.tracker.clone());
        let fixtures = start.bases.iter().map(|b| (b.zone, b.fixture, b.level));
        let changes = tracker.bootstrap(fixtures, start.agents.clone(), &mut world);
        debug!(elevated = changes.len(), "initial levels applied");

        let scheduler = PassScheduler::new(tracker.config(), shutdown.clone());
        let frame_rate = f64::from(tracker.config().target_frame_rate);
        let activity = HostActivity::new(
            SmallRng::seed_from_u64(config.simulation.seed.wrapping_add(1)),
            &start.bases,
            start.agents,
            config.simulation.wander_step_meters,
        );

        Ok(Self {
            world,
            tracker,
            scheduler,
            activity,
            shutdown,
            max_ticks: config.simulation.max_ticks,
            tick_period: Duration::from_secs_f64(1.0 / frame_rate),
        })
    }

    /// Run one host tick.
    pub fn step(&mut self) -> PassProgress {
        for event in self.activity.tick(&mut self.world) {
            let changes = self.tracker.handle_event(&event, &mut self.world);
            for change in &changes {
                debug!(
                    agent_id = %change.agent,
                    previous = change.previous,
                    current = change.current,
                    cancelled = change.cancelled.len(),
                    "level changed by host event"
                );
            }
        }
        self.scheduler.advance(&mut self.tracker, &mut self.world)
    }

    /// Tick until shutdown, then release every agent.
    pub async fn run(mut self) -> RunSummary {
        let mut interval = tokio::time::interval(self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            tick_period = ?self.tick_period,
            interval_ticks = self.scheduler.interval_ticks(),
            max_ticks = self.max_ticks,
            "host loop started"
        );

        let mut ticks: u64 = 0;
        let mut bounded = false;
        loop {
            interval.tick().await;
            if self.max_ticks > 0 && ticks >= self.max_ticks && !bounded {
                bounded = true;
                self.shutdown.request();
            }
            match self.step() {
                PassProgress::Cancelled => break,
                PassProgress::Completed {
                    scanned,
                    skipped,
                    ticks: pass_ticks,
                } => {
                    info!(scanned, skipped, pass_ticks, "scan pass completed");
                }
                PassProgress::Idle | PassProgress::Sliced { .. } => {}
            }
            ticks = ticks.saturating_add(1);
        }

        let released = self.tracker.release_all(&mut self.world);
        RunSummary {
            end_reason: if bounded {
                EndReason::MaxTicksReached
            } else {
                EndReason::Interrupted
            },
            ticks,
            stats: self.scheduler.stats(),
            released,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use craftzone_core::{SimulationConfig, TrackerConfig};
    use craftzone_types::NO_CAPABILITY;

    use super::*;

    fn fast_config(max_ticks: u64) -> CraftzoneConfig {
        CraftzoneConfig {
            tracker: TrackerConfig {
                update_interval_seconds: 0.01,
                target_frame_rate: 1000,
                ..TrackerConfig::default()
            },
            simulation: SimulationConfig {
                max_ticks,
                agent_count: 8,
                ..SimulationConfig::default()
            },
            ..CraftzoneConfig::default()
        }
    }

    #[test]
    fn bootstrap_elevates_agents_inside_bases() {
        let engine = Engine::new(&CraftzoneConfig::default(), ShutdownSignal::new()).unwrap();
        assert_eq!(engine.tracker.agents().len(), 24);
        assert_eq!(engine.tracker.zones().len(), 4);
        for (&agent, record) in engine.tracker.agents().iter() {
            assert_eq!(
                engine.world.applied_level(agent).unwrap_or(NO_CAPABILITY),
                record.applied_level()
            );
        }
    }

    #[tokio::test]
    async fn run_stops_at_max_ticks_and_releases() {
        let engine = Engine::new(&fast_config(40), ShutdownSignal::new()).unwrap();
        let summary = engine.run().await;
        assert_eq!(summary.end_reason, EndReason::MaxTicksReached);
        assert_eq!(summary.ticks, 40);
        assert!(summary.stats.passes_completed >= 1);
    }

    #[tokio::test]
    async fn huge_frame_rate_still_runs() {
        let mut config = fast_config(5);
        config.tracker.target_frame_rate = u32::MAX;
        let engine = Engine::new(&config, ShutdownSignal::new()).unwrap();
        assert!(engine.tick_period >= Duration::from_micros(999));
        let summary = engine.run().await;
        assert_eq!(summary.end_reason, EndReason::MaxTicksReached);
        assert_eq!(summary.ticks, 5);
    }

    #[tokio::test]
    async fn external_shutdown_interrupts_run() {
        let signal = ShutdownSignal::new();
        let engine = Engine::new(&fast_config(0), signal.clone()).unwrap();
        let handle = tokio::spawn(engine.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.request();
        let summary = handle.await.unwrap();
        assert_eq!(summary.end_reason, EndReason::Interrupted);
        assert!(summary.ticks > 0);
    }
}
