//! Time-sliced pass scheduler.
//!
//! The scheduler is a resumable state machine driven by the host: call
//! [`PassScheduler::advance`] once per host tick and it does at most one
//! slice of work before returning.
//!
//! # States
//!
//! - [`PassState::Idle`]: counting ticks toward the next interval trigger.
//! - [`PassState::Scanning`]: walking the pass roster, `cursor` agents done.
//! - [`PassState::Cancelled`]: shutdown was requested; terminal.
//!
//! # Pacing
//!
//! Each tick the live population is re-sampled and the per-tick capacity is
//! `target_frame_rate * update_interval_seconds / population * safety_factor`. A
//! capacity of at least one processes `floor(capacity)` agents this tick.
//! Below one, exactly one agent is processed and the fraction is added to
//! `carried_fraction` for diagnostics only, so a large population stretches
//! the pass past the interval but never drops an agent.
//!
//! # Roster
//!
//! The agent list is snapshotted when a pass starts. The cursor indexes
//! that snapshot, so disconnects between slices cannot shift later agents
//! past the cursor. Agents gone by their turn are skipped; agents connected
//! mid-pass wait for the next pass.

use craftzone_types::{AgentId, Host};
use tracing::{debug, info, trace};

use crate::config::TrackerConfig;
use crate::shutdown::ShutdownSignal;
use crate::tracker::{SliceOutcome, Tracker};

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassState {
    /// Waiting for the next interval trigger.
    Idle,
    /// A pass is in flight.
    Scanning {
        /// Number of roster entries already processed.
        cursor: usize,
        /// Sum of sub-unit capacities seen during this pass.
        carried_fraction: f64,
    },
    /// Shutdown observed; [`PassScheduler::advance`] is a no-op from now on.
    Cancelled,
}

/// What one call to [`PassScheduler::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassProgress {
    /// No pass is running.
    Idle,
    /// A slice ran and the pass is still in flight.
    Sliced {
        /// Agents scanned this tick.
        scanned: usize,
        /// Agents skipped this tick (disconnected or not permitted).
        skipped: usize,
        /// Roster entries left after this tick.
        remaining: usize,
    },
    /// A slice ran and finished the pass.
    Completed {
        /// Agents scanned over the whole pass.
        scanned: usize,
        /// Agents skipped over the whole pass.
        skipped: usize,
        /// Ticks the pass spanned, including this one.
        ticks: u64,
    },
    /// The scheduler is cancelled.
    Cancelled,
}

/// Running counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PassStats {
    /// Passes run to completion.
    pub passes_completed: u64,
    /// Agents scanned across all passes.
    pub agents_scanned: u64,
    /// Agents skipped across all passes.
    pub agents_skipped: u64,
    /// Ticks spent so far in the pass in flight (0 when idle).
    pub ticks_in_current_pass: u64,
    /// Length in ticks of the last completed pass.
    pub last_pass_ticks: u64,
    /// `carried_fraction` of the pass in flight, or of the last pass.
    pub carried_fraction: f64,
}

/// Raw per-tick capacity for a population. Zero when nobody is active.
#[allow(clippy::cast_precision_loss)]
pub fn per_tick_capacity(
    target_frame_rate: u32,
    update_interval_seconds: f64,
    active_agents: usize,
    safety_factor: f64,
) -> f64 {
    if active_agents == 0 {
        return 0.0;
    }
    f64::from(target_frame_rate) * update_interval_seconds / active_agents as f64 * safety_factor
}

/// Agents to process this tick for a raw capacity: `floor(capacity)`, or 1
/// when the capacity is below one.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn batch_size(capacity: f64) -> usize {
    if capacity >= 1.0 {
        capacity.floor().min(usize::MAX as f64) as usize
    } else {
        1
    }
}

/// Ticks between interval triggers, at least one.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn interval_ticks(config: &TrackerConfig) -> u64 {
    let ticks = (config.update_interval_seconds * f64::from(config.target_frame_rate)).round();
    if ticks >= 1.0 {
        ticks.min(u64::MAX as f64) as u64
    } else {
        1
    }
}

/// Drives one pass over all agents per interval, a bounded slice per tick.
#[derive(Debug, Clone)]
pub struct PassScheduler {
    state: PassState,
    roster: Vec<AgentId>,
    interval_ticks: u64,
    ticks_since_trigger: u64,
    target_frame_rate: u32,
    update_interval_seconds: f64,
    safety_factor: f64,
    pass_scanned: usize,
    pass_skipped: usize,
    stats: PassStats,
    shutdown: ShutdownSignal,
}

impl PassScheduler {
    /// Create an idle scheduler. The first pass starts one interval from now.
    ///
    /// The config is clamped the same way [`Tracker::new`] clamps it, so a
    /// tracker and scheduler built from one config agree on cadence.
    pub fn new(config: &TrackerConfig, shutdown: ShutdownSignal) -> Self {
        let config = config.clone().validated();
        Self {
            state: PassState::Idle,
            roster: Vec::new(),
            interval_ticks: interval_ticks(&config),
            ticks_since_trigger: 0,
            target_frame_rate: config.target_frame_rate,
            update_interval_seconds: config.update_interval_seconds,
            safety_factor: config.pass_safety_factor,
            pass_scanned: 0,
            pass_skipped: 0,
            stats: PassStats::default(),
            shutdown,
        }
    }

    /// Current state.
    pub const fn state(&self) -> PassState {
        self.state
    }

    /// Diagnostic counters.
    pub const fn stats(&self) -> PassStats {
        self.stats
    }

    /// Ticks between interval triggers.
    pub const fn interval_ticks(&self) -> u64 {
        self.interval_ticks
    }

    /// Stop for good. Any in-flight pass is abandoned.
    pub fn cancel(&mut self) {
        if self.state == PassState::Cancelled {
            return;
        }
        if let PassState::Scanning { cursor, .. } = self.state {
            info!(
                cursor,
                roster = self.roster.len(),
                "pass cancelled mid-flight"
            );
        } else {
            info!("pass scheduler cancelled");
        }
        self.state = PassState::Cancelled;
        self.roster.clear();
        self.stats.ticks_in_current_pass = 0;
    }

    /// Run one host tick's worth of work.
    pub fn advance<H>(&mut self, tracker: &mut Tracker, host: &mut H) -> PassProgress
    where
        H: Host + ?Sized,
    {
        if self.shutdown.is_requested() {
            self.cancel();
        }
        if self.state == PassState::Cancelled {
            return PassProgress::Cancelled;
        }

        self.ticks_since_trigger = self.ticks_since_trigger.saturating_add(1);
        if self.ticks_since_trigger >= self.interval_ticks {
            self.ticks_since_trigger = 0;
            self.on_trigger(tracker);
        }

        match self.state {
            PassState::Scanning {
                cursor,
                carried_fraction,
            } => self.run_slice(tracker, host, cursor, carried_fraction),
            PassState::Idle | PassState::Cancelled => PassProgress::Idle,
        }
    }

    fn on_trigger(&mut self, tracker: &Tracker) {
        if self.state != PassState::Idle {
            trace!("interval trigger ignored, pass still in flight");
            return;
        }
        if tracker.agents().is_empty() {
            return;
        }
        self.roster = tracker.agents().ids();
        self.pass_scanned = 0;
        self.pass_skipped = 0;
        self.stats.ticks_in_current_pass = 0;
        self.stats.carried_fraction = 0.0;
        self.state = PassState::Scanning {
            cursor: 0,
            carried_fraction: 0.0,
        };
        debug!(roster = self.roster.len(), "pass started");
    }

    fn run_slice<H>(
        &mut self,
        tracker: &mut Tracker,
        host: &mut H,
        mut cursor: usize,
        mut carried_fraction: f64,
    ) -> PassProgress
    where
        H: Host + ?Sized,
    {
        let capacity = per_tick_capacity(
            self.target_frame_rate,
            self.update_interval_seconds,
            tracker.agents().len(),
            self.safety_factor,
        );
        if capacity < 1.0 {
            carried_fraction += capacity;
        }
        let budget = batch_size(capacity);

        let mut scanned: usize = 0;
        let mut skipped: usize = 0;
        while scanned.saturating_add(skipped) < budget {
            let Some(&agent) = self.roster.get(cursor) else {
                break;
            };
            match tracker.evaluate(agent, host) {
                SliceOutcome::Scanned { .. } => scanned = scanned.saturating_add(1),
                SliceOutcome::Missing | SliceOutcome::NotPermitted { .. } => {
                    trace!(agent_id = %agent, "agent skipped in pass");
                    skipped = skipped.saturating_add(1);
                }
            }
            cursor = cursor.saturating_add(1);
        }

        self.pass_scanned = self.pass_scanned.saturating_add(scanned);
        self.pass_skipped = self.pass_skipped.saturating_add(skipped);
        self.stats.agents_scanned = self.stats.agents_scanned.saturating_add(scanned as u64);
        self.stats.agents_skipped = self.stats.agents_skipped.saturating_add(skipped as u64);
        self.stats.ticks_in_current_pass = self.stats.ticks_in_current_pass.saturating_add(1);
        self.stats.carried_fraction = carried_fraction;

        let remaining = self.roster.len().saturating_sub(cursor);
        if remaining > 0 {
            self.state = PassState::Scanning {
                cursor,
                carried_fraction,
            };
            return PassProgress::Sliced {
                scanned,
                skipped,
                remaining,
            };
        }

        self.finish_pass(tracker)
    }

    fn finish_pass(&mut self, tracker: &mut Tracker) -> PassProgress {
        let ticks = self.stats.ticks_in_current_pass;
        let pruned = tracker.prune_inert_zones();

        self.stats.passes_completed = self.stats.passes_completed.saturating_add(1);
        self.stats.last_pass_ticks = ticks;
        self.stats.ticks_in_current_pass = 0;
        self.roster.clear();
        self.state = PassState::Idle;

        debug!(
            scanned = self.pass_scanned,
            skipped = self.pass_skipped,
            ticks,
            pruned,
            carried_fraction = self.stats.carried_fraction,
            "pass completed"
        );

        PassProgress::Completed {
            scanned: self.pass_scanned,
            skipped: self.pass_skipped,
            ticks,
        }
    }
}
