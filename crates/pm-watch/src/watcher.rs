//! Power-state watcher
//!
//! Blocks the caller until the device reaches a power state or a deadline
//! passes. Two interchangeable strategies, chosen once at construction:
//!
//! ```text
//! StatusPoll     power/runtime_status     "active" | "suspended" | "suspending"
//! ResidencyPoll  MSR 0x630..=0x632        any counter moved => deep state reached
//! ```
//!
//! Both sample every 100 ms and account the deadline by counting intervals:
//! a `timeout_s` wait takes at most `timeout_s * 10` samples and sleeps
//! exactly `timeout_s` seconds when the target never shows up.

use crate::clock::{Sleeper, ThreadSleeper};
use crate::config::Timeouts;
use crate::error::{PmError, Result};
use crate::residency::ResidencySource;
use crate::state::{PowerState, WaitOutcome};
use crate::status::StatusSource;
use pm_regs::poll::{attempts, POLL_INTERVAL};
use std::time::Duration;
use tracing::{debug, info};

/// How the watcher observes the device
#[derive(Debug)]
pub enum Strategy {
    /// Poll a runtime-PM status string
    StatusPoll(Box<dyn StatusSource>),
    /// Infer deep power state from residency counter movement
    ResidencyPoll(Box<dyn ResidencySource>),
}

impl Strategy {
    /// Strategy tag
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Self::StatusPoll(_) => StrategyKind::StatusPoll,
            Self::ResidencyPoll(_) => StrategyKind::ResidencyPoll,
        }
    }
}

/// Strategy tag without the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Runtime-PM status string
    StatusPoll,
    /// Residency counters
    ResidencyPoll,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StatusPoll => write!(f, "runtime_status poll"),
            Self::ResidencyPoll => write!(f, "PC8+ residency poll"),
        }
    }
}

/// Blocking power-state watcher
///
/// Owned by the test fixture and borrowed mutably for each wait, so only one
/// wait can be in flight at a time.
#[derive(Debug)]
pub struct PowerStateWatcher<S: Sleeper = ThreadSleeper> {
    strategy: Strategy,
    sleeper: S,
    timeouts: Timeouts,
}

impl PowerStateWatcher<ThreadSleeper> {
    /// Watcher that sleeps on the calling thread
    pub fn new(strategy: Strategy) -> Self {
        Self::with_sleeper(strategy, ThreadSleeper)
    }
}

impl<S: Sleeper> PowerStateWatcher<S> {
    /// Watcher with a custom sleeper
    pub fn with_sleeper(strategy: Strategy, sleeper: S) -> Self {
        info!("Power-state watcher using {}", strategy.kind());
        Self {
            strategy,
            sleeper,
            timeouts: Timeouts::default(),
        }
    }

    /// Replace the deadlines used by the named waits
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Active strategy
    pub const fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Deadlines used by the named waits
    pub const fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Block for `duration` using the watcher's sleeper
    ///
    /// Lets callers hold a condition for a while on the same timeline the
    /// waits use.
    pub fn hold(&mut self, duration: Duration) {
        self.sleeper.sleep(duration);
    }

    /// Current state, as far as the strategy can tell
    ///
    /// Residency counters cannot say what the device is doing right now, so
    /// that strategy always reports [`PowerState::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns the status source read or parse error.
    pub fn current_state(&mut self) -> Result<PowerState> {
        match &mut self.strategy {
            Strategy::StatusPoll(source) => source.state(),
            Strategy::ResidencyPoll(_) => Ok(PowerState::Unknown),
        }
    }

    /// Wait until the device is in `target`, for at most `timeout_s` seconds
    ///
    /// Under the residency strategy, `Suspended` means "deep residency
    /// moved" and `Active` means "deep residency stayed frozen for the whole
    /// window", so an `Active` wait that succeeds always takes `timeout_s`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `target` is not `Active`/`Suspended` or
    ///   `timeout_s` is zero.
    /// - `ContractViolation` if the status source returns an unknown string.
    /// - `UnsupportedPlatform` if the residency counters cannot be read.
    pub fn wait_for_state(&mut self, target: PowerState, timeout_s: u32) -> Result<WaitOutcome> {
        if !target.is_wait_target() {
            return Err(PmError::invalid_argument(format!(
                "cannot wait for '{target}', only active or suspended"
            )));
        }

        let outcome = match &mut self.strategy {
            Strategy::StatusPoll(source) => {
                poll_until(&mut self.sleeper, timeout_s, || {
                    let state = source.state()?;
                    debug!("runtime_status: {state}");
                    Ok(state == target)
                })?
            }
            Strategy::ResidencyPoll(source) => {
                let moved = residency_moved(&mut self.sleeper, source.as_mut(), timeout_s)?;
                match target {
                    PowerState::Suspended => moved,
                    _ => moved.inverted(),
                }
            }
        };

        info!("Wait for {target} ({timeout_s}s): {outcome:?}");
        Ok(outcome)
    }

    /// Wait for the device to suspend, using the configured deadline
    ///
    /// # Errors
    ///
    /// See [`Self::wait_for_state`].
    pub fn wait_for_suspended(&mut self) -> Result<WaitOutcome> {
        let timeout_s = match self.strategy.kind() {
            StrategyKind::StatusPoll => self.timeouts.status_s,
            StrategyKind::ResidencyPoll => self.timeouts.residency_reached_s,
        };
        self.wait_for_state(PowerState::Suspended, timeout_s)
    }

    /// Wait for the device to be active, using the configured deadline
    ///
    /// # Errors
    ///
    /// See [`Self::wait_for_state`].
    pub fn wait_for_active(&mut self) -> Result<WaitOutcome> {
        let timeout_s = match self.strategy.kind() {
            StrategyKind::StatusPoll => self.timeouts.status_s,
            StrategyKind::ResidencyPoll => self.timeouts.residency_blocked_s,
        };
        self.wait_for_state(PowerState::Active, timeout_s)
    }

    /// Whether any residency counter moves within `timeout_s` seconds
    ///
    /// Returns `Reached` at the first sample that differs from the baseline
    /// taken at call start.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` under the status strategy or with a zero timeout;
    /// `UnsupportedPlatform` if the counters cannot be read.
    pub fn residency_changed(&mut self, timeout_s: u32) -> Result<WaitOutcome> {
        match &mut self.strategy {
            Strategy::ResidencyPoll(source) => {
                residency_moved(&mut self.sleeper, source.as_mut(), timeout_s)
            }
            Strategy::StatusPoll(_) => Err(PmError::invalid_argument(
                "residency predicates need the residency strategy",
            )),
        }
    }

    /// The package is reaching PC8+: residency moves within the
    /// `residency_reached_s` deadline
    ///
    /// Expected to return quickly; the deadline only matters on failure.
    ///
    /// # Errors
    ///
    /// See [`Self::residency_changed`].
    pub fn deep_residency_reached(&mut self) -> Result<bool> {
        let timeout_s = self.timeouts.residency_reached_s;
        Ok(self.residency_changed(timeout_s)?.is_reached())
    }

    /// The package is kept out of PC8+: residency stays frozen for the whole
    /// `residency_blocked_s` window
    ///
    /// Costs the full window every time it succeeds.
    ///
    /// # Errors
    ///
    /// See [`Self::residency_changed`].
    pub fn deep_residency_blocked(&mut self) -> Result<bool> {
        let timeout_s = self.timeouts.residency_blocked_s;
        Ok(!self.residency_changed(timeout_s)?.is_reached())
    }
}

/// Sample until `matched` returns `true` or the interval budget runs out
fn poll_until<S: Sleeper>(
    sleeper: &mut S,
    timeout_s: u32,
    mut matched: impl FnMut() -> Result<bool>,
) -> Result<WaitOutcome> {
    if timeout_s == 0 {
        return Err(PmError::invalid_argument("timeout must be at least one second"));
    }

    for _ in 0..attempts(timeout_s) {
        if matched()? {
            return Ok(WaitOutcome::Reached);
        }
        sleeper.sleep(POLL_INTERVAL);
    }

    Ok(WaitOutcome::TimedOut)
}

fn residency_moved<S: Sleeper>(
    sleeper: &mut S,
    source: &mut dyn ResidencySource,
    timeout_s: u32,
) -> Result<WaitOutcome> {
    if timeout_s == 0 {
        return Err(PmError::invalid_argument("timeout must be at least one second"));
    }

    let baseline = source
        .sample()
        .map_err(|e| PmError::unsupported(format!("cannot read PC8+ residency: {e}")))?;
    debug!("Residency baseline: {baseline:?}");

    poll_until(sleeper, timeout_s, || {
        let now = source.sample()?;
        match now.changed_since(&baseline) {
            Some(class) => {
                debug!("{class} residency moved: {now:?}");
                Ok(true)
            }
            None => Ok(false),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::residency::ResidencyClass;
    use crate::sim::{ScriptedResidency, ScriptedStatus, SimClock};

    fn status_watcher(status: &ScriptedStatus, clock: &SimClock) -> PowerStateWatcher<SimClock> {
        PowerStateWatcher::with_sleeper(Strategy::StatusPoll(Box::new(status.clone())), clock.clone())
    }

    fn residency_watcher(
        res: &ScriptedResidency,
        clock: &SimClock,
    ) -> PowerStateWatcher<SimClock> {
        PowerStateWatcher::with_sleeper(Strategy::ResidencyPoll(Box::new(res.clone())), clock.clone())
    }

    #[test]
    fn immediate_match_does_not_sleep() {
        let clock = SimClock::new();
        let status = ScriptedStatus::constant(&clock, "active\n");
        let mut w = status_watcher(&status, &clock);

        assert_eq!(w.wait_for_state(PowerState::Active, 5).unwrap(), WaitOutcome::Reached);
        assert_eq!(clock.now(), Duration::ZERO);
        assert_eq!(status.reads(), 1);
    }

    #[test]
    fn never_matching_sleeps_the_whole_deadline() {
        let clock = SimClock::new();
        let status = ScriptedStatus::constant(&clock, "suspended\n");
        let mut w = status_watcher(&status, &clock);

        assert_eq!(w.wait_for_state(PowerState::Active, 5).unwrap(), WaitOutcome::TimedOut);
        assert_eq!(clock.now(), Duration::from_secs(5));
        assert_eq!(status.reads(), 50);
    }

    #[test]
    fn transition_is_seen_on_the_next_sample() {
        let clock = SimClock::new();
        let status = ScriptedStatus::constant(&clock, "active\n")
            .then_at(Duration::from_millis(250), "suspending\n")
            .then_at(Duration::from_millis(730), "suspended\n");
        let mut w = status_watcher(&status, &clock);

        assert!(w.wait_for_state(PowerState::Suspended, 2).unwrap().is_reached());
        assert_eq!(clock.now(), Duration::from_millis(800));
    }

    #[test]
    fn malformed_status_is_fatal_not_a_timeout() {
        let clock = SimClock::new();
        let status = ScriptedStatus::constant(&clock, "foo\n");
        let mut w = status_watcher(&status, &clock);

        let err = w.wait_for_state(PowerState::Active, 5).unwrap_err();
        assert!(matches!(err, PmError::ContractViolation { .. }));
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn rejects_transient_targets_and_zero_timeout() {
        let clock = SimClock::new();
        let status = ScriptedStatus::constant(&clock, "suspending\n");
        let mut w = status_watcher(&status, &clock);

        assert!(matches!(
            w.wait_for_state(PowerState::Suspending, 1),
            Err(PmError::InvalidArgument { .. })
        ));
        assert!(matches!(
            w.wait_for_state(PowerState::Active, 0),
            Err(PmError::InvalidArgument { .. })
        ));
        assert_eq!(status.reads(), 0);
    }

    #[test]
    fn residency_move_reaches_suspended_at_that_sample() {
        let clock = SimClock::new();
        let res = ScriptedResidency::frozen(&clock).bump_at(Duration::from_millis(300), ResidencyClass::Pc10);
        let mut w = residency_watcher(&res, &clock);

        assert!(w.wait_for_state(PowerState::Suspended, 5).unwrap().is_reached());
        assert_eq!(clock.now(), Duration::from_millis(300));
    }

    #[test]
    fn frozen_residency_confirms_active_after_full_window() {
        let clock = SimClock::new();
        let res = ScriptedResidency::frozen(&clock);
        let mut w = residency_watcher(&res, &clock);

        assert!(w.wait_for_state(PowerState::Active, 5).unwrap().is_reached());
        assert_eq!(clock.now(), Duration::from_secs(5));
        assert_eq!(w.current_state().unwrap(), PowerState::Unknown);
    }

    #[test]
    fn unreadable_residency_is_unsupported() {
        let clock = SimClock::new();
        let res = ScriptedResidency::unreadable(&clock);
        let mut w = residency_watcher(&res, &clock);

        assert!(matches!(
            w.wait_for_state(PowerState::Suspended, 1),
            Err(PmError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn residency_predicates_need_residency_strategy() {
        let clock = SimClock::new();
        let status = ScriptedStatus::constant(&clock, "active\n");
        let mut w = status_watcher(&status, &clock);

        assert!(matches!(w.deep_residency_reached(), Err(PmError::InvalidArgument { .. })));
    }

    #[test]
    fn named_waits_use_configured_deadlines() {
        let clock = SimClock::new();
        let res = ScriptedResidency::frozen(&clock);
        let mut w = residency_watcher(&res, &clock).with_timeouts(Timeouts {
            status_s: 10,
            residency_reached_s: 3,
            residency_blocked_s: 2,
        });

        assert!(!w.wait_for_suspended().unwrap().is_reached());
        assert_eq!(clock.now(), Duration::from_secs(3));
        assert!(w.deep_residency_blocked().unwrap());
        assert_eq!(clock.now(), Duration::from_secs(5));
    }
}
