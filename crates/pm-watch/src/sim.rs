// SPDX-License-Identifier: AGPL-3.0-only

//! Simulated time and scripted sources
//!
//! Lets every poll loop in this crate run without hardware and without real
//! sleeping:
//!
//! - [`SimClock`] is a [`Sleeper`] that advances a shared counter instead of
//!   blocking.
//! - [`ScriptedStatus`] answers `runtime_status` reads from a timeline keyed
//!   on the clock.
//! - [`ScriptedResidency`] answers residency reads from a timeline of counter
//!   bumps.
//!
//! All three are cheap to clone and clones share state, so a test can hand
//! one copy to the watcher and keep another to inspect read counts and the
//! simulated time afterwards.

use crate::clock::Sleeper;
use crate::error::{PmError, Result};
use crate::residency::{ResidencyClass, ResidencySource};
use crate::status::StatusSource;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared simulated clock
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_us: Arc<AtomicU64>,
}

impl SimClock {
    /// Clock at t = 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated time since creation
    pub fn now(&self) -> Duration {
        Duration::from_micros(self.now_us.load(Ordering::SeqCst))
    }

    /// Move time forward without a sleeper call
    pub fn advance(&self, by: Duration) {
        let us = u64::try_from(by.as_micros()).unwrap_or(u64::MAX);
        self.now_us.fetch_add(us, Ordering::SeqCst);
    }
}

impl Sleeper for SimClock {
    fn sleep(&mut self, interval: Duration) {
        self.advance(interval);
    }
}

/// `runtime_status` content scripted over simulated time
#[derive(Debug, Clone)]
pub struct ScriptedStatus {
    clock: SimClock,
    timeline: Vec<(Duration, String)>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedStatus {
    /// Source that reports `content` from t = 0 on
    pub fn constant(clock: &SimClock, content: impl Into<String>) -> Self {
        Self {
            clock: clock.clone(),
            timeline: vec![(Duration::ZERO, content.into())],
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Switch to `content` once the clock reaches `at`
    #[must_use]
    pub fn then_at(mut self, at: Duration, content: impl Into<String>) -> Self {
        self.timeline.push((at, content.into()));
        self.timeline.sort_by_key(|(t, _)| *t);
        self
    }

    /// Number of reads served so far, across all clones
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn content_at(&self, now: Duration) -> &str {
        self.timeline
            .iter()
            .rev()
            .find(|(t, _)| *t <= now)
            .map_or("", |(_, c)| c.as_str())
    }
}

impl StatusSource for ScriptedStatus {
    fn read_status(&mut self) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.content_at(self.clock.now()).to_string())
    }
}

/// Residency counters scripted over simulated time
///
/// Each counter starts at a distinct non-zero value and is incremented by one
/// for every scheduled bump whose time has passed.
#[derive(Debug, Clone)]
pub struct ScriptedResidency {
    clock: SimClock,
    bumps: Vec<(Duration, ResidencyClass)>,
    readable: bool,
    reads: Arc<AtomicUsize>,
}

impl ScriptedResidency {
    /// Counters that never move
    pub fn frozen(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
            bumps: Vec::new(),
            readable: true,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counters that fail every read, like a part without PC8+
    pub fn unreadable(clock: &SimClock) -> Self {
        Self {
            readable: false,
            ..Self::frozen(clock)
        }
    }

    /// Advance `class` once the clock reaches `at`
    #[must_use]
    pub fn bump_at(mut self, at: Duration, class: ResidencyClass) -> Self {
        self.bumps.push((at, class));
        self
    }

    /// Number of counter reads served so far, across all clones
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ResidencySource for ScriptedResidency {
    fn read_counter(&mut self, class: ResidencyClass) -> Result<u64> {
        if !self.readable {
            return Err(PmError::unsupported(format!("{class} residency not implemented")));
        }
        self.reads.fetch_add(1, Ordering::SeqCst);

        let now = self.clock.now();
        let bumps = self
            .bumps
            .iter()
            .filter(|(t, c)| *c == class && *t <= now)
            .count() as u64;

        Ok(class.msr() * 1000 + bumps)
    }
}
