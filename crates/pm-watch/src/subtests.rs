// SPDX-License-Identifier: AGPL-3.0-only

//! Runtime-PM validation subtests
//!
//! | Subtest | Checks |
//! |---------|--------|
//! | `rte` | idle device suspends |
//! | `debugfs-read` | reading every debugfs file leaves the device suspended |
//! | `sysfs-read` | reading every sysfs attribute leaves the device suspended |
//! | `forcewake-user` | an open forcewake handle keeps the device awake until closed |
//!
//! Each subtest assumes the display is already off and the device idle.

use crate::clock::Sleeper;
use crate::config::WatchConfig;
use crate::error::Result;
use crate::tree::{drain_file, walk_files};
use crate::watcher::{PowerStateWatcher, StrategyKind};
use pm_regs::sysfs::FORCEWAKE_USER;
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// Result of one subtest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtestOutcome {
    /// All checks held
    Pass,
    /// Precondition missing on this machine
    Skip(String),
    /// A check failed
    Fail(String),
}

impl SubtestOutcome {
    /// Whether the subtest failed
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Fail(_))
    }
}

/// Available subtests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtest {
    /// Runtime PM idle suspend
    Rte,
    /// Recursive debugfs read
    DebugfsRead,
    /// Recursive sysfs read
    SysfsRead,
    /// Forcewake reference from userspace
    ForcewakeUser,
}

impl Subtest {
    /// Every subtest, in run order
    pub const ALL: [Self; 4] = [
        Self::Rte,
        Self::DebugfsRead,
        Self::SysfsRead,
        Self::ForcewakeUser,
    ];

    /// Command-line name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rte => "rte",
            Self::DebugfsRead => "debugfs-read",
            Self::SysfsRead => "sysfs-read",
            Self::ForcewakeUser => "forcewake-user",
        }
    }

    /// Look up a subtest by command-line name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl fmt::Display for Subtest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run one subtest
///
/// # Errors
///
/// Returns watcher errors (contract violations, unsupported platform) and
/// directory listing errors. Failed checks are reported as
/// [`SubtestOutcome::Fail`], not as errors.
pub fn run<S: Sleeper>(
    subtest: Subtest,
    watcher: &mut PowerStateWatcher<S>,
    config: &WatchConfig,
) -> Result<SubtestOutcome> {
    info!("Running subtest {subtest}");
    let outcome = match subtest {
        Subtest::Rte => rte(watcher)?,
        Subtest::DebugfsRead => {
            if !config.debugfs_dir.is_dir() {
                return Ok(SubtestOutcome::Skip(format!(
                    "{} not available",
                    config.debugfs_dir.display()
                )));
            }
            read_tree(watcher, &config.debugfs_dir)?
        }
        Subtest::SysfsRead => {
            if !config.device_dir.is_dir() {
                return Ok(SubtestOutcome::Skip(format!(
                    "{} not available",
                    config.device_dir.display()
                )));
            }
            read_tree(watcher, &config.device_dir)?
        }
        Subtest::ForcewakeUser => forcewake_user(watcher, config)?,
    };

    if let SubtestOutcome::Fail(reason) = &outcome {
        warn!("Subtest {subtest} failed: {reason}");
    }
    Ok(outcome)
}

/// Under the residency strategy the suspended wait already is the PC8+ check.
fn rte<S: Sleeper>(watcher: &mut PowerStateWatcher<S>) -> Result<SubtestOutcome> {
    if watcher.wait_for_suspended()?.is_reached() {
        return Ok(SubtestOutcome::Pass);
    }

    let reason = match watcher.strategy_kind() {
        StrategyKind::StatusPoll => "device did not suspend while idle",
        StrategyKind::ResidencyPoll => "package did not enter PC8+ while idle",
    };
    Ok(SubtestOutcome::Fail(reason.into()))
}

fn read_tree<S: Sleeper>(watcher: &mut PowerStateWatcher<S>, root: &Path) -> Result<SubtestOutcome> {
    if !watcher.wait_for_suspended()?.is_reached() {
        return Ok(SubtestOutcome::Fail("device not suspended before reading".into()));
    }

    let mut failure: Option<String> = None;
    let files = walk_files(root, &mut |path| {
        if failure.is_some() {
            return Ok(());
        }
        if !watcher.wait_for_suspended()?.is_reached() {
            failure = Some(format!("device awake before reading {}", path.display()));
            return Ok(());
        }
        drain_file(path)?;
        if !watcher.wait_for_suspended()?.is_reached() {
            failure = Some(format!("reading {} left the device awake", path.display()));
        }
        Ok(())
    })?;

    info!("Read {files} file(s) under {}", root.display());
    Ok(failure.map_or(SubtestOutcome::Pass, SubtestOutcome::Fail))
}

fn forcewake_user<S: Sleeper>(
    watcher: &mut PowerStateWatcher<S>,
    config: &WatchConfig,
) -> Result<SubtestOutcome> {
    if !watcher.wait_for_suspended()?.is_reached() {
        return Ok(SubtestOutcome::Fail("device not suspended before forcewake".into()));
    }

    let path = config.debugfs_dir.join(FORCEWAKE_USER);
    let handle = match File::open(&path) {
        Ok(f) => f,
        Err(e) => {
            return Ok(SubtestOutcome::Skip(format!("{}: {e}", path.display())));
        }
    };

    if !watcher.wait_for_active()?.is_reached() {
        return Ok(SubtestOutcome::Fail("forcewake did not wake the device".into()));
    }

    watcher.hold(config.forcewake_hold);

    if !watcher.wait_for_active()?.is_reached() {
        return Ok(SubtestOutcome::Fail("device suspended while forcewake was held".into()));
    }

    drop(handle);

    if !watcher.wait_for_suspended()?.is_reached() {
        return Ok(SubtestOutcome::Fail("device stayed awake after forcewake release".into()));
    }

    Ok(SubtestOutcome::Pass)
}
