//! Runtime-PM and residency setup
//!
//! Prepares the device so it suspends as soon as it goes idle, probes the
//! residency counters, and picks the watcher strategy:
//!
//! ```text
//! runtime PM   PC8+     strategy
//! yes          any      StatusPoll
//! no           yes      ResidencyPoll
//! no           no       UnsupportedPlatform
//! ```
//!
//! Attribute writes are single `write(2)` calls so a rejected write shows up
//! as a short count or an errno, exactly what the kernel reports.

use crate::clock::{Sleeper, ThreadSleeper};
use crate::config::WatchConfig;
use crate::error::{PmError, Result};
use crate::residency::MsrDevice;
use crate::state::{PowerState, WaitOutcome};
use crate::status::SysfsStatus;
use crate::subtests::{self, Subtest, SubtestOutcome};
use crate::watcher::{PowerStateWatcher, Strategy, StrategyKind};
use pm_regs::sysfs::{
    AUTOSUSPEND_DELAY_MS, AUTOSUSPEND_IMMEDIATE, CONTROL, CONTROL_AUTO, RUNTIME_STATUS,
};
use rustix::fs::{seek, SeekFrom};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Largest attribute value saved for restore
const SAVED_ATTR_MAX: usize = 32;

/// Runtime PM enabled on one device
///
/// Remembers the attribute values it overwrote and writes them back on
/// [`RuntimePm::restore`] or drop.
#[derive(Debug)]
pub struct RuntimePm {
    power_dir: PathBuf,
    saved_delay: Option<String>,
    saved_control: Option<String>,
}

impl RuntimePm {
    /// Enable immediate autosuspend on the device behind `power_dir`
    ///
    /// Returns `Ok(None)` when the kernel rejects the autosuspend delay,
    /// which means the driver has no runtime-PM support for this device.
    ///
    /// # Errors
    ///
    /// Returns `PmError::Setup` if the attributes cannot be opened or
    /// `control` does not read back as `auto`.
    pub fn setup(power_dir: impl AsRef<Path>) -> Result<Option<Self>> {
        let power_dir = power_dir.as_ref();
        let delay_path = power_dir.join(AUTOSUSPEND_DELAY_MS);
        let control_path = power_dir.join(CONTROL);

        let saved_delay = read_attr(&delay_path);

        let delay = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&delay_path)
            .map_err(|e| PmError::setup(format!("Can't open {}: {e}", delay_path.display())))?;

        match rustix::io::write(&delay, AUTOSUSPEND_IMMEDIATE.as_bytes()) {
            Ok(n) if n == AUTOSUSPEND_IMMEDIATE.len() => {}
            Ok(n) => {
                info!("Runtime PM unsupported: short write ({n} bytes) to {}", delay_path.display());
                return Ok(None);
            }
            Err(e) => {
                info!("Runtime PM unsupported: {} rejected write: {e}", delay_path.display());
                return Ok(None);
            }
        }
        drop(delay);

        // From here on an early return drops the guard, which puts the old
        // delay back.
        let pm = Self {
            power_dir: power_dir.to_path_buf(),
            saved_delay,
            saved_control: read_attr(&control_path),
        };

        let control = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(true)
            .open(&control_path)
            .map_err(|e| PmError::setup(format!("Can't open {}: {e}", control_path.display())))?;

        let n = rustix::io::write(&control, CONTROL_AUTO.as_bytes())?;
        if n != CONTROL_AUTO.len() {
            return Err(PmError::setup(format!(
                "short write ({n} bytes) to {}",
                control_path.display()
            )));
        }

        seek(&control, SeekFrom::Start(0))?;
        let mut buf = [0u8; 6];
        let n = rustix::io::read(&control, &mut buf)?;
        if &buf[..n] != CONTROL_AUTO.as_bytes() {
            return Err(PmError::setup(format!(
                "{} reads back {:?}, expected {CONTROL_AUTO:?}",
                control_path.display(),
                String::from_utf8_lossy(&buf[..n])
            )));
        }

        info!("Runtime PM enabled on {}", power_dir.display());
        Ok(Some(pm))
    }

    /// Device `power/` directory
    #[must_use]
    pub fn power_dir(&self) -> &Path {
        &self.power_dir
    }

    /// Open the device's `runtime_status` attribute
    ///
    /// # Errors
    ///
    /// Returns error if the attribute is missing or unreadable.
    pub fn open_status(&self) -> Result<SysfsStatus> {
        SysfsStatus::open(self.power_dir.join(RUNTIME_STATUS))
    }

    /// Write back the attribute values found at setup
    ///
    /// A value is forgotten only once it has been written back, so a failed
    /// call can be retried. Later calls after a success are no-ops.
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    pub fn restore(&mut self) -> Result<()> {
        if let Some(control) = &self.saved_control {
            std::fs::write(self.power_dir.join(CONTROL), control)?;
            debug!("Restored control = {:?}", control.trim_end());
            self.saved_control = None;
        }
        if let Some(delay) = &self.saved_delay {
            std::fs::write(self.power_dir.join(AUTOSUSPEND_DELAY_MS), delay)?;
            debug!("Restored autosuspend_delay_ms = {:?}", delay.trim_end());
            self.saved_delay = None;
        }
        Ok(())
    }
}

impl Drop for RuntimePm {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("Failed to restore runtime PM settings in {}: {e}", self.power_dir.display());
        }
    }
}

/// Probe the package residency counters
///
/// Returns `Ok(None)` if the MSR device does not exist or the counters cannot
/// be read (part without PC8+).
///
/// # Errors
///
/// Returns `PmError::Setup` if the device exists but cannot be opened.
pub fn probe_deep_residency(msr_path: impl AsRef<Path>) -> Result<Option<MsrDevice>> {
    let msr_path = msr_path.as_ref();

    let mut dev = match MsrDevice::open(msr_path) {
        Ok(dev) => dev,
        Err(PmError::NotFound { path }) => {
            info!("No MSR device at {} (msr module not loaded?)", path.display());
            return Ok(None);
        }
        Err(e) => {
            return Err(PmError::setup(format!("Can't open {}: {e}", msr_path.display())));
        }
    };

    if dev.supports_deep_residency() {
        Ok(Some(dev))
    } else {
        info!("PC8+ residency counters not readable; platform does not reach PC8+");
        Ok(None)
    }
}

/// Prepared test environment: runtime PM configured, strategy selected
#[derive(Debug)]
pub struct Environment<S: Sleeper = ThreadSleeper> {
    config: WatchConfig,
    runtime_pm: Option<RuntimePm>,
    deep_residency: bool,
    watcher: PowerStateWatcher<S>,
}

impl Environment<ThreadSleeper> {
    /// Set up runtime PM, probe residency and build the watcher
    ///
    /// # Errors
    ///
    /// - `Setup` if an attribute cannot be opened or configured.
    /// - `UnsupportedPlatform` if neither runtime PM nor PC8+ residency is
    ///   available.
    pub fn setup(config: WatchConfig) -> Result<Self> {
        Self::setup_with_sleeper(config, ThreadSleeper)
    }
}

impl<S: Sleeper> Environment<S> {
    /// [`Environment::setup`] with a custom sleeper
    ///
    /// # Errors
    ///
    /// See [`Environment::setup`].
    pub fn setup_with_sleeper(config: WatchConfig, sleeper: S) -> Result<Self> {
        let runtime_pm = RuntimePm::setup(&config.power_dir)?;
        let msr = probe_deep_residency(&config.msr_path)?;
        let deep_residency = msr.is_some();

        info!("Runtime PM support: {}", runtime_pm.is_some());
        info!("PC8+ residency support: {deep_residency}");

        let strategy = match (&runtime_pm, msr) {
            (Some(pm), _) => Strategy::StatusPoll(Box::new(pm.open_status()?)),
            (None, Some(msr)) => Strategy::ResidencyPoll(Box::new(msr)),
            (None, None) => {
                return Err(PmError::unsupported(
                    "neither runtime PM nor PC8+ residency is available",
                ));
            }
        };

        let watcher = PowerStateWatcher::with_sleeper(strategy, sleeper).with_timeouts(config.timeouts);

        Ok(Self {
            config,
            runtime_pm,
            deep_residency,
            watcher,
        })
    }

    /// Configuration the environment was built from
    pub const fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Whether runtime PM was enabled
    pub const fn has_runtime_pm(&self) -> bool {
        self.runtime_pm.is_some()
    }

    /// Whether the residency counters are readable
    pub const fn has_deep_residency(&self) -> bool {
        self.deep_residency
    }

    /// Strategy the watcher uses
    pub const fn strategy_kind(&self) -> StrategyKind {
        self.watcher.strategy_kind()
    }

    /// The watcher
    pub fn watcher_mut(&mut self) -> &mut PowerStateWatcher<S> {
        &mut self.watcher
    }

    /// Current state through the selected strategy
    ///
    /// # Errors
    ///
    /// See [`PowerStateWatcher::current_state`].
    pub fn current_state(&mut self) -> Result<PowerState> {
        self.watcher.current_state()
    }

    /// Wait for the device to suspend, using the configured deadline
    ///
    /// # Errors
    ///
    /// See [`PowerStateWatcher::wait_for_state`].
    pub fn wait_for_suspended(&mut self) -> Result<WaitOutcome> {
        self.watcher.wait_for_suspended()
    }

    /// Wait for the device to be active, using the configured deadline
    ///
    /// # Errors
    ///
    /// See [`PowerStateWatcher::wait_for_state`].
    pub fn wait_for_active(&mut self) -> Result<WaitOutcome> {
        self.watcher.wait_for_active()
    }

    /// Run one validation subtest against this environment
    ///
    /// # Errors
    ///
    /// See [`subtests::run`].
    pub fn run_subtest(&mut self, subtest: Subtest) -> Result<SubtestOutcome> {
        subtests::run(subtest, &mut self.watcher, &self.config)
    }

    /// Restore runtime-PM settings and release the sources
    ///
    /// # Errors
    ///
    /// Returns the restore error, if any.
    pub fn teardown(mut self) -> Result<()> {
        if let Some(pm) = self.runtime_pm.as_mut() {
            pm.restore()?;
        }
        info!("Environment torn down");
        Ok(())
    }
}

/// Read a small attribute in a single `read(2)`
fn read_attr(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut buf = [0u8; SAVED_ATTR_MAX];
    let n = rustix::io::read(&file, &mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf[..n]).into_owned())
}
