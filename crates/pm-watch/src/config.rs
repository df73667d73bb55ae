//! Watcher configuration
//!
//! Defaults describe the integrated GPU at `0000:00:02.0`. Every path can be
//! overridden from the environment so the same binaries run against other
//! devices or against a fake sysfs tree.

use crate::discovery::GpuInfo;
use pm_regs::{msr, poll, sysfs};
use std::path::PathBuf;
use std::time::Duration;

/// Overrides `WatchConfig::power_dir`
pub const ENV_POWER_DIR: &str = "PMWATCH_POWER_DIR";
/// Overrides `WatchConfig::device_dir`
pub const ENV_DEVICE_DIR: &str = "PMWATCH_DEVICE_DIR";
/// Overrides `WatchConfig::msr_path`
pub const ENV_MSR_PATH: &str = "PMWATCH_MSR_PATH";
/// Overrides `WatchConfig::debugfs_dir`
pub const ENV_DEBUGFS_DIR: &str = "PMWATCH_DEBUGFS_DIR";
/// Overrides `Timeouts::status_s`
pub const ENV_STATUS_TIMEOUT: &str = "PMWATCH_STATUS_TIMEOUT";

/// Deadlines used by the named waits, in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Waiting for a `runtime_status` value
    pub status_s: u32,
    /// Waiting for residency counters to move
    pub residency_reached_s: u32,
    /// Window during which residency counters must stay frozen
    pub residency_blocked_s: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            status_s: poll::STATUS_TIMEOUT_S,
            residency_reached_s: poll::RESIDENCY_REACHED_TIMEOUT_S,
            residency_blocked_s: poll::RESIDENCY_BLOCKED_TIMEOUT_S,
        }
    }
}

/// Paths and deadlines for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Device `power/` directory
    pub power_dir: PathBuf,

    /// Device sysfs directory (walked by `sysfs-read`)
    pub device_dir: PathBuf,

    /// MSR character device
    pub msr_path: PathBuf,

    /// DRM debugfs directory
    pub debugfs_dir: PathBuf,

    /// Wait deadlines
    pub timeouts: Timeouts,

    /// How long `forcewake-user` holds the reference before re-checking
    pub forcewake_hold: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            power_dir: PathBuf::from(sysfs::DEFAULT_POWER_DIR),
            device_dir: PathBuf::from(sysfs::DEFAULT_DEVICE_DIR),
            msr_path: PathBuf::from(msr::DEFAULT_MSR_DEVICE),
            debugfs_dir: PathBuf::from(sysfs::DEFAULT_DEBUGFS_DIR),
            timeouts: Timeouts::default(),
            forcewake_hold: Duration::from_secs(10),
        }
    }
}

impl WatchConfig {
    /// Defaults with `PMWATCH_*` environment overrides applied
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_POWER_DIR) {
            self.power_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_DEVICE_DIR) {
            self.device_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup(ENV_MSR_PATH) {
            self.msr_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(ENV_DEBUGFS_DIR) {
            self.debugfs_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_STATUS_TIMEOUT) {
            match raw.trim().parse::<u32>() {
                Ok(s) if s > 0 => self.timeouts.status_s = s,
                _ => tracing::warn!("Ignoring {ENV_STATUS_TIMEOUT}={raw:?}: expected seconds > 0"),
            }
        }
        self
    }

    /// Point the config at a discovered GPU
    #[must_use]
    pub fn for_gpu(mut self, gpu: &GpuInfo) -> Self {
        self.device_dir = gpu.device_dir().to_path_buf();
        self.power_dir = gpu.power_dir();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_target_integrated_gpu() {
        let c = WatchConfig::default();
        assert!(c.power_dir.ends_with("0000:00:02.0/power"));
        assert_eq!(c.timeouts.status_s, 10);
        assert_eq!(c.timeouts.residency_reached_s, 30);
        assert_eq!(c.timeouts.residency_blocked_s, 5);
    }

    #[test]
    fn overrides_replace_paths() {
        let env: HashMap<&str, &str> = [
            (ENV_POWER_DIR, "/tmp/power"),
            (ENV_MSR_PATH, "/tmp/msr"),
            (ENV_STATUS_TIMEOUT, "3"),
        ]
        .into_iter()
        .collect();

        let c = WatchConfig::default().with_overrides(|k| env.get(k).map(ToString::to_string));
        assert_eq!(c.power_dir, PathBuf::from("/tmp/power"));
        assert_eq!(c.msr_path, PathBuf::from("/tmp/msr"));
        assert_eq!(c.timeouts.status_s, 3);
        assert_eq!(c.debugfs_dir, PathBuf::from(sysfs::DEFAULT_DEBUGFS_DIR));
    }

    #[test]
    fn bad_timeout_keeps_default() {
        for raw in ["0", "soon", "-1"] {
            let c = WatchConfig::default()
                .with_overrides(|k| (k == ENV_STATUS_TIMEOUT).then(|| raw.to_string()));
            assert_eq!(c.timeouts.status_s, poll::STATUS_TIMEOUT_S);
        }
    }
}
