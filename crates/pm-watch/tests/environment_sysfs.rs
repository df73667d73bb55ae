//! Environment setup against a fake sysfs tree

use pm_watch::sim::SimClock;
use pm_watch::{
    Environment, PmError, PowerState, StrategyKind, Subtest, SubtestOutcome, WatchConfig,
};
use std::path::Path;
use std::time::Duration;

fn fake_power_dir(root: &Path, status: &str) -> std::path::PathBuf {
    let power = root.join("device/power");
    std::fs::create_dir_all(&power).unwrap();
    std::fs::write(power.join("autosuspend_delay_ms"), "10000\n").unwrap();
    std::fs::write(power.join("control"), "on\n").unwrap();
    std::fs::write(power.join("runtime_status"), status).unwrap();
    power
}

fn fake_msr(path: &Path) {
    let mut bytes = vec![0u8; 0x640];
    bytes[0x630..0x638].copy_from_slice(&1234u64.to_le_bytes());
    std::fs::write(path, bytes).unwrap();
}

fn config(root: &Path) -> WatchConfig {
    WatchConfig {
        power_dir: root.join("device/power"),
        device_dir: root.join("device"),
        msr_path: root.join("msr"),
        debugfs_dir: root.join("debugfs"),
        ..WatchConfig::default()
    }
}

#[test]
fn runtime_pm_selects_status_poll_and_restores() {
    let root = tempfile::tempdir().unwrap();
    let power = fake_power_dir(root.path(), "suspended\n");
    fake_msr(&root.path().join("msr"));

    let clock = SimClock::new();
    let mut env = Environment::setup_with_sleeper(config(root.path()), clock.clone()).unwrap();
    assert!(env.has_runtime_pm());
    assert!(env.has_deep_residency());
    assert_eq!(env.strategy_kind(), StrategyKind::StatusPoll);

    assert_eq!(env.current_state().unwrap(), PowerState::Suspended);
    assert!(env.wait_for_suspended().unwrap().is_reached());
    assert_eq!(clock.now(), Duration::ZERO);

    env.teardown().unwrap();
    assert_eq!(std::fs::read_to_string(power.join("control")).unwrap(), "on\n");
    assert_eq!(std::fs::read_to_string(power.join("autosuspend_delay_ms")).unwrap(), "10000\n");
}

#[test]
fn missing_runtime_pm_falls_back_to_residency() {
    if !Path::new("/dev/full").exists() {
        println!("ℹ️  Skipping test (no /dev/full)");
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let power = root.path().join("device/power");
    std::fs::create_dir_all(&power).unwrap();
    std::os::unix::fs::symlink("/dev/full", power.join("autosuspend_delay_ms")).unwrap();
    fake_msr(&root.path().join("msr"));

    let clock = SimClock::new();
    let mut env = Environment::setup_with_sleeper(config(root.path()), clock.clone()).unwrap();
    assert!(!env.has_runtime_pm());
    assert_eq!(env.strategy_kind(), StrategyKind::ResidencyPoll);
    assert_eq!(env.current_state().unwrap(), PowerState::Unknown);

    // Counters in a regular file never move: PC8+ blocked for the full window
    assert!(env.wait_for_active().unwrap().is_reached());
    assert_eq!(clock.now(), Duration::from_secs(5));
}

#[test]
fn nothing_available_is_unsupported() {
    if !Path::new("/dev/full").exists() {
        println!("ℹ️  Skipping test (no /dev/full)");
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let power = root.path().join("device/power");
    std::fs::create_dir_all(&power).unwrap();
    std::os::unix::fs::symlink("/dev/full", power.join("autosuspend_delay_ms")).unwrap();

    let err = Environment::setup_with_sleeper(config(root.path()), SimClock::new()).unwrap_err();
    assert!(matches!(err, PmError::UnsupportedPlatform { .. }));
}

#[test]
fn sysfs_read_over_fake_device() {
    let root = tempfile::tempdir().unwrap();
    fake_power_dir(root.path(), "suspended\n");
    std::fs::write(root.path().join("device/vendor"), "0x8086\n").unwrap();

    let mut env = Environment::setup_with_sleeper(config(root.path()), SimClock::new()).unwrap();
    assert_eq!(env.run_subtest(Subtest::SysfsRead).unwrap(), SubtestOutcome::Pass);
    assert!(matches!(env.run_subtest(Subtest::DebugfsRead).unwrap(), SubtestOutcome::Skip(_)));
    env.teardown().unwrap();
}
