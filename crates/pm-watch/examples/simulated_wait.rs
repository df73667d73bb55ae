//! Watch a simulated device go to sleep
//!
//! Runs both strategies against scripted sources, so no GPU is needed.
//! `RUST_LOG` is ignored; per-sample logging is always on.

use pm_watch::sim::{ScriptedResidency, ScriptedStatus, SimClock};
use pm_watch::{PowerState, PowerStateWatcher, ResidencyClass, Result, Strategy};
use std::time::Duration;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("pm_watch=debug")
        .init();

    println!("runtime_status poll");
    let clock = SimClock::new();
    let status = ScriptedStatus::constant(&clock, "active\n")
        .then_at(Duration::from_millis(300), "suspending\n")
        .then_at(Duration::from_millis(700), "suspended\n");
    let mut watcher =
        PowerStateWatcher::with_sleeper(Strategy::StatusPoll(Box::new(status.clone())), clock.clone());

    let outcome = watcher.wait_for_state(PowerState::Suspended, 2)?;
    println!("  {outcome:?} after {:?}, {} reads", clock.now(), status.reads());

    println!("PC8+ residency poll");
    let clock = SimClock::new();
    let residency = ScriptedResidency::frozen(&clock).bump_at(Duration::from_millis(500), ResidencyClass::Pc10);
    let mut watcher =
        PowerStateWatcher::with_sleeper(Strategy::ResidencyPoll(Box::new(residency)), clock.clone());

    println!("  deep residency reached: {}", watcher.deep_residency_reached()?);
    println!("  current state: {}", watcher.current_state()?);

    Ok(())
}
