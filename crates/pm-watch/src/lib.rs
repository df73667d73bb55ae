//! Observe and wait on GPU runtime power-management state.
//!
//! Validation code that needs "is the GPU suspended yet?" calls into this
//! crate instead of sleeping and hoping. The device is watched one of two
//! ways, picked once at setup:
//!
//! ```text
//! Preferred (driver supports runtime PM):
//!   StatusPoll     — power/runtime_status, "active" | "suspended" | "suspending"
//!
//! Fallback (no runtime PM, package reaches PC8+):
//!   ResidencyPoll  — MSR 0x630..=0x632 residency counters moving
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use pm_watch::{Environment, PowerState, WatchConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut env = Environment::setup(WatchConfig::from_env())?;
//! println!("Watching via {}", env.strategy_kind());
//!
//! let outcome = env.watcher_mut().wait_for_state(PowerState::Suspended, 10)?;
//! println!("suspended: {}", outcome.is_reached());
//!
//! env.teardown()?;
//! # Ok(())
//! # }
//! ```
//!
//! A wait that runs out of time is a [`WaitOutcome::TimedOut`], not an error.
//! Errors are reserved for broken contracts (an unknown status string),
//! missing platform support and bad arguments.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod clock;
pub mod config;
mod discovery;
mod error;
mod residency;
pub mod setup;
pub mod sim;
mod state;
mod status;
pub mod subtests;
pub mod tree;
mod watcher;

pub use clock::{Sleeper, ThreadSleeper};
pub use config::{Timeouts, WatchConfig};
pub use discovery::{discover_gpus, first_gpu, GpuInfo};
pub use error::{PmError, Result};
pub use residency::{MsrDevice, ResidencyClass, ResidencySample, ResidencySource};
pub use setup::{probe_deep_residency, Environment, RuntimePm};
pub use state::{PowerState, WaitOutcome};
pub use status::{StatusSource, SysfsStatus};
pub use subtests::{Subtest, SubtestOutcome};
pub use watcher::{PowerStateWatcher, Strategy, StrategyKind};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        Environment, PmError, PowerState, PowerStateWatcher, Result, Strategy, StrategyKind,
        Subtest, SubtestOutcome, WaitOutcome, WatchConfig,
    };
}
