//! Power states and wait outcomes

use crate::error::{PmError, Result};
use pm_regs::sysfs::status;

/// Runtime power state of the device
///
/// A query result; nothing in this crate stores one between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    /// Device is powered and usable
    Active,
    /// Device is runtime suspended
    Suspended,
    /// Device is transitioning to suspended
    Suspending,
    /// State cannot be observed directly (residency counters only)
    Unknown,
}

impl PowerState {
    /// Parse the content of a `runtime_status` read
    ///
    /// Only the three newline-terminated literals the kernel emits are
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns `PmError::ContractViolation` for anything else, including an
    /// empty read or a literal missing its newline.
    pub fn from_status(content: &str) -> Result<Self> {
        match content {
            status::ACTIVE => Ok(Self::Active),
            status::SUSPENDED => Ok(Self::Suspended),
            status::SUSPENDING => Ok(Self::Suspending),
            other => Err(PmError::contract_violation(other)),
        }
    }

    /// States a caller may wait for
    pub const fn is_wait_target(self) -> bool {
        matches!(self, Self::Active | Self::Suspended)
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Suspended => write!(f, "suspended"),
            Self::Suspending => write!(f, "suspending"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for PowerState {
    type Err = PmError;

    /// Parse a user-facing name (no trailing newline required)
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "suspending" => Ok(Self::Suspending),
            "unknown" => Ok(Self::Unknown),
            other => Err(PmError::invalid_argument(format!("unknown power state '{other}'"))),
        }
    }
}

/// Result of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Target observed before the deadline
    Reached,
    /// Deadline elapsed without observing the target
    TimedOut,
}

impl WaitOutcome {
    /// `true` for [`WaitOutcome::Reached`]
    pub const fn is_reached(self) -> bool {
        matches!(self, Self::Reached)
    }

    /// Swap the meaning of the outcome
    ///
    /// Residency polling answers "did the counters move"; waiting for the
    /// device to stay awake is the negation of that answer.
    pub(crate) const fn inverted(self) -> Self {
        match self {
            Self::Reached => Self::TimedOut,
            Self::TimedOut => Self::Reached,
        }
    }
}

impl From<WaitOutcome> for bool {
    fn from(outcome: WaitOutcome) -> Self {
        outcome.is_reached()
    }
}
