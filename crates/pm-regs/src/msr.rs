//! Package C-state residency MSRs.
//!
//! Each register is a free-running 64-bit counter that advances while the
//! package sits in the corresponding deep C-state. They are read through the
//! `msr` character device with `pread(fd, buf, 8, offset)` where `offset` is
//! the MSR address.
//!
//! ```text
//! 0x630  MSR_PKG_C8_RESIDENCY
//! 0x631  MSR_PKG_C9_RESIDENCY
//! 0x632  MSR_PKG_C10_RESIDENCY
//! ```
//!
//! Parts that never enter PC8+ fail the read instead of returning zero.

/// PC8 residency counter.
pub const PC8_RESIDENCY: u64 = 0x630;

/// PC9 residency counter.
pub const PC9_RESIDENCY: u64 = 0x631;

/// PC10 residency counter.
pub const PC10_RESIDENCY: u64 = 0x632;

/// All residency counters sampled together, in sampling order.
pub const ALL_RESIDENCY: [u64; 3] = [PC8_RESIDENCY, PC9_RESIDENCY, PC10_RESIDENCY];

/// Width of one MSR read in bytes.
pub const COUNTER_BYTES: usize = 8;

/// Default MSR device for CPU 0.
pub const DEFAULT_MSR_DEVICE: &str = "/dev/cpu/0/msr";
