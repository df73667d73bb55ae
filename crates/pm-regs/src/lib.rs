//! Platform model for GPU runtime power management.
//!
//! This crate has **no dependencies** and **no hardware access** — it is a
//! pure description of the ABI the watcher talks to: MSR offsets for the
//! package C-state residency counters, sysfs attribute names and the literal
//! strings they carry, PCI identifiers, and the polling cadence.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`msr`] | Residency MSR offsets (PC8 / PC9 / PC10), counter width |
//! | [`sysfs`] | `power/` attribute names, `runtime_status` literals, default paths |
//! | [`pci`] | Vendor and class codes used to find the GPU |
//! | [`poll`] | Poll interval and default deadlines |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod msr;
pub mod pci;
pub mod poll;
pub mod sysfs;
