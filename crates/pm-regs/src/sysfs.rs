//! Runtime-PM sysfs attributes.
//!
//! Every PCI device exposes a `power/` directory:
//!
//! ```text
//! power/autosuspend_delay_ms   rw  "0\n" = suspend as soon as idle
//! power/control                rw  "auto\n" | "on\n"
//! power/runtime_status         ro  "active\n" | "suspended\n" | "suspending\n" | ...
//! ```
//!
//! A write to `autosuspend_delay_ms` that the kernel rejects means the driver
//! does not implement runtime PM for that device.

/// Integrated GPU power directory on the platforms this suite targets.
pub const DEFAULT_POWER_DIR: &str = "/sys/devices/pci0000:00/0000:00:02.0/power";

/// Integrated GPU sysfs device directory.
pub const DEFAULT_DEVICE_DIR: &str = "/sys/devices/pci0000:00/0000:00:02.0";

/// DRM debugfs directory for the first card.
pub const DEFAULT_DEBUGFS_DIR: &str = "/sys/kernel/debug/dri/0";

/// Root of sysfs.
pub const SYSFS_ROOT: &str = "/sys";

/// Autosuspend delay attribute.
pub const AUTOSUSPEND_DELAY_MS: &str = "autosuspend_delay_ms";

/// Runtime-PM control attribute.
pub const CONTROL: &str = "control";

/// Runtime-PM status attribute.
pub const RUNTIME_STATUS: &str = "runtime_status";

/// Debugfs file that holds a user forcewake reference while open.
pub const FORCEWAKE_USER: &str = "i915_forcewake_user";

/// Value written to `autosuspend_delay_ms`.
pub const AUTOSUSPEND_IMMEDIATE: &str = "0\n";

/// Value written to `control` to let the kernel suspend the device.
pub const CONTROL_AUTO: &str = "auto\n";

/// `runtime_status` literals.
pub mod status {
    /// Device is powered.
    pub const ACTIVE: &str = "active\n";
    /// Device is runtime suspended.
    pub const SUSPENDED: &str = "suspended\n";
    /// Device is on its way down.
    pub const SUSPENDING: &str = "suspending\n";
}

/// Upper bound on a `runtime_status` read.
pub const STATUS_READ_MAX: usize = 32;
