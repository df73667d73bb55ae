//! Runtime GPU discovery
//!
//! Scans `<sysfs>/bus/pci/devices/*` for display-class functions so the
//! watcher can be pointed at whatever GPU the machine has instead of the
//! hard-wired `0000:00:02.0`.

use crate::error::{PmError, Result};
use pm_regs::pci::{is_display_class, INTEL_VENDOR_ID};
use std::path::{Path, PathBuf};

/// A display-class PCI function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuInfo {
    /// PCIe address (0000:00:02.0, etc.)
    pub address: String,

    /// PCI vendor ID
    pub vendor: u16,

    /// 24-bit PCI class code
    pub class: u32,

    /// sysfs device directory
    pub device_dir: PathBuf,
}

impl GpuInfo {
    /// PCIe address
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// sysfs device directory
    #[must_use]
    pub fn device_dir(&self) -> &Path {
        &self.device_dir
    }

    /// Runtime-PM attribute directory
    #[must_use]
    pub fn power_dir(&self) -> PathBuf {
        self.device_dir.join("power")
    }

    /// Whether this is an Intel GPU
    #[must_use]
    pub const fn is_intel(&self) -> bool {
        self.vendor == INTEL_VENDOR_ID
    }
}

/// Find every display-class PCI function under `sysfs_root`
///
/// Results are sorted by PCIe address so indices are stable across runs.
///
/// # Errors
///
/// Returns error if the PCI device directory cannot be read.
pub fn discover_gpus(sysfs_root: impl AsRef<Path>) -> Result<Vec<GpuInfo>> {
    let pci_devices = sysfs_root.as_ref().join("bus/pci/devices");
    tracing::info!("Scanning {} for GPUs...", pci_devices.display());

    let entries = std::fs::read_dir(&pci_devices).map_err(|e| {
        PmError::setup(format!("Cannot read {}: {e}", pci_devices.display()))
    })?;

    let mut gpus = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();

        let Ok(class) = read_hex_sysfs(&path.join("class")) else {
            continue;
        };
        if !is_display_class(class) {
            continue;
        }

        let vendor = match read_hex_sysfs(&path.join("vendor")).map(u16::try_from) {
            Ok(Ok(v)) => v,
            _ => {
                tracing::warn!("Skipping {}: unreadable vendor", path.display());
                continue;
            }
        };

        let address = entry.file_name().to_string_lossy().to_string();
        tracing::debug!("GPU {address}: vendor {vendor:#06x} class {class:#08x}");

        gpus.push(GpuInfo {
            address,
            vendor,
            class,
            device_dir: path,
        });
    }

    gpus.sort_by(|a, b| a.address.cmp(&b.address));
    tracing::info!("Discovered {} GPU(s)", gpus.len());

    Ok(gpus)
}

/// First GPU by PCIe address, preferring Intel parts
///
/// # Errors
///
/// Returns `PmError::NotFound` if no display-class device exists.
pub fn first_gpu(sysfs_root: impl AsRef<Path>) -> Result<GpuInfo> {
    let root = sysfs_root.as_ref();
    let gpus = discover_gpus(root)?;

    gpus.iter()
        .find(|g| g.is_intel())
        .or_else(|| gpus.first())
        .cloned()
        .ok_or_else(|| PmError::not_found(root.join("bus/pci/devices")))
}

/// Read a hexadecimal value from sysfs
fn read_hex_sysfs(path: &Path) -> Result<u32> {
    let content = std::fs::read_to_string(path)?;
    let trimmed = content.trim().trim_start_matches("0x");

    u32::from_str_radix(trimmed, 16).map_err(|e| {
        PmError::setup(format!("Invalid hex value in {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_device(root: &Path, addr: &str, vendor: &str, class: &str) {
        let dir = root.join("bus/pci/devices").join(addr);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("vendor"), vendor).unwrap();
        std::fs::write(dir.join("class"), class).unwrap();
    }

    #[test]
    fn finds_display_devices_sorted() {
        let root = tempfile::tempdir().unwrap();
        add_device(root.path(), "0000:01:00.0", "0x10de\n", "0x030000\n");
        add_device(root.path(), "0000:00:02.0", "0x8086\n", "0x030000\n");
        add_device(root.path(), "0000:00:1f.0", "0x8086\n", "0x060100\n");

        let gpus = discover_gpus(root.path()).unwrap();
        let addrs: Vec<_> = gpus.iter().map(GpuInfo::address).collect();
        assert_eq!(addrs, ["0000:00:02.0", "0000:01:00.0"]);
        assert!(gpus[0].is_intel());
        assert!(gpus[0].power_dir().ends_with("0000:00:02.0/power"));
    }

    #[test]
    fn prefers_intel_gpu() {
        let root = tempfile::tempdir().unwrap();
        add_device(root.path(), "0000:00:01.0", "0x1002\n", "0x030000\n");
        add_device(root.path(), "0000:00:02.0", "0x8086\n", "0x038000\n");

        assert_eq!(first_gpu(root.path()).unwrap().address(), "0000:00:02.0");
    }

    #[test]
    fn no_gpu_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        add_device(root.path(), "0000:00:1f.0", "0x8086\n", "0x060100\n");
        assert!(matches!(first_gpu(root.path()), Err(PmError::NotFound { .. })));
    }

    #[test]
    fn test_gpu_discovery() {
        // Exercises the real sysfs when present
        match discover_gpus(pm_regs::sysfs::SYSFS_ROOT) {
            Ok(gpus) => {
                for g in &gpus {
                    println!("GPU {} vendor {:#06x}", g.address, g.vendor);
                }
            }
            Err(e) => println!("ℹ️  No PCI sysfs (expected in containers): {e}"),
        }
    }
}
