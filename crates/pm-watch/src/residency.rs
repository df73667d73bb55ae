//! Package C-state residency counters
//!
//! Reads PC8 / PC9 / PC10 residency through the `msr` character device
//! (`modprobe msr`). Each read is a `pread` of 8 bytes at the MSR address.
//!
//! The counters only tell us that the package *has been* in a deep state
//! since the last sample, never what the GPU is doing right now, so the
//! watcher uses them as a fallback when runtime-PM status is unavailable.

use crate::error::{PmError, Result};
use pm_regs::msr;
use rustix::io::pread;
use std::fmt::Debug;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Residency counter class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResidencyClass {
    /// Package C8
    Pc8,
    /// Package C9
    Pc9,
    /// Package C10
    Pc10,
}

impl ResidencyClass {
    /// All classes, in sampling order
    pub const ALL: [Self; 3] = [Self::Pc8, Self::Pc9, Self::Pc10];

    /// MSR address of this counter
    pub const fn msr(self) -> u64 {
        match self {
            Self::Pc8 => msr::PC8_RESIDENCY,
            Self::Pc9 => msr::PC9_RESIDENCY,
            Self::Pc10 => msr::PC10_RESIDENCY,
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::Pc8 => 0,
            Self::Pc9 => 1,
            Self::Pc10 => 2,
        }
    }
}

impl std::fmt::Display for ResidencyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pc8 => write!(f, "PC8"),
            Self::Pc9 => write!(f, "PC9"),
            Self::Pc10 => write!(f, "PC10"),
        }
    }
}

/// One reading of all three counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResidencySample([u64; 3]);

impl ResidencySample {
    /// Build a sample from raw counter values in [`ResidencyClass::ALL`] order
    pub const fn new(values: [u64; 3]) -> Self {
        Self(values)
    }

    /// Counter value for one class
    pub const fn get(&self, class: ResidencyClass) -> u64 {
        self.0[class.slot()]
    }

    /// First class whose counter differs from `baseline`
    pub fn changed_since(&self, baseline: &Self) -> Option<ResidencyClass> {
        ResidencyClass::ALL
            .into_iter()
            .find(|&c| self.get(c) != baseline.get(c))
    }
}

/// A source of residency counter values
pub trait ResidencySource: Debug + Send {
    /// Read one counter
    ///
    /// # Errors
    ///
    /// Returns error if the counter cannot be read.
    fn read_counter(&mut self, class: ResidencyClass) -> Result<u64>;

    /// Read all three counters
    ///
    /// # Errors
    ///
    /// Returns the first read error.
    fn sample(&mut self) -> Result<ResidencySample> {
        let mut values = [0u64; 3];
        for class in ResidencyClass::ALL {
            values[class.slot()] = self.read_counter(class)?;
        }
        Ok(ResidencySample(values))
    }
}

/// MSR character device (`/dev/cpu/N/msr`)
#[derive(Debug)]
pub struct MsrDevice {
    path: PathBuf,
    file: File,
}

impl MsrDevice {
    /// Open the MSR device read-only
    ///
    /// # Errors
    ///
    /// Returns `PmError::NotFound` if the device node is missing (msr module
    /// not loaded), or the open error (usually a permission problem).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PmError::not_found(path));
        }

        let file = File::open(path)?;
        tracing::debug!("Opened MSR device {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Device path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check that every residency counter can be read
    ///
    /// Parts without PC8+ support reject these reads.
    pub fn supports_deep_residency(&mut self) -> bool {
        match self.sample() {
            Ok(sample) => {
                tracing::debug!("Residency probe ok: {sample:?}");
                true
            }
            Err(e) => {
                tracing::debug!("Residency probe failed: {e}");
                false
            }
        }
    }
}

impl ResidencySource for MsrDevice {
    fn read_counter(&mut self, class: ResidencyClass) -> Result<u64> {
        let mut buf = [0u8; msr::COUNTER_BYTES];
        let n = pread(&self.file, &mut buf, class.msr())?;

        if n != buf.len() {
            return Err(PmError::unsupported(format!(
                "short read of {class} residency (MSR {:#x}): {n} bytes",
                class.msr()
            )));
        }

        Ok(u64::from_le_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Regular file laid out so `pread` at each MSR address sees a value.
    fn fake_msr(len: usize) -> tempfile::NamedTempFile {
        let f = tempfile::NamedTempFile::new().unwrap();
        let mut bytes = vec![0u8; len];
        if len >= 0x640 {
            bytes[0x632..0x63A].copy_from_slice(&7u64.to_le_bytes());
        }
        std::fs::write(f.path(), bytes).unwrap();
        f
    }

    #[test]
    fn class_addresses() {
        assert_eq!(ResidencyClass::Pc8.msr(), 0x630);
        assert_eq!(ResidencyClass::Pc10.msr(), 0x632);
        assert_eq!(ResidencyClass::Pc9.to_string(), "PC9");
        assert_eq!(ResidencyClass::ALL.map(ResidencyClass::msr), msr::ALL_RESIDENCY);
    }

    #[test]
    fn change_detection_reports_first_moved_class() {
        let base = ResidencySample::new([10, 20, 30]);
        assert_eq!(base.changed_since(&base), None);
        assert_eq!(
            ResidencySample::new([10, 21, 31]).changed_since(&base),
            Some(ResidencyClass::Pc9)
        );
    }

    #[test]
    fn reads_counters_from_file_offsets() {
        let f = fake_msr(0x640);
        let mut dev = MsrDevice::open(f.path()).unwrap();
        assert_eq!(dev.read_counter(ResidencyClass::Pc10).unwrap(), 7);
        assert!(dev.supports_deep_residency());
    }

    #[test]
    fn short_read_means_unsupported() {
        let f = fake_msr(0x100);
        let mut dev = MsrDevice::open(f.path()).unwrap();
        let err = dev.read_counter(ResidencyClass::Pc8).unwrap_err();
        assert!(matches!(err, PmError::UnsupportedPlatform { .. }));
        assert!(!dev.supports_deep_residency());
    }

    #[test]
    #[ignore] // Requires root and the msr module
    fn real_msr_device() {
        match MsrDevice::open(msr::DEFAULT_MSR_DEVICE) {
            Ok(mut dev) => println!("PC8+ residency supported: {}", dev.supports_deep_residency()),
            Err(e) => println!("MSR device unavailable: {e}"),
        }
    }
}
