//! Runtime-PM status source
//!
//! Reads `power/runtime_status`. The file is kept open for the whole run and
//! rewound before every read, so each sample costs one `lseek` + one `read`.

use crate::error::{PmError, Result};
use crate::state::PowerState;
use pm_regs::sysfs::STATUS_READ_MAX;
use rustix::fs::{seek, SeekFrom};
use std::fmt::Debug;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A readable source of runtime-PM status strings
pub trait StatusSource: Debug + Send {
    /// Read the raw status string from the start of the source
    ///
    /// # Errors
    ///
    /// Returns error if the source cannot be read.
    fn read_status(&mut self) -> Result<String>;

    /// Read and parse the current state
    ///
    /// # Errors
    ///
    /// Returns `PmError::ContractViolation` if the content is not one of the
    /// known literals, or the read error.
    fn state(&mut self) -> Result<PowerState> {
        let raw = self.read_status()?;
        PowerState::from_status(&raw)
    }
}

/// `runtime_status` attribute in sysfs
#[derive(Debug)]
pub struct SysfsStatus {
    path: PathBuf,
    file: File,
}

impl SysfsStatus {
    /// Open the status attribute read-only
    ///
    /// # Errors
    ///
    /// Returns `PmError::NotFound` if the attribute does not exist, or the
    /// open error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PmError::not_found(path));
        }

        let file = File::open(path)?;
        tracing::debug!("Opened status source {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Attribute path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusSource for SysfsStatus {
    fn read_status(&mut self) -> Result<String> {
        seek(&self.file, SeekFrom::Start(0))?;

        let mut buf = [0u8; STATUS_READ_MAX];
        let n = rustix::io::read(&self.file, &mut buf)?;

        Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
    }
}
