use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use crate::opal::DiscoveryError;

/// Why a command stopped without a drive status to report.
///
/// Everything but `Discovery` is raised before any control call is issued.
#[derive(Debug, Error)]
pub enum SedError {
    #[error("{}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a block device!", .0.display())]
    NotBlockDevice(PathBuf),

    #[error("Incorrect User, please provide userN/Admin1 (got {0:?})")]
    InvalidUser(String),

    #[error("Invalid Lock state {0:?}, expected RW/RO/LK")]
    InvalidLockState(String),

    #[error("{0}")]
    MissingArguments(&'static str),

    #[error("Opal Admin is already activated by default!")]
    AdminAlreadyActive,

    #[error("failed to read password: {0}")]
    Prompt(#[source] io::Error),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl SedError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            SedError::Open { source, .. } => source.raw_os_error().unwrap_or(Errno::EIO as i32),
            SedError::NotBlockDevice(_) => Errno::ENODEV as i32,
            SedError::Discovery(_) => Errno::EIO as i32,
            // A password that could not be read counts as a missing one.
            _ => Errno::EINVAL as i32,
        }
    }
}

pub type Result<T> = std::result::Result<T, SedError>;
