//! Host-side error types and reserved guest status values.
//!
//! `StatusCode` is the set of negative values the bridge writes into guest
//! status slots. HTTP statuses are always positive, so a guest can tell a
//! host-level rejection from a real response by sign alone.
//!
//! `HostError` is returned by `HostApi` methods. Recoverable variants map to a
//! `StatusCode` via [`to_status`](HostError::to_status); fatal variants
//! (`BadPointer`, `OutOfMemory`, `Mount`) trap the guest.

use std::fmt;
use std::path::PathBuf;

/// Reserved status values returned to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    /// The request could not be completed (refused, DNS, timeout, ...).
    NetworkFailure = -1,
    /// An input buffer was out of bounds, unterminated, too long, or not UTF-8.
    InvalidInput = -2,
    /// `buffer_release` was given a handle that is not live.
    BadHandle = -3,
    /// File access before the filesystem was mounted.
    NotMounted = -4,
    /// Virtual path outside the mount point.
    InvalidPath = -5,
    NotFound = -6,
    IoError = -7,
}

impl StatusCode {
    /// Convert from an i32 status written by the host.
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            -1 => Some(Self::NetworkFailure),
            -2 => Some(Self::InvalidInput),
            -3 => Some(Self::BadHandle),
            -4 => Some(Self::NotMounted),
            -5 => Some(Self::InvalidPath),
            -6 => Some(Self::NotFound),
            -7 => Some(Self::IoError),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NetworkFailure => "STATUS_NETWORK_FAILURE",
            Self::InvalidInput => "STATUS_INVALID_INPUT",
            Self::BadHandle => "STATUS_BAD_HANDLE",
            Self::NotMounted => "STATUS_NOT_MOUNTED",
            Self::InvalidPath => "STATUS_INVALID_PATH",
            Self::NotFound => "STATUS_NOT_FOUND",
            Self::IoError => "STATUS_IO_ERROR",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_i32())
    }
}

/// Why a filesystem mount could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MountError {
    /// The mount point is already bound to a different host directory.
    #[error("mount point {mount_point} already bound to {existing}")]
    MountPointInUse { mount_point: String, existing: PathBuf },

    /// The host root does not exist or is not a directory.
    #[error("host root {path} unavailable: {reason}")]
    RootUnavailable { path: PathBuf, reason: String },
}

/// Host-side error type returned by `HostApi` methods.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A guest pointer fell outside linear memory where no status slot exists
    /// to report it.
    #[error("guest pointer out of bounds")]
    BadPointer,

    /// The boundary arena could not grow guest memory.
    #[error("boundary allocation of {requested} bytes failed")]
    OutOfMemory { requested: usize },

    /// Filesystem mount failed.
    #[error("mount failed: {0}")]
    Mount(#[from] MountError),

    /// A recoverable rejection reported to the guest as a status value.
    #[error("host rejected call: {0}")]
    Status(StatusCode),

    /// Host-only failure, reported to the guest as `STATUS_IO_ERROR`.
    #[error("internal host error: {0}")]
    Internal(String),
}

impl HostError {
    /// Convert to the status value written back to the guest.
    pub fn to_status(&self) -> i32 {
        match self {
            Self::Status(code) => code.as_i32(),
            Self::BadPointer => StatusCode::InvalidInput.as_i32(),
            Self::OutOfMemory { .. } | Self::Mount(_) | Self::Internal(_) => {
                StatusCode::IoError.as_i32()
            }
        }
    }

    /// True for errors that must trap the guest rather than return a status.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BadPointer | Self::OutOfMemory { .. } | Self::Mount(_))
    }

    pub fn invalid_input() -> Self {
        Self::Status(StatusCode::InvalidInput)
    }

    pub fn bad_handle() -> Self {
        Self::Status(StatusCode::BadHandle)
    }

    pub fn not_mounted() -> Self {
        Self::Status(StatusCode::NotMounted)
    }

    pub fn invalid_path() -> Self {
        Self::Status(StatusCode::InvalidPath)
    }
}

impl From<StatusCode> for HostError {
    fn from(code: StatusCode) -> Self {
        Self::Status(code)
    }
}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::Status(StatusCode::NotFound),
            _ => Self::Status(StatusCode::IoError),
        }
    }
}
