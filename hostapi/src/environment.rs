//! Host capability detection for the filesystem mount.
//!
//! The sandbox does not probe its environment inline. A `HostEnvironment` is
//! injected at startup and asked once, when the guest mounts, whether a
//! persistent filesystem is available and which directory backs it.

use std::path::PathBuf;

use crate::types::MountDescriptor;

/// What the host can offer the guest's filesystem view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilesystemCapability {
    /// Native filesystem access; `root` is exposed at the mount point.
    Native { root: PathBuf },
    /// No persistent filesystem; mounting is a no-op.
    Unavailable,
}

/// Capability check consumed by the mount adapter.
pub trait HostEnvironment: Send + Sync {
    fn filesystem(&self) -> FilesystemCapability;
}

/// Host with direct filesystem access.
#[derive(Debug, Clone)]
pub struct NativeEnvironment {
    root: PathBuf,
}

impl NativeEnvironment {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Rooted at the process's working directory.
    pub fn current_dir() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }
}

impl HostEnvironment for NativeEnvironment {
    fn filesystem(&self) -> FilesystemCapability {
        FilesystemCapability::Native {
            root: self.root.clone(),
        }
    }
}

/// Host without filesystem access (browser-like embeddings).
#[derive(Debug, Clone, Copy, Default)]
pub struct RestrictedEnvironment;

impl HostEnvironment for RestrictedEnvironment {
    fn filesystem(&self) -> FilesystemCapability {
        FilesystemCapability::Unavailable
    }
}

/// Terminal state reached by a mount request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted(MountDescriptor),
    /// The same root was already mounted; nothing changed.
    AlreadyMounted(MountDescriptor),
    /// The environment has no filesystem.
    Skipped,
}
