//! Virtual filesystem view for the guest.
//!
//! Holds the single `/axolotl` mount and maps virtual paths under it onto the
//! host directory. The mount is one-way: `Unmounted` moves to `Mounted` or
//! `Skipped` and stays there for the life of the instance.

use std::path::{Path, PathBuf};

use zina_hostapi::{
    FilesystemCapability, HostError, MountDescriptor, MountError, MountOutcome, MOUNT_POINT,
};

/// Mount state of the guest's filesystem view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MountState {
    #[default]
    Unmounted,
    Mounted(MountDescriptor),
    /// The host has no filesystem to offer.
    Skipped,
}

#[derive(Debug, Default)]
pub struct VirtualFs {
    state: MountState,
}

impl VirtualFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &MountState {
        &self.state
    }

    /// Apply the mount for the given host capability.
    pub fn mount(&mut self, capability: FilesystemCapability) -> Result<MountOutcome, MountError> {
        let root = match capability {
            FilesystemCapability::Unavailable => {
                return Ok(match &self.state {
                    MountState::Mounted(desc) => MountOutcome::AlreadyMounted(desc.clone()),
                    _ => {
                        self.state = MountState::Skipped;
                        MountOutcome::Skipped
                    }
                });
            }
            FilesystemCapability::Native { root } => root,
        };

        let root = canonical_dir(&root)?;
        match &self.state {
            MountState::Mounted(desc) if desc.host_root == root => {
                Ok(MountOutcome::AlreadyMounted(desc.clone()))
            }
            MountState::Mounted(desc) => Err(MountError::MountPointInUse {
                mount_point: MOUNT_POINT.to_string(),
                existing: desc.host_root.clone(),
            }),
            MountState::Skipped => Ok(MountOutcome::Skipped),
            MountState::Unmounted => {
                let desc = MountDescriptor::new(root);
                self.state = MountState::Mounted(desc.clone());
                Ok(MountOutcome::Mounted(desc))
            }
        }
    }

    /// Map a virtual path under the mount point to its host path.
    ///
    /// `.` and `..` are resolved lexically; a path that climbs above the mount
    /// point is rejected. Symlinks are not followed here; file access checks
    /// them against the host root before opening.
    pub fn resolve(&self, virtual_path: &str) -> Result<PathBuf, HostError> {
        let desc = match &self.state {
            MountState::Mounted(desc) => desc,
            _ => return Err(HostError::not_mounted()),
        };

        let rest = virtual_path
            .strip_prefix(desc.mount_point)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(HostError::invalid_path)?;

        let mut parts: Vec<&str> = Vec::new();
        for part in rest.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop().ok_or_else(HostError::invalid_path)?;
                }
                p if p.contains('\\') => return Err(HostError::invalid_path()),
                p => parts.push(p),
            }
        }
        if parts.is_empty() {
            return Err(HostError::invalid_path());
        }

        let mut path = desc.host_root.clone();
        path.extend(parts);
        Ok(path)
    }

    /// Resolve `virtual_path` and check it against the host filesystem.
    ///
    /// The containing directory must canonicalize to somewhere under the
    /// host root. With `follow_leaf`, a symlink at the path itself must too.
    fn confined(&self, virtual_path: &str, follow_leaf: bool) -> Result<PathBuf, HostError> {
        let path = self.resolve(virtual_path)?;
        let root = match &self.state {
            MountState::Mounted(desc) => &desc.host_root,
            _ => return Err(HostError::not_mounted()),
        };

        let parent = path.parent().ok_or_else(HostError::invalid_path)?;
        if !parent.canonicalize()?.starts_with(root) {
            return Err(HostError::invalid_path());
        }

        let is_link = std::fs::symlink_metadata(&path)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        if follow_leaf && is_link {
            // Dangling links are rejected too: writing through one would
            // create its target.
            let target = path
                .canonicalize()
                .map_err(|_| HostError::invalid_path())?;
            if !target.starts_with(root) {
                return Err(HostError::invalid_path());
            }
        }
        Ok(path)
    }

    pub fn read(&self, virtual_path: &str) -> Result<Vec<u8>, HostError> {
        let path = self.confined(virtual_path, true)?;
        Ok(std::fs::read(path)?)
    }

    pub fn write(&self, virtual_path: &str, data: &[u8]) -> Result<(), HostError> {
        let path = self.confined(virtual_path, true)?;
        Ok(std::fs::write(path, data)?)
    }

    /// Remove a file. A symlink is removed itself, never its target.
    pub fn unlink(&self, virtual_path: &str) -> Result<(), HostError> {
        let path = self.confined(virtual_path, false)?;
        Ok(std::fs::remove_file(path)?)
    }
}

fn canonical_dir(root: &Path) -> Result<PathBuf, MountError> {
    let unavailable = |reason: String| MountError::RootUnavailable {
        path: root.to_path_buf(),
        reason,
    };
    let canonical = root.canonicalize().map_err(|e| unavailable(e.to_string()))?;
    if !canonical.is_dir() {
        return Err(unavailable("not a directory".into()));
    }
    Ok(canonical)
}
