//! Host-side filesystem collaborators.
//!
//! This module handles:
//! - Mounting a backing file system root at a temporary path
//! - Creating and removing directories under that mount
//! - Temporary mount point naming

mod mounts;
mod os;

use std::path::{Path, PathBuf};

pub use mounts::{Mounter, SystemMounter};
pub use os::{OsClient, RealOsClient};

/// File system type handed to the mounter.
pub const FS_TYPE: &str = "efs";

/// A fresh, unique temporary mount point under `root`.
#[must_use]
pub fn temp_mount_point(root: &Path) -> PathBuf {
    root.join(uuid::Uuid::new_v4().to_string())
}
