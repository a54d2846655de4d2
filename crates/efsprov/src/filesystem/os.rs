//! Local filesystem operations performed under a temporary mount.

use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt};
use std::path::Path;

/// Directory operations the provisioners perform under a mount point.
pub trait OsClient: Send + Sync {
    /// Create `path` and its parents with `mode`, then chown it.
    fn mkdir_all_with_owner(&self, path: &Path, mode: u32, uid: u32, gid: u32) -> io::Result<()>;

    /// Remove a file or empty directory.
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory tree. A missing path is not an error.
    fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Owning group of `path`.
    fn owner_gid(&self, path: &Path) -> io::Result<u32>;
}

/// [`OsClient`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealOsClient;

impl OsClient for RealOsClient {
    fn mkdir_all_with_owner(&self, path: &Path, mode: u32, uid: u32, gid: u32) -> io::Result<()> {
        DirBuilder::new().recursive(true).mode(mode).create(path)?;
        std::os::unix::fs::chown(path, Some(uid), Some(gid))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if fs::symlink_metadata(path)?.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        match fs::remove_dir_all(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn owner_gid(&self, path: &Path) -> io::Result<u32> {
        Ok(fs::metadata(path)?.gid())
    }
}
