//! Well-known filesystem paths.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;

use crate::error::{ProvError, ProvResult};

/// Directory under which temporary root mounts are created.
pub static TEMP_MOUNT_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("EFSPROV_TEMP_MOUNT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/lib/csi/pv"))
});

/// Join a volume sub path (which starts with `/`) onto a mount point.
///
/// `Path::join` would discard the mount point for absolute sub paths, so the
/// leading slashes are trimmed first. Callers check the sub path with
/// [`check_sub_path`] before mounting.
#[must_use]
pub fn under_mount(mount_point: &Path, sub_path: &str) -> PathBuf {
    let relative = sub_path.trim_start_matches('/');
    if relative.is_empty() {
        mount_point.to_path_buf()
    } else {
        mount_point.join(relative)
    }
}

/// Reject sub paths that could leave the mount point once joined onto it.
///
/// Only the root and plain names are allowed; `.` and `..` segments are not.
///
/// # Errors
///
/// Returns [`ProvError::InvalidArgument`] naming the offending path.
pub fn check_sub_path(sub_path: &str) -> ProvResult<()> {
    let escapes = sub_path
        .split('/')
        .any(|segment| segment == "." || segment == "..");
    let plain = Path::new(sub_path)
        .components()
        .all(|c| matches!(c, Component::RootDir | Component::Normal(_)));
    if escapes || !plain {
        return Err(ProvError::invalid_argument(format!(
            "Path {sub_path:?} must not contain '.' or '..' segments"
        )));
    }
    Ok(())
}

/// Build the absolute directory path for a volume: `basePath + "/" + name`,
/// normalized to always start with a single `/`.
///
/// # Errors
///
/// Returns [`ProvError::InvalidArgument`] when either part contains a `.` or
/// `..` segment.
pub fn provisioned_path(base_path: &str, name: &str) -> ProvResult<String> {
    let mut path = String::new();
    for segment in base_path.split('/').filter(|s| !s.is_empty()) {
        path.push('/');
        path.push_str(segment);
    }
    path.push('/');
    path.push_str(name);
    check_sub_path(&path)?;
    Ok(path)
}
