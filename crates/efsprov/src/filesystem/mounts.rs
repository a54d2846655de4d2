//! Mount operations.

use std::io;
use std::path::Path;
use std::process::Command;

/// Mounts and unmounts backing file systems on the controller host.
pub trait Mounter: Send + Sync {
    /// Create a directory to mount onto, including parents.
    fn make_dir(&self, path: &Path) -> io::Result<()>;

    /// Mount `source` at `target`.
    fn mount(&self, source: &str, target: &Path, fs_type: &str, options: &[String])
    -> io::Result<()>;

    /// Unmount `target`.
    fn unmount(&self, target: &Path) -> io::Result<()>;
}

/// Mounts through the system `mount` helper, which resolves the file system
/// id to an endpoint, and unmounts with `umount2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMounter;

impl Mounter for SystemMounter {
    fn make_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
    ) -> io::Result<()> {
        tracing::debug!(
            source,
            mount_point = %target.display(),
            fs_type,
            ?options,
            "Mounting filesystem"
        );

        let mut cmd = Command::new("mount");
        cmd.arg("-t").arg(fs_type);
        if !options.is_empty() {
            cmd.arg("-o").arg(options.join(","));
        }
        let output = cmd.arg(source).arg(target).output()?;

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "mount -t {fs_type} {source} {} failed ({}): {}",
                target.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn unmount(&self, target: &Path) -> io::Result<()> {
        use rustix::mount::{UnmountFlags, unmount};

        tracing::debug!(mount_point = %target.display(), "Unmounting filesystem");

        unmount(target, UnmountFlags::empty()).map_err(io::Error::from)
    }

    #[cfg(not(target_os = "linux"))]
    fn unmount(&self, _target: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unmount is only supported on Linux",
        ))
    }
}
