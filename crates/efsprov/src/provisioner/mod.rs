//! Volume provisioning strategies.
//!
//! Two strategies exist, selected per request by the `provisioningMode`
//! parameter:
//!
//! | Mode | Provisioner | Volume id |
//! |---|---|---|
//! | `efs-ap` | [`AccessPointProvisioner`] | `<fs>::<ap>` |
//! | `efs-dir` | [`DirectoryProvisioner`] | `<fs>:<path>` |
//!
//! Both share [`Collaborators`] and the temporary root mount sequence in
//! [`RootMount`].

mod access_point;
mod directory;
mod registry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use efsprov_common::{ProvError, ProvResult};

pub use access_point::AccessPointProvisioner;
pub use directory::DirectoryProvisioner;
pub use registry::{Provisioners, ProvisioningMode};

use crate::cloud::{CloudRouter, ScopedCloud};
use crate::filesystem::{FS_TYPE, Mounter, OsClient, temp_mount_point};
use crate::identity::GidAllocator;
use crate::types::{CreateVolumeRequest, DeleteVolumeRequest, MOUNT_TARGET_IP, Volume};

/// A provisioning strategy.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// The mode this provisioner serves.
    fn mode(&self) -> ProvisioningMode;

    /// Create a volume.
    async fn provision(&self, req: &CreateVolumeRequest) -> ProvResult<Volume>;

    /// Delete a volume. Deleting an already-deleted volume succeeds.
    async fn delete(&self, req: &DeleteVolumeRequest) -> ProvResult<()>;
}

/// External collaborators shared by every provisioner.
#[derive(Clone)]
pub struct Collaborators {
    /// Remote service client routing.
    pub router: CloudRouter,
    /// Identity ledgers.
    pub allocator: Arc<GidAllocator>,
    /// Host mounter.
    pub mounter: Arc<dyn Mounter>,
    /// Host filesystem client.
    pub os: Arc<dyn OsClient>,
    /// Directory that holds temporary mount points.
    pub temp_mount_root: PathBuf,
}

/// Mount options for a root mount of `file_system_id`.
///
/// Cross-account requests also try to pin the mount target address; failing
/// to resolve it only loses the hint.
pub(crate) async fn mount_options(scoped: &ScopedCloud, file_system_id: &str) -> Vec<String> {
    let mut options = vec!["tls".to_string(), "iam".to_string()];
    if scoped.is_cross_account() {
        match scoped.cloud.describe_mount_targets(file_system_id, "").await {
            Ok(target) => options.push(format!("{MOUNT_TARGET_IP}={}", target.ip_address)),
            Err(e) => tracing::warn!(
                file_system_id,
                error = %e,
                "Failed to describe mount targets, skipping mount target address option"
            ),
        }
    }
    options
}

/// The file system root mounted at a fresh temporary directory.
///
/// [`RootMount::teardown`] unmounts and removes the directory. If the value
/// is dropped without a teardown, the drop does it instead.
pub(crate) struct RootMount<'a> {
    mounter: &'a dyn Mounter,
    os: &'a dyn OsClient,
    target: PathBuf,
    mounted: bool,
}

impl<'a> RootMount<'a> {
    /// Create a temporary directory under `root` and mount the file system
    /// root there.
    ///
    /// A mount failure removes the directory again and is returned; nothing
    /// else is attempted.
    pub(crate) fn establish(
        mounter: &'a dyn Mounter,
        os: &'a dyn OsClient,
        root: &Path,
        file_system_id: &str,
        options: &[String],
    ) -> ProvResult<Self> {
        let target = temp_mount_point(root);
        mounter.make_dir(&target).map_err(|e| {
            ProvError::internal(format!("Could not create dir {}: {e}", target.display()))
        })?;

        if let Err(e) = mounter.mount(file_system_id, &target, FS_TYPE, options) {
            if let Err(cleanup) = os.remove(&target) {
                tracing::warn!(
                    mount_point = %target.display(),
                    error = %cleanup,
                    "Could not remove temporary mount point after failed mount"
                );
            }
            return Err(ProvError::internal(format!(
                "Could not mount {file_system_id} at {}: {e}",
                target.display()
            )));
        }

        tracing::debug!(
            file_system_id,
            mount_point = %target.display(),
            "Mounted file system root"
        );
        Ok(Self {
            mounter,
            os,
            target,
            mounted: true,
        })
    }

    /// The mount point.
    pub(crate) fn path(&self) -> &Path {
        &self.target
    }

    /// Unmount and remove the mount point. Both steps are always attempted;
    /// the later failure wins.
    pub(crate) fn teardown(mut self) -> ProvResult<()> {
        self.cleanup()
    }

    fn cleanup(&mut self) -> ProvResult<()> {
        if !self.mounted {
            return Ok(());
        }
        self.mounted = false;

        let unmounted = self.mounter.unmount(&self.target).map_err(|e| {
            ProvError::internal(format!("Could not unmount {}: {e}", self.target.display()))
        });
        let removed = self.os.remove(&self.target).map_err(|e| {
            ProvError::internal(format!("Could not delete {}: {e}", self.target.display()))
        });
        latest(unmounted, removed)
    }
}

impl Drop for RootMount<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            tracing::error!(
                mount_point = %self.target.display(),
                error = %e,
                "Temporary mount cleanup failed"
            );
        }
    }
}

/// Combine two step results, letting a failure of the later step override
/// the earlier result. An overridden failure is logged.
pub(crate) fn latest(earlier: ProvResult<()>, later: ProvResult<()>) -> ProvResult<()> {
    match (earlier, later) {
        (Err(first), Err(second)) => {
            tracing::error!(error = %first, "Earlier step failed before a later failure");
            Err(second)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}
