//! Directory-backed volumes.
//!
//! Each volume is a plain directory on the shared file system, created
//! through a short-lived root mount on the controller host.

use std::collections::HashMap;

use async_trait::async_trait;
use efsprov_common::paths::{check_sub_path, provisioned_path, under_mount};
use efsprov_common::{ProvError, ProvResult, VolumeHandle};

use super::{Collaborators, Provisioner, ProvisioningMode, RootMount, latest, mount_options};
use crate::params::{self, IdentityParams};
use crate::types::{CreateVolumeRequest, DeleteVolumeRequest, Volume};

/// Creates one directory per volume under `basePath`.
pub struct DirectoryProvisioner {
    collaborators: Collaborators,
    delete_provisioned_dir: bool,
}

impl DirectoryProvisioner {
    /// Create a provisioner. Deletes are no-ops until enabled.
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            delete_provisioned_dir: false,
        }
    }

    /// Remove the volume directory on delete.
    #[must_use]
    pub fn with_dir_deletion(mut self, enabled: bool) -> Self {
        self.delete_provisioned_dir = enabled;
        self
    }

    fn mount(&self, file_system_id: &str, options: &[String]) -> ProvResult<RootMount<'_>> {
        RootMount::establish(
            self.collaborators.mounter.as_ref(),
            self.collaborators.os.as_ref(),
            &self.collaborators.temp_mount_root,
            file_system_id,
            options,
        )
    }
}

#[async_trait]
impl Provisioner for DirectoryProvisioner {
    fn mode(&self) -> ProvisioningMode {
        ProvisioningMode::Directory
    }

    async fn provision(&self, req: &CreateVolumeRequest) -> ProvResult<Volume> {
        if req.name.is_empty() {
            return Err(ProvError::invalid_argument("Volume name not provided"));
        }
        let file_system_id = params::file_system_id(&req.parameters)?;
        let identity = IdentityParams::from_parameters(&req.parameters)?;
        let mode = params::directory_mode(&req.parameters);
        let sub_path = provisioned_path(params::base_path(&req.parameters), &req.name)?;
        let handle = VolumeHandle::directory(&file_system_id, sub_path.as_str())?;

        let scoped = self.collaborators.router.resolve(&req.secrets)?;
        let options = mount_options(&scoped, &file_system_id).await;
        let resolved = identity.resolve(&self.collaborators.allocator, &file_system_id)?;

        tracing::debug!(
            file_system_id,
            path = %sub_path,
            mode = %format!("{mode:o}"),
            uid = resolved.uid,
            gid = resolved.gid,
            "Provisioning directory"
        );

        let mount = self.mount(&file_system_id, &options)?;
        let created = self
            .collaborators
            .os
            .mkdir_all_with_owner(
                &under_mount(mount.path(), &sub_path),
                mode,
                resolved.uid,
                resolved.gid,
            )
            .map_err(|e| ProvError::internal(format!("Could not provision directory: {e}")));
        latest(created, mount.teardown())?;
        resolved.commit();

        let volume_id = handle.to_string();
        tracing::info!(name = %req.name, volume_id, "Provisioned directory volume");
        Ok(Volume {
            volume_id,
            capacity_bytes: req.capacity_bytes,
            volume_context: HashMap::new(),
        })
    }

    async fn delete(&self, req: &DeleteVolumeRequest) -> ProvResult<()> {
        if !self.delete_provisioned_dir {
            tracing::debug!(
                volume_id = %req.volume_id,
                "Directory deletion disabled, keeping data"
            );
            return Ok(());
        }

        let handle = VolumeHandle::parse(&req.volume_id)?;
        let file_system_id = handle.file_system_id();
        let sub_path = handle.sub_path();
        if sub_path.trim_matches('/').is_empty() {
            return Err(ProvError::invalid_argument(format!(
                "Volume ID {} does not name a directory",
                req.volume_id
            )));
        }
        check_sub_path(sub_path)?;

        let scoped = self.collaborators.router.resolve(&req.secrets)?;
        let options = mount_options(&scoped, file_system_id).await;

        let mount = self.mount(file_system_id, &options)?;
        let directory = under_mount(mount.path(), sub_path);
        let owner = match self.collaborators.os.owner_gid(&directory) {
            Ok(gid) => Some(gid),
            Err(e) => {
                tracing::debug!(path = %sub_path, error = %e, "Could not read directory owner");
                None
            }
        };
        let removed = self
            .collaborators
            .os
            .remove_all(&directory)
            .map_err(|e| {
                ProvError::internal(format!("Could not delete directory {sub_path}: {e}"))
            });
        latest(removed, mount.teardown())?;

        if let Some(gid) = owner {
            self.collaborators.allocator.release(file_system_id, gid);
        }
        tracing::info!(volume_id = %req.volume_id, "Deleted directory volume");
        Ok(())
    }
}
