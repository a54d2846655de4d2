//! Access-point-backed volumes.

use std::collections::HashMap;

use async_trait::async_trait;
use efsprov_common::paths::{check_sub_path, provisioned_path, under_mount};
use efsprov_common::{ProvError, ProvResult, Tags, VolumeHandle};

use super::{Collaborators, Provisioner, ProvisioningMode, RootMount, latest, mount_options};
use crate::cloud::{AccessPointOptions, CloudError, ScopedCloud, describe_file_system_error};
use crate::params::{self, IdentityParams};
use crate::types::{
    AZ_NAME, CreateVolumeRequest, DIRECTORY_PERMS, DeleteVolumeRequest, MOUNT_TARGET_IP, Volume,
};

/// Tag placed on every access point this provisioner creates.
pub const DEFAULT_TAG_KEY: &str = "efs.csi.aws.com/cluster";
/// Value of [`DEFAULT_TAG_KEY`].
pub const DEFAULT_TAG_VALUE: &str = "true";

/// Creates one remote access point per volume.
pub struct AccessPointProvisioner {
    collaborators: Collaborators,
    tags: Tags,
    delete_root_dir: bool,
}

impl AccessPointProvisioner {
    /// Create a provisioner that tags access points with `tags` on top of
    /// the default tag.
    pub fn new(collaborators: Collaborators, tags: Tags) -> Self {
        Self {
            collaborators,
            tags,
            delete_root_dir: false,
        }
    }

    /// Also remove the access point's root directory on delete.
    #[must_use]
    pub fn with_root_dir_deletion(mut self, enabled: bool) -> Self {
        self.delete_root_dir = enabled;
        self
    }

    fn volume_tags(&self) -> Tags {
        let mut tags = Tags::from([(DEFAULT_TAG_KEY.to_string(), DEFAULT_TAG_VALUE.to_string())]);
        tags.extend(self.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        tags
    }

    async fn mount_target_context(
        scoped: &ScopedCloud,
        file_system_id: &str,
        az: &str,
    ) -> HashMap<String, String> {
        let mut context = HashMap::new();
        if !scoped.is_cross_account() {
            return context;
        }
        match scoped.cloud.describe_mount_targets(file_system_id, az).await {
            Ok(target) => {
                context.insert(MOUNT_TARGET_IP.to_string(), target.ip_address);
            }
            Err(e) => tracing::warn!(
                file_system_id,
                az,
                error = %e,
                "Failed to describe mount targets, skipping mount target address"
            ),
        }
        context
    }

    fn remove_root_dir(
        &self,
        file_system_id: &str,
        root_dir: &str,
        options: &[String],
    ) -> ProvResult<()> {
        if root_dir.trim_matches('/').is_empty() {
            return Err(ProvError::internal(format!(
                "Refusing to delete root directory {root_dir:?} of file system {file_system_id}"
            )));
        }
        check_sub_path(root_dir)?;

        let mount = RootMount::establish(
            self.collaborators.mounter.as_ref(),
            self.collaborators.os.as_ref(),
            &self.collaborators.temp_mount_root,
            file_system_id,
            options,
        )?;

        let removed = self
            .collaborators
            .os
            .remove_all(&under_mount(mount.path(), root_dir))
            .map_err(|e| {
                ProvError::internal(format!(
                    "Could not delete access point root directory {root_dir}: {e}"
                ))
            });
        latest(removed, mount.teardown())
    }
}

fn create_error(name: &str, file_system_id: &str, err: &CloudError) -> ProvError {
    match err {
        CloudError::AccessDenied => ProvError::unauthenticated(format!(
            "Access Denied. Please ensure you have the right permissions: {err}"
        )),
        CloudError::AlreadyExists => ProvError::AlreadyExists {
            resource: format!("access point {name}"),
        },
        _ => ProvError::internal(format!(
            "Failed to create access point in file system {file_system_id}: {err}"
        )),
    }
}

#[async_trait]
impl Provisioner for AccessPointProvisioner {
    fn mode(&self) -> ProvisioningMode {
        ProvisioningMode::AccessPoint
    }

    async fn provision(&self, req: &CreateVolumeRequest) -> ProvResult<Volume> {
        if req.name.is_empty() {
            return Err(ProvError::invalid_argument("Volume name not provided"));
        }
        let file_system_id = params::file_system_id(&req.parameters)?;
        let identity = IdentityParams::from_parameters(&req.parameters)?;
        let directory_path = provisioned_path(params::base_path(&req.parameters), &req.name)?;
        let az = req.parameter(AZ_NAME).unwrap_or_default();

        let scoped = self.collaborators.router.resolve(&req.secrets)?;
        scoped
            .cloud
            .describe_file_system(&file_system_id)
            .await
            .map_err(|e| describe_file_system_error(&file_system_id, &e))?;

        let resolved = identity.resolve(&self.collaborators.allocator, &file_system_id)?;
        let options = AccessPointOptions {
            capacity_bytes: req.capacity_bytes,
            file_system_id: file_system_id.clone(),
            uid: resolved.uid,
            gid: resolved.gid,
            directory_perms: req.parameter(DIRECTORY_PERMS).map(str::to_string),
            directory_path,
            tags: self.volume_tags(),
        };
        tracing::debug!(
            name = %req.name,
            file_system_id,
            uid = options.uid,
            gid = options.gid,
            path = %options.directory_path,
            "Creating access point"
        );

        let access_point = scoped
            .cloud
            .create_access_point(&req.name, &options)
            .await
            .map_err(|e| create_error(&req.name, &file_system_id, &e))?;
        resolved.commit();

        let volume_context = Self::mount_target_context(&scoped, &file_system_id, az).await;
        let volume_id =
            VolumeHandle::access_point(&file_system_id, access_point.access_point_id).to_string();

        tracing::info!(name = %req.name, volume_id, "Provisioned access point volume");
        Ok(Volume {
            volume_id,
            capacity_bytes: req.capacity_bytes,
            volume_context,
        })
    }

    async fn delete(&self, req: &DeleteVolumeRequest) -> ProvResult<()> {
        let scoped = self.collaborators.router.resolve(&req.secrets)?;
        let handle = VolumeHandle::parse(&req.volume_id)?;
        let file_system_id = handle.file_system_id();
        let access_point_id = handle.access_point_id();

        let access_point = match scoped.cloud.describe_access_point(access_point_id).await {
            Ok(access_point) => access_point,
            Err(CloudError::NotFound) => {
                tracing::info!(access_point_id, "Access point not found, nothing to delete");
                return Ok(());
            }
            Err(CloudError::AccessDenied) => return Err(access_denied()),
            Err(e) => {
                return Err(ProvError::internal(format!(
                    "Could not describe access point {access_point_id}: {e}"
                )));
            }
        };

        if self.delete_root_dir {
            let options = mount_options(&scoped, file_system_id).await;
            self.remove_root_dir(file_system_id, &access_point.root_dir, &options)?;
            tracing::debug!(
                access_point_id,
                root_dir = %access_point.root_dir,
                "Removed access point root directory"
            );
        }

        match scoped.cloud.delete_access_point(access_point_id).await {
            Ok(()) => {
                tracing::info!(volume_id = %req.volume_id, "Deleted access point volume");
            }
            Err(CloudError::NotFound) => {
                tracing::info!(access_point_id, "Access point not found, nothing to delete");
            }
            Err(CloudError::AccessDenied) => return Err(access_denied()),
            Err(e) => {
                return Err(ProvError::internal(format!(
                    "Failed to delete volume {}: {e}",
                    req.volume_id
                )));
            }
        }

        self.collaborators.allocator.release(file_system_id, access_point.gid);
        Ok(())
    }
}

fn access_denied() -> ProvError {
    ProvError::unauthenticated(format!(
        "Access Denied. Please ensure you have the right permissions: {}",
        CloudError::AccessDenied
    ))
}
