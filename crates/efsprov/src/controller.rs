//! Controller entry points consumed by the protocol layer.

use std::sync::Arc;

use efsprov_common::{ProvError, ProvResult, VolumeHandle, VolumeKind};

use crate::cloud::{Cloud, CloudFactory, CloudRouter};
use crate::config::ControllerConfig;
use crate::filesystem::{Mounter, OsClient, RealOsClient, SystemMounter};
use crate::identity::GidAllocator;
use crate::provisioner::{
    AccessPointProvisioner, Collaborators, DirectoryProvisioner, Provisioner, Provisioners,
    ProvisioningMode,
};
use crate::types::{CreateVolumeRequest, DeleteVolumeRequest, PROVISIONING_MODE, Volume};

/// Creates and deletes volumes by dispatching to a provisioner.
#[derive(Clone)]
pub struct Controller {
    provisioners: Provisioners,
    allocator: Arc<GidAllocator>,
}

impl Controller {
    /// Start building a controller that talks to `cloud`.
    pub fn builder(config: ControllerConfig, cloud: Arc<dyn Cloud>) -> ControllerBuilder {
        ControllerBuilder {
            config,
            cloud,
            factory: None,
            mounter: Arc::new(SystemMounter),
            os: Arc::new(RealOsClient),
            allocator: Arc::new(GidAllocator::new()),
        }
    }

    /// Create a controller from an explicit registry.
    pub fn from_provisioners(provisioners: Provisioners, allocator: Arc<GidAllocator>) -> Self {
        Self {
            provisioners,
            allocator,
        }
    }

    /// The identity allocator shared by the provisioners.
    #[must_use]
    pub fn allocator(&self) -> &GidAllocator {
        &self.allocator
    }

    /// Create a volume with the strategy named by `provisioningMode`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvError::InvalidArgument`] for a missing name or an
    /// absent or unknown mode, otherwise whatever the provisioner returns.
    pub async fn create_volume(&self, req: &CreateVolumeRequest) -> ProvResult<Volume> {
        if req.name.is_empty() {
            return Err(ProvError::invalid_argument("Volume name not provided"));
        }
        let mode = req.parameter(PROVISIONING_MODE).ok_or_else(|| {
            ProvError::invalid_argument(format!("Missing {PROVISIONING_MODE} parameter"))
        })?;
        let provisioner = self.provisioner(mode.parse()?)?;

        tracing::debug!(name = %req.name, mode, "Creating volume");
        provisioner.provision(req).await
    }

    /// Delete a volume, choosing the provisioner from the identifier form.
    ///
    /// # Errors
    ///
    /// Returns [`ProvError::InvalidArgument`] for an empty or malformed id,
    /// or a bare file system id; otherwise whatever the provisioner returns.
    pub async fn delete_volume(&self, req: &DeleteVolumeRequest) -> ProvResult<()> {
        if req.volume_id.is_empty() {
            return Err(ProvError::invalid_argument("Volume ID not provided"));
        }
        let handle = VolumeHandle::parse(&req.volume_id)?;
        let mode = match handle.kind() {
            VolumeKind::AccessPoint => ProvisioningMode::AccessPoint,
            VolumeKind::Directory => ProvisioningMode::Directory,
            VolumeKind::FileSystem => {
                return Err(ProvError::invalid_argument(format!(
                    "Volume ID {} names neither an access point nor a directory",
                    req.volume_id
                )));
            }
        };

        tracing::debug!(volume_id = %req.volume_id, %mode, "Deleting volume");
        self.provisioner(mode)?.delete(req).await
    }

    fn provisioner(&self, mode: ProvisioningMode) -> ProvResult<&Arc<dyn Provisioner>> {
        self.provisioners.get(mode).ok_or_else(|| {
            ProvError::invalid_argument(format!("Provisioning mode {mode} is not supported."))
        })
    }
}

/// Builder for [`Controller`].
pub struct ControllerBuilder {
    config: ControllerConfig,
    cloud: Arc<dyn Cloud>,
    factory: Option<Arc<dyn CloudFactory>>,
    mounter: Arc<dyn Mounter>,
    os: Arc<dyn OsClient>,
    allocator: Arc<GidAllocator>,
}

impl ControllerBuilder {
    /// Allow cross-account requests through `factory`.
    #[must_use]
    pub fn with_cloud_factory(mut self, factory: Arc<dyn CloudFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Replace the host mounter.
    #[must_use]
    pub fn with_mounter(mut self, mounter: Arc<dyn Mounter>) -> Self {
        self.mounter = mounter;
        self
    }

    /// Replace the host filesystem client.
    #[must_use]
    pub fn with_os_client(mut self, os: Arc<dyn OsClient>) -> Self {
        self.os = os;
        self
    }

    /// Share an existing allocator.
    #[must_use]
    pub fn with_allocator(mut self, allocator: Arc<GidAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    /// Build the controller with both provisioning modes registered.
    #[must_use]
    pub fn build(self) -> Controller {
        let mut router = CloudRouter::new(self.cloud);
        if let Some(factory) = self.factory {
            router = router.with_factory(factory);
        }

        let collaborators = Collaborators {
            router,
            allocator: Arc::clone(&self.allocator),
            mounter: self.mounter,
            os: self.os,
            temp_mount_root: self.config.temp_mount_root.clone(),
        };

        let access_point =
            AccessPointProvisioner::new(collaborators.clone(), self.config.parsed_tags())
                .with_root_dir_deletion(self.config.delete_access_point_root_dir);
        let directory = DirectoryProvisioner::new(collaborators)
            .with_dir_deletion(self.config.delete_provisioned_dir);

        tracing::info!(
            delete_access_point_root_dir = self.config.delete_access_point_root_dir,
            delete_provisioned_dir = self.config.delete_provisioned_dir,
            temp_mount_root = %self.config.temp_mount_root.display(),
            "Controller ready"
        );

        Controller::from_provisioners(
            Provisioners::new()
                .with(Arc::new(access_point))
                .with(Arc::new(directory)),
            self.allocator,
        )
    }
}
