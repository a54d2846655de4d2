//! Remote storage service interface.
//!
//! The provisioners never talk to the storage service directly; they go
//! through [`Cloud`], and through [`CloudFactory`] when a request asks for a
//! cross-account role. [`CloudRouter`] picks between the two.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use efsprov_common::{ProvError, ProvResult, Tags};
use thiserror::Error;

use crate::types::ROLE_ARN;

/// Errors returned by the remote storage service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    /// The resource does not exist.
    #[error("resource not found")]
    NotFound,
    /// The caller lacks permission.
    #[error("access denied")]
    AccessDenied,
    /// The resource already exists.
    #[error("resource already exists")]
    AlreadyExists,
    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

/// A backing file system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSystem {
    /// File system id.
    pub file_system_id: String,
}

/// A remote access point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPoint {
    /// Access point id.
    pub access_point_id: String,
    /// File system the access point belongs to.
    pub file_system_id: String,
    /// Root directory of the access point, relative to the file system root.
    pub root_dir: String,
    /// POSIX uid enforced for clients of the access point.
    pub uid: u32,
    /// POSIX gid enforced for clients of the access point.
    pub gid: u32,
}

/// A network endpoint of a file system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountTarget {
    /// Availability zone of the mount target.
    pub az: String,
    /// Mount target id.
    pub mount_target_id: String,
    /// Address to mount through.
    pub ip_address: String,
}

/// Options for creating an access point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPointOptions {
    /// Requested capacity, informational only.
    pub capacity_bytes: u64,
    /// File system to create the access point in.
    pub file_system_id: String,
    /// Owner uid of the root directory.
    pub uid: u32,
    /// Owner gid of the root directory.
    pub gid: u32,
    /// Octal permission string for the root directory, if requested.
    pub directory_perms: Option<String>,
    /// Root directory path.
    pub directory_path: String,
    /// Tags for the access point.
    pub tags: Tags,
}

/// Operations the provisioners need from the storage service.
#[async_trait]
pub trait Cloud: Send + Sync {
    /// Look up a file system.
    async fn describe_file_system(&self, file_system_id: &str) -> Result<FileSystem, CloudError>;

    /// Create an access point.
    async fn create_access_point(
        &self,
        name: &str,
        options: &AccessPointOptions,
    ) -> Result<AccessPoint, CloudError>;

    /// Look up an access point.
    async fn describe_access_point(&self, access_point_id: &str)
    -> Result<AccessPoint, CloudError>;

    /// Delete an access point.
    async fn delete_access_point(&self, access_point_id: &str) -> Result<(), CloudError>;

    /// Pick a mount target, preferring the given availability zone when not
    /// empty.
    async fn describe_mount_targets(
        &self,
        file_system_id: &str,
        az: &str,
    ) -> Result<MountTarget, CloudError>;
}

/// Builds clients scoped to an assumed role.
pub trait CloudFactory: Send + Sync {
    /// Create a client acting as `role_arn`.
    ///
    /// # Errors
    ///
    /// Returns an error when the role cannot be assumed.
    fn with_role(&self, role_arn: &str) -> Result<Arc<dyn Cloud>, CloudError>;
}

/// The client chosen for one request.
#[derive(Clone)]
pub struct ScopedCloud {
    /// Client to use.
    pub cloud: Arc<dyn Cloud>,
    /// Role that was assumed, if any.
    pub role_arn: Option<String>,
}

impl ScopedCloud {
    /// Whether this request routes through another account.
    #[must_use]
    pub const fn is_cross_account(&self) -> bool {
        self.role_arn.is_some()
    }
}

/// Chooses between the ambient client and a role-scoped one.
#[derive(Clone)]
pub struct CloudRouter {
    ambient: Arc<dyn Cloud>,
    factory: Option<Arc<dyn CloudFactory>>,
}

impl CloudRouter {
    /// Route everything through `ambient`; role secrets are rejected.
    pub fn new(ambient: Arc<dyn Cloud>) -> Self {
        Self {
            ambient,
            factory: None,
        }
    }

    /// Allow role-scoped clients built by `factory`.
    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn CloudFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Resolve the client for a request's secrets.
    ///
    /// # Errors
    ///
    /// Returns [`ProvError::Unauthenticated`] when a role is requested but
    /// cannot be assumed.
    pub fn resolve(&self, secrets: &HashMap<String, String>) -> ProvResult<ScopedCloud> {
        let role_arn = secrets
            .get(ROLE_ARN)
            .map(String::as_str)
            .filter(|r| !r.is_empty());

        let Some(role_arn) = role_arn else {
            return Ok(ScopedCloud {
                cloud: Arc::clone(&self.ambient),
                role_arn: None,
            });
        };

        let factory = self.factory.as_ref().ok_or_else(|| {
            ProvError::unauthenticated(format!(
                "Unable to initialize cloud client for role {role_arn}: cross-account access is not configured"
            ))
        })?;

        let cloud = factory.with_role(role_arn).map_err(|e| {
            ProvError::unauthenticated(format!(
                "Unable to initialize cloud client: {e}. Please verify role has the correct permissions for cross account mount"
            ))
        })?;

        tracing::debug!(role_arn, "Using role-scoped cloud client");
        Ok(ScopedCloud {
            cloud,
            role_arn: Some(role_arn.to_string()),
        })
    }
}

/// Map a describe-file-system failure onto the error taxonomy.
pub(crate) fn describe_file_system_error(file_system_id: &str, err: &CloudError) -> ProvError {
    match err {
        CloudError::AccessDenied => ProvError::unauthenticated(format!(
            "Access Denied. Please ensure you have the right permissions: {err}"
        )),
        CloudError::NotFound => ProvError::invalid_argument(format!(
            "File System {file_system_id} does not exist: {err}"
        )),
        _ => ProvError::internal(format!(
            "Failed to fetch File System {file_system_id} info: {err}"
        )),
    }
}
