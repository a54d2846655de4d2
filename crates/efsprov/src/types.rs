//! Request and response types exchanged with the protocol layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Request parameter: provisioning strategy (`efs-ap` or `efs-dir`).
pub const PROVISIONING_MODE: &str = "provisioningMode";
/// Request parameter: backing file system id.
pub const FS_ID: &str = "fileSystemId";
/// Request parameter: owner uid.
pub const UID: &str = "uid";
/// Request parameter: owner gid.
pub const GID: &str = "gid";
/// Request parameter: lower bound of the allocatable identity range.
pub const GID_MIN: &str = "gidRangeStart";
/// Request parameter: upper bound of the allocatable identity range.
pub const GID_MAX: &str = "gidRangeEnd";
/// Request parameter: octal permission bits for the created directory.
pub const DIRECTORY_PERMS: &str = "directoryPerms";
/// Request parameter: parent path for created directories.
pub const BASE_PATH: &str = "basePath";
/// Request parameter: availability zone hint for mount target lookup.
pub const AZ_NAME: &str = "az";

/// Secret: role to assume for cross-account access.
pub const ROLE_ARN: &str = "awsRoleArn";

/// Volume context key carrying a resolved mount target address.
pub const MOUNT_TARGET_IP: &str = "mounttargetip";

/// Request to create a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    /// Volume name chosen by the orchestrator.
    pub name: String,
    /// Requested capacity in bytes. Only echoed back.
    pub capacity_bytes: u64,
    /// Storage-class parameters.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// Operation secrets.
    #[serde(default, skip_serializing)]
    pub secrets: HashMap<String, String>,
}

impl CreateVolumeRequest {
    /// Create a request with a name and capacity.
    pub fn new(name: impl Into<String>, capacity_bytes: u64) -> Self {
        Self {
            name: name.into(),
            capacity_bytes,
            ..Self::default()
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: &str, value: impl Into<String>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Add a secret.
    #[must_use]
    pub fn with_secret(mut self, key: &str, value: impl Into<String>) -> Self {
        self.secrets.insert(key.to_string(), value.into());
        self
    }

    /// Look up a parameter.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

/// Request to delete a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteVolumeRequest {
    /// Identifier returned by a previous create.
    pub volume_id: String,
    /// Operation secrets.
    #[serde(default, skip_serializing)]
    pub secrets: HashMap<String, String>,
}

impl DeleteVolumeRequest {
    /// Create a delete request for a volume id.
    pub fn new(volume_id: impl Into<String>) -> Self {
        Self {
            volume_id: volume_id.into(),
            secrets: HashMap::new(),
        }
    }

    /// Add a secret.
    #[must_use]
    pub fn with_secret(mut self, key: &str, value: impl Into<String>) -> Self {
        self.secrets.insert(key.to_string(), value.into());
        self
    }
}

/// A provisioned volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Encoded volume identifier.
    pub volume_id: String,
    /// Capacity echoed from the request.
    pub capacity_bytes: u64,
    /// Connection hints for the node.
    #[serde(default)]
    pub volume_context: HashMap<String, String>,
}
