//! Volume identifier encoding and decoding.
//!
//! A volume identifier is the only persisted identity of a provisioned
//! volume; the orchestrator stores it and hands it back on delete. Two forms
//! exist:
//!
//! - access point: `<fileSystemId>::<accessPointId>`
//! - directory: `<fileSystemId>:<subPath>` where `subPath` starts with `/`
//!
//! Decoding splits on `:` into at most three tokens
//! `(fileSystemId, subPath, accessPointId)`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProvError, ProvResult};

/// Which provisioning strategy produced a volume identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeKind {
    /// Backed by a remote access point.
    AccessPoint,
    /// Backed by a plain directory.
    Directory,
    /// A bare file system id with no locator.
    FileSystem,
}

/// A decoded volume identifier.
///
/// Fields that do not apply to the form in use are empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeHandle {
    file_system_id: String,
    sub_path: String,
    access_point_id: String,
}

impl VolumeHandle {
    /// Maximum number of `:`-separated tokens in an identifier.
    pub const MAX_TOKENS: usize = 3;

    /// Handle for an access-point-backed volume.
    #[must_use]
    pub fn access_point(
        file_system_id: impl Into<String>,
        access_point_id: impl Into<String>,
    ) -> Self {
        Self {
            file_system_id: file_system_id.into(),
            sub_path: String::new(),
            access_point_id: access_point_id.into(),
        }
    }

    /// Handle for a directory-backed volume.
    ///
    /// A sub path without a leading `/` gets one.
    ///
    /// # Errors
    ///
    /// Returns [`ProvError::InvalidArgument`] when the sub path contains `:`,
    /// which would make the encoded id decode as the access point form.
    pub fn directory(
        file_system_id: impl Into<String>,
        sub_path: impl Into<String>,
    ) -> ProvResult<Self> {
        let sub_path = sub_path.into();
        if sub_path.contains(':') {
            return Err(ProvError::invalid_argument(format!(
                "Directory path {sub_path:?} must not contain ':'"
            )));
        }
        let sub_path = if sub_path.starts_with('/') {
            sub_path
        } else {
            format!("/{sub_path}")
        };
        Ok(Self {
            file_system_id: file_system_id.into(),
            sub_path,
            access_point_id: String::new(),
        })
    }

    /// Decode a volume identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ProvError::InvalidArgument`] when the identifier has more
    /// than three `:`-separated tokens or an empty file system id.
    pub fn parse(volume_id: &str) -> ProvResult<Self> {
        let tokens: Vec<&str> = volume_id.split(':').collect();
        if tokens.len() > Self::MAX_TOKENS {
            return Err(ProvError::invalid_argument(format!(
                "volume ID '{volume_id}' has {} tokens, at most {} allowed",
                tokens.len(),
                Self::MAX_TOKENS
            )));
        }

        let file_system_id = tokens[0];
        if file_system_id.trim().is_empty() {
            return Err(ProvError::invalid_argument(format!(
                "volume ID '{volume_id}' has no file system id"
            )));
        }

        Ok(Self {
            file_system_id: file_system_id.to_string(),
            sub_path: tokens.get(1).copied().unwrap_or_default().to_string(),
            access_point_id: tokens.get(2).copied().unwrap_or_default().to_string(),
        })
    }

    /// The backing file system id.
    #[must_use]
    pub fn file_system_id(&self) -> &str {
        &self.file_system_id
    }

    /// Directory path relative to the file system root, or empty.
    #[must_use]
    pub fn sub_path(&self) -> &str {
        &self.sub_path
    }

    /// Access point id, or empty.
    #[must_use]
    pub fn access_point_id(&self) -> &str {
        &self.access_point_id
    }

    /// Classify the identifier.
    #[must_use]
    pub fn kind(&self) -> VolumeKind {
        if !self.access_point_id.is_empty() {
            VolumeKind::AccessPoint
        } else if !self.sub_path.is_empty() {
            VolumeKind::Directory
        } else {
            VolumeKind::FileSystem
        }
    }
}

impl fmt::Display for VolumeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.access_point_id.is_empty() {
            write!(
                f,
                "{}:{}:{}",
                self.file_system_id, self.sub_path, self.access_point_id
            )
        } else if !self.sub_path.is_empty() {
            write!(f, "{}:{}", self.file_system_id, self.sub_path)
        } else {
            f.write_str(&self.file_system_id)
        }
    }
}

impl FromStr for VolumeHandle {
    type Err = ProvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
