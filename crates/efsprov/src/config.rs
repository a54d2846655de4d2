//! Controller configuration.

use std::path::{Path, PathBuf};

use efsprov_common::paths::TEMP_MOUNT_ROOT;
use efsprov_common::{ProvError, ProvResult, Tags, parse_tags};
use serde::{Deserialize, Serialize};

/// Controller configuration options.
///
/// Every field is optional in the TOML form:
///
/// ```toml
/// tags = "team:storage env:'prod east'"
/// delete_access_point_root_dir = true
/// delete_provisioned_dir = false
/// temp_mount_root = "/var/lib/csi/pv"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Raw operator tag string applied to created access points.
    pub tags: String,
    /// Remove an access point's root directory when deleting it.
    pub delete_access_point_root_dir: bool,
    /// Remove a directory volume's directory when deleting it.
    pub delete_provisioned_dir: bool,
    /// Directory holding temporary root mounts.
    pub temp_mount_root: PathBuf,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tags: String::new(),
            delete_access_point_root_dir: false,
            delete_provisioned_dir: false,
            temp_mount_root: TEMP_MOUNT_ROOT.clone(),
        }
    }
}

impl ControllerConfig {
    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ProvError::Config`] if the file cannot be read, parsed or
    /// validated.
    pub fn from_file(path: impl AsRef<Path>) -> ProvResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ProvError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        tracing::debug!(path = %path.display(), "Loaded controller config");
        Self::from_toml(&content)
    }

    /// Parse and validate TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ProvError::Config`] on malformed TOML, unknown keys or a
    /// relative `temp_mount_root`.
    pub fn from_toml(content: &str) -> ProvResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ProvError::Config {
            message: format!("Failed to parse TOML: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ProvError::Internal`] if serialization fails.
    pub fn to_toml(&self) -> ProvResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ProvError::internal(format!("Failed to serialize to TOML: {e}")))
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ProvError::Config`] when `temp_mount_root` is relative.
    pub fn validate(&self) -> ProvResult<()> {
        if !self.temp_mount_root.is_absolute() {
            return Err(ProvError::Config {
                message: format!(
                    "temp_mount_root must be absolute, got {}",
                    self.temp_mount_root.display()
                ),
            });
        }
        Ok(())
    }

    /// The tag string parsed into a map.
    #[must_use]
    pub fn parsed_tags(&self) -> Tags {
        parse_tags(&self.tags)
    }

    /// Set the operator tag string.
    #[must_use]
    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Enable access point root directory removal.
    #[must_use]
    pub fn with_access_point_root_dir_deletion(mut self) -> Self {
        self.delete_access_point_root_dir = true;
        self
    }

    /// Enable directory volume removal.
    #[must_use]
    pub fn with_provisioned_dir_deletion(mut self) -> Self {
        self.delete_provisioned_dir = true;
        self
    }

    /// Set the temporary mount root.
    #[must_use]
    pub fn with_temp_mount_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_mount_root = root.into();
        self
    }
}
