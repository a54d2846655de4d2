//! Strategy selection.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use efsprov_common::ProvError;
use serde::{Deserialize, Serialize};

use super::Provisioner;

/// Provisioning strategy named by the `provisioningMode` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisioningMode {
    /// One remote access point per volume.
    #[serde(rename = "efs-ap")]
    AccessPoint,
    /// One directory per volume.
    #[serde(rename = "efs-dir")]
    Directory,
}

impl ProvisioningMode {
    /// Every supported mode.
    pub const ALL: [Self; 2] = [Self::AccessPoint, Self::Directory];

    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessPoint => "efs-ap",
            Self::Directory => "efs-dir",
        }
    }
}

impl fmt::Display for ProvisioningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisioningMode {
    type Err = ProvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                ProvError::invalid_argument(format!("Provisioning mode {s} is not supported."))
            })
    }
}

/// Provisioners keyed by the mode they serve.
#[derive(Clone, Default)]
pub struct Provisioners {
    by_mode: HashMap<ProvisioningMode, Arc<dyn Provisioner>>,
}

impl Provisioners {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provisioner under its own mode, replacing any previous one.
    #[must_use]
    pub fn with(mut self, provisioner: Arc<dyn Provisioner>) -> Self {
        self.by_mode.insert(provisioner.mode(), provisioner);
        self
    }

    /// The provisioner for `mode`.
    #[must_use]
    pub fn get(&self, mode: ProvisioningMode) -> Option<&Arc<dyn Provisioner>> {
        self.by_mode.get(&mode)
    }

    /// Registered modes, in declaration order.
    #[must_use]
    pub fn modes(&self) -> Vec<ProvisioningMode> {
        ProvisioningMode::ALL
            .into_iter()
            .filter(|mode| self.by_mode.contains_key(mode))
            .collect()
    }
}
