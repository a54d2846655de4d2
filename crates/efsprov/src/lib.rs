//! # efsprov
//!
//! Controller-side volume provisioning for a shared network file system.
//!
//! ## Features
//!
//! - **Access point volumes**: one remote access point per volume, tagged
//!   and owned by an allocated POSIX identity
//! - **Directory volumes**: one directory per volume, created through a
//!   short-lived root mount
//! - **Identity allocation**: lowest-free-first ledgers per file system
//! - **Cross-account access**: role-scoped clients and mount target hints
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use efsprov::cloud::Cloud;
//! use efsprov::config::ControllerConfig;
//! use efsprov::controller::Controller;
//! use efsprov::types::{CreateVolumeRequest, FS_ID, PROVISIONING_MODE};
//!
//! # async fn example(cloud: Arc<dyn Cloud>) -> efsprov_common::ProvResult<()> {
//! let controller = Controller::builder(ControllerConfig::default(), cloud).build();
//!
//! let request = CreateVolumeRequest::new("pvc-1234", 5 << 30)
//!     .with_parameter(PROVISIONING_MODE, "efs-ap")
//!     .with_parameter(FS_ID, "fs-abcd1234");
//!
//! let volume = controller.create_volume(&request).await?;
//! println!("{}", volume.volume_id);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cli;
pub mod cloud;
pub mod config;
pub mod controller;
pub mod filesystem;
pub mod identity;
pub mod params;
pub mod provisioner;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::ControllerConfig;
pub use controller::{Controller, ControllerBuilder};
pub use identity::GidAllocator;
pub use provisioner::{Provisioner, ProvisioningMode};
