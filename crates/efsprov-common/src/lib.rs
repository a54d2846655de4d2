//! # efsprov-common
//!
//! Shared types for the efsprov volume provisioner.
//!
//! This crate provides the leaf pieces every provisioning path depends on:
//! - The error taxonomy and protocol status codes
//! - Operator tag-string parsing
//! - Volume identifier encoding and decoding
//! - Well-known paths

#![warn(missing_docs)]

pub mod error;
pub mod paths;
pub mod tags;
pub mod volume_id;

pub use error::{ErrorCode, ProvError, ProvResult};
pub use tags::{Tags, parse_tags};
pub use volume_id::{VolumeHandle, VolumeKind};
