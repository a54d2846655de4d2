//! Operator CLI definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use efsprov_common::{Tags, VolumeHandle, VolumeKind, parse_tags};
use serde::Serialize;

use crate::config::ControllerConfig;

/// efsprov - access point and directory volume provisioning
#[derive(Parser)]
#[command(name = "efsprov")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Inspection commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Parse an operator tag string and print the resulting tags
    Tags {
        /// Space-separated key:value pairs, values optionally single-quoted
        raw: String,
    },

    /// Decode a volume identifier
    VolumeId {
        /// Identifier as returned by a create call
        id: String,
    },

    /// Load and validate a controller config file
    Config {
        /// Path to a TOML config file
        path: PathBuf,
    },
}

#[derive(Serialize)]
struct VolumeIdReport<'a> {
    kind: VolumeKind,
    file_system_id: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    sub_path: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    access_point_id: &'a str,
}

#[derive(Serialize)]
struct ConfigReport<'a> {
    #[serde(flatten)]
    config: &'a ControllerConfig,
    parsed_tags: Tags,
}

impl Cli {
    /// The log directive matching the `--debug` flag.
    #[must_use]
    pub const fn log_directive(&self) -> &'static str {
        if self.debug { "efsprov=debug" } else { "efsprov=info" }
    }

    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let json = match self.command {
            Commands::Tags { raw } => serde_json::to_string_pretty(&parse_tags(&raw))?,

            Commands::VolumeId { id } => {
                let handle = VolumeHandle::parse(&id)
                    .map_err(|e| color_eyre::eyre::eyre!("Failed to decode volume id: {}", e))?;
                serde_json::to_string_pretty(&VolumeIdReport {
                    kind: handle.kind(),
                    file_system_id: handle.file_system_id(),
                    sub_path: handle.sub_path(),
                    access_point_id: handle.access_point_id(),
                })?
            }

            Commands::Config { path } => {
                let config = ControllerConfig::from_file(&path)
                    .map_err(|e| color_eyre::eyre::eyre!("Invalid config: {}", e))?;
                tracing::info!(path = %path.display(), "Config is valid");
                serde_json::to_string_pretty(&ConfigReport {
                    parsed_tags: config.parsed_tags(),
                    config: &config,
                })?
            }
        };

        println!("{json}");
        Ok(())
    }
}
