//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stride_common::{HostId, HostIdentity};

/// Stride progress and state sync CLI
#[derive(Parser, Debug)]
#[command(name = "stridectl")]
#[command(about = "Stride - local-first progress and state sync", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Config file (overrides $STRIDE_CONFIG and the XDG default)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Host platform user id; runs as a local guest when absent
    #[arg(long, global = true)]
    pub host_id: Option<String>,

    /// Display name reported by the host platform
    #[arg(long, global = true, default_value = "Player")]
    pub host_name: String,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Host identity hint built from the global flags
    pub fn host_hint(&self) -> Option<HostIdentity> {
        let raw = self.host_id.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let id = match raw.parse::<u64>() {
            Ok(n) => HostId::Numeric(n),
            Err(_) => HostId::from(raw),
        };
        Some(HostIdentity::new(id, &self.host_name))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the resolved identity and profile
    Whoami {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Apply an achievement event (idempotent per event id)
    Award {
        /// Stable event id
        event_id: String,

        /// Experience granted
        #[arg(long, default_value_t = 0)]
        xp: u64,

        /// Coins granted
        #[arg(long, default_value_t = 0)]
        coins: u64,
    },

    /// Read or write a named state slice
    Slice {
        #[command(subcommand)]
        action: SliceCommands,
    },

    /// Replicate pending ledger events now
    Sync,

    /// Show sync health for this session
    Status,
}

#[derive(Subcommand, Debug)]
pub enum SliceCommands {
    /// Print the current value
    Get { key: String },

    /// Replace the value with a JSON document and push it
    Set { key: String, json: String },
}
