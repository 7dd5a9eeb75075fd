//! CLI command definitions.

use blobvault::FileId;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Blobvault - content-addressable blob store administration
#[derive(Parser, Debug)]
#[command(name = "blobvault")]
#[command(about = "Store, fetch and reconcile deduplicated blobs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file layered over the defaults
    #[arg(short, long, global = true, env = "BLOBVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Export spans to stdout through OpenTelemetry (pair with `get --output`)
    #[arg(long, global = true)]
    pub telemetry: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a local file
    Put {
        /// File to upload
        path: PathBuf,

        /// Name to record (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Content type to declare
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },

    /// Download a file by id
    Get {
        /// File id
        id: FileId,

        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove a file reference
    Rm {
        /// File id
        id: FileId,
    },

    /// List file references, newest first
    Ls {
        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Reconcile backend objects against blob records
    Sweep {
        /// Delete objects no blob record points at
        #[arg(long)]
        delete_orphans: bool,

        /// Reclaim blobs left with no references
        #[arg(long)]
        reclaim: bool,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}
