//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the blobvault binary.

mod commands;
mod files;
mod sweep;

pub use commands::{Cli, Commands, OutputFormat};
pub use files::{get_file, list_files, put_file, remove_file};
pub use sweep::run_sweep;
