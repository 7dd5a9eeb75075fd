//! Blobvault CLI binary.
//!
//! This binary provides command-line access to a configured vault:
//! - Upload, download and remove files
//! - List file references
//! - Sweep orphaned objects and retired blobs

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use blobvault::{SweepOptions, Vault};
    use cli::{Cli, Commands, get_file, list_files, put_file, remove_file, run_sweep};

    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing
    if cli.telemetry {
        blobvault::init_telemetry("blobvault")?;
    } else {
        let log_level = if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let vault = Vault::open(cli.config.as_deref()).await?;

    // Execute the requested command
    let result = match cli.command {
        Commands::Put {
            path,
            name,
            content_type,
        } => put_file(&vault, &path, name, content_type).await,

        Commands::Get { id, output } => get_file(&vault, &id, output.as_deref()).await,

        Commands::Rm { id } => remove_file(&vault, &id).await,

        Commands::Ls { format } => list_files(&vault, format).await,

        Commands::Sweep {
            delete_orphans,
            reclaim,
            format,
        } => {
            let options = SweepOptions {
                delete_orphans,
                reclaim_retired: reclaim,
            };
            run_sweep(&vault, options, format).await
        }
    };

    if cli.telemetry {
        blobvault::shutdown_telemetry();
    }

    result?;
    Ok(())
}
