//! Sweep command handler.

use super::commands::OutputFormat;
use blobvault::{JsonError, SweepOptions, Vault, VaultResult};

/// Run one reconciliation pass and print the report.
pub async fn run_sweep(
    vault: &Vault,
    options: SweepOptions,
    format: OutputFormat,
) -> VaultResult<()> {
    let report = vault.engine().sweep(options).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| JsonError::new("sweep report", e))?;
            println!("{}", json);
        }
        OutputFormat::Human => {
            println!(
                "Scanned {} objects and {} blob records",
                report.objects_scanned, report.blobs_scanned
            );
            println!(
                "Orphans: {} found, {} deleted",
                report.orphans.len(),
                report.orphans_deleted
            );
            for orphan in &report.orphans {
                println!("  {}", orphan);
            }
            println!(
                "Retired blobs: {} found, {} reclaimed",
                report.retired.len(),
                report.reclaimed
            );
            for hash in &report.missing_objects {
                println!("Missing object for live blob {}", hash);
            }
            for failure in &report.failures {
                println!("Failed: {}", failure);
            }
            if report.is_clean() {
                println!("Store is consistent");
            }
        }
    }

    Ok(())
}
