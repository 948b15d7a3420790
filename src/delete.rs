//! Bulk deletion of every data file on the service. Failures are counted
//! and the run continues with the next file.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::client::FileStore;
use crate::terminal::{progress_bar, say};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: usize,
    pub failed: usize,
    pub total: usize,
}

impl DeleteReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn print_summary(&self) {
        println!("\nDeletion Summary:");
        println!("Successfully deleted: {} files", self.deleted);
        println!("Failed to delete: {} files", self.failed);
        println!("Total files processed: {}", self.total);
    }
}

pub async fn delete_all_files(store: &dyn FileStore) -> Result<DeleteReport> {
    println!("Retrieving all files from the service...");
    let files = store.list_files().await.context("failed to list files")?;

    if files.is_empty() {
        println!("No files found to delete.");
        return Ok(DeleteReport::default());
    }
    println!("Found {} files to delete.\n", files.len());

    let mut report = DeleteReport {
        total: files.len(),
        ..DeleteReport::default()
    };
    let pb = progress_bar(files.len(), "files");
    for file in &files {
        let created = file
            .created()
            .map(|t| format!(", created {}", t.format("%Y-%m-%d %H:%M")))
            .unwrap_or_default();
        say(
            &pb,
            format!("Deleting file: '{}' (ID: {}{created})", file.filename, file.id),
        );
        match store.delete_file(&file.id).await {
            Ok(()) => {
                say(
                    &pb,
                    format!("✓ Successfully deleted: '{}' (ID: {})", file.filename, file.id),
                );
                report.deleted += 1;
            }
            Err(e) => {
                say(
                    &pb,
                    format!(
                        "✗ Failed to delete: '{}' (ID: {}) - Error: {e}",
                        file.filename, file.id
                    ),
                );
                warn!(file = %file.id, error = %e, "delete failed");
                report.failed += 1;
            }
        }
        say(&pb, "-".repeat(50));
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(deleted = report.deleted, failed = report.failed, "deletion finished");
    Ok(report)
}
