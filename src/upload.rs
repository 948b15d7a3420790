//! upload.rs
//!
//! Bulk upload of a directory into a vector store:
//! - list the regular files directly inside the directory
//! - create the target store, or look up an existing one
//! - upload in sequential batches (the service caps files per request)
//! - keep per-file success/failure counts across partial failures
//!
//! Invariant: once the store is resolved, every listed file ends up counted
//! exactly once, as successful or failed.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::client::FileStore;
use crate::client::types::{BatchStatus, FileBatch, UploadFile, VectorStore};
use crate::ingest::dir_scanner::list_directory_files;
use crate::terminal::{progress_bar, say};

/// Files per `upload_and_poll` call.
pub const DEFAULT_BATCH_SIZE: usize = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    New { name: String },
    Existing { id: String },
}

#[derive(Debug, Default)]
pub struct UploadReport {
    pub vector_store: Option<VectorStore>,
    pub batches: Vec<FileBatch>,
    pub total_files: usize,
    pub successful_uploads: usize,
    pub failed_uploads: usize,
}

impl UploadReport {
    /// Every file uploaded into a resolved store.
    pub fn success(&self) -> bool {
        self.vector_store.is_some() && self.total_files > 0 && self.failed_uploads == 0
    }

    fn all_failed(total_files: usize) -> Self {
        Self {
            total_files,
            failed_uploads: total_files,
            ..Self::default()
        }
    }

    pub fn print_summary(&self) {
        println!("\nFinal Upload Results:");
        if let Some(store) = &self.vector_store {
            println!("Vector store ID: {}", store.id);
        }
        println!("Total batches processed: {}", self.batches.len());
        println!("Successfully uploaded: {} files", self.successful_uploads);
        println!("Failed uploads: {} files", self.failed_uploads);
        println!("Total files processed: {}", self.total_files);
    }
}

pub fn batch_count(total_files: usize, batch_size: usize) -> usize {
    total_files.div_ceil(batch_size)
}

/// Upload every regular file directly inside `dir`.
pub async fn upload_directory(
    store: &dyn FileStore,
    dir: &Path,
    target: &StoreTarget,
    batch_size: usize,
) -> Result<UploadReport> {
    println!("Starting bulk upload from directory: {}", dir.display());
    let paths = list_directory_files(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?;

    if !paths.is_empty() {
        println!("Found {} files to upload:", paths.len());
        for path in &paths {
            println!("  - {}", display_name(path));
        }
    }

    upload_paths(store, &paths, target, batch_size).await
}

pub async fn upload_paths(
    store: &dyn FileStore,
    paths: &[PathBuf],
    target: &StoreTarget,
    batch_size: usize,
) -> Result<UploadReport> {
    if batch_size == 0 {
        bail!("batch size must be at least 1");
    }
    if paths.is_empty() {
        println!("No files found to upload.");
        return Ok(UploadReport::default());
    }
    let total_files = paths.len();

    let vector_store = match resolve_store(store, target).await {
        Some(vs) => vs,
        None => return Ok(UploadReport::all_failed(total_files)),
    };

    let total_batches = batch_count(total_files, batch_size);
    println!(
        "\nUploading {total_files} files in {total_batches} batch(es) of {batch_size} files each..."
    );

    let mut report = UploadReport {
        total_files,
        ..UploadReport::default()
    };

    let pb = progress_bar(total_files, "files");
    for (i, chunk) in paths.chunks(batch_size).enumerate() {
        let batch_num = i + 1;
        say(
            &pb,
            format!(
                "\n--- Processing Batch {batch_num}/{total_batches} ({} files) ---",
                chunk.len()
            ),
        );

        let mut files = Vec::with_capacity(chunk.len());
        for path in chunk {
            match read_upload_file(path).await {
                Ok(f) => files.push(f),
                Err(e) => {
                    say(&pb, format!("  ✗ Error opening file {}: {e}", display_name(path)));
                    report.failed_uploads += 1;
                    pb.inc(1);
                }
            }
        }

        if files.is_empty() {
            say(
                &pb,
                format!("  ! No files could be opened for batch {batch_num}, skipping..."),
            );
            continue;
        }

        let n = files.len();
        say(&pb, format!("  Uploading {n} files to vector store..."));
        match store.upload_and_poll(&vector_store.id, files).await {
            Ok(batch) if matches!(batch.status, BatchStatus::Failed | BatchStatus::Cancelled) => {
                say(
                    &pb,
                    format!(
                        "  ✗ Batch {batch_num} ended with status {} ({})",
                        batch.status, batch.file_counts
                    ),
                );
                warn!(batch = %batch.id, status = %batch.status, "file batch did not complete");
                report.failed_uploads += n;
            }
            Ok(batch) => {
                say(&pb, format!("  ✓ Batch {batch_num} Status: {}", batch.status));
                say(
                    &pb,
                    format!("  ✓ Batch {batch_num} File counts: {}", batch.file_counts),
                );
                report.successful_uploads += n;
                report.batches.push(batch);
            }
            Err(e) => {
                say(&pb, format!("  ✗ Error during batch {batch_num} upload: {e}"));
                warn!(batch = batch_num, error = %e, "file batch upload failed");
                report.failed_uploads += n;
            }
        }
        pb.inc(n as u64);
    }
    pb.finish_and_clear();

    info!(
        store = %vector_store.id,
        successful = report.successful_uploads,
        failed = report.failed_uploads,
        "upload finished"
    );
    report.vector_store = Some(vector_store);
    Ok(report)
}

/// Create or look up the target store; `None` when that fails.
async fn resolve_store(store: &dyn FileStore, target: &StoreTarget) -> Option<VectorStore> {
    match target {
        StoreTarget::Existing { id } => {
            println!("\nUsing existing vector store with ID: {id}");
            match store.retrieve_vector_store(id).await {
                Ok(vs) => {
                    println!("✓ Vector store retrieved: {} (ID: {})", vs.display_name(), vs.id);
                    Some(vs)
                }
                Err(e) => {
                    println!("✗ Error retrieving vector store with ID {id}: {e}");
                    None
                }
            }
        }
        StoreTarget::New { name } => {
            println!("\nCreating vector store: '{name}'");
            match store.create_vector_store(name).await {
                Ok(vs) => {
                    println!("✓ Vector store created with ID: {}", vs.id);
                    Some(vs)
                }
                Err(e) => {
                    println!("✗ Error creating vector store '{name}': {e}");
                    None
                }
            }
        }
    }
}

async fn read_upload_file(path: &Path) -> io::Result<UploadFile> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let bytes = tokio::fs::read(path).await?;
    Ok(UploadFile { file_name, bytes })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
