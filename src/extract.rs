//! Collects the HTML pages of a documentation tree into one flat directory,
//! encoding each page's relative path into its file name so that a plain
//! directory upload keeps pages with the same name apart.

use std::fs;
use std::io;
use std::path::{Component, Path};

use anyhow::{Context, Result};
use filetime::FileTime;
use tracing::{debug, info};

use crate::ingest::dir_scanner::find_html_files;
use crate::terminal::{progress_bar, say};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub copied: usize,
    pub skipped: usize,
}

impl ExtractReport {
    pub fn total(&self) -> usize {
        self.copied + self.skipped
    }

    pub fn print_summary(&self, dest: &Path) {
        println!("\nExtraction complete!");
        println!("Files copied: {}", self.copied);
        println!("Files skipped: {}", self.skipped);
        println!("Total files processed: {}", self.total());
        println!("Destination: {}", dest.display());
    }
}

/// `guides/setup/index.html` becomes `guides.setup.index.html`.
pub fn flattened_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Copy keeping the source modification time.
fn copy_preserving_mtime(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    let meta = fs::metadata(from)?;
    filetime::set_file_mtime(to, FileTime::from_last_modification_time(&meta))
}

pub fn extract_and_rename(source: &Path, dest: &Path) -> Result<ExtractReport> {
    let entries = find_html_files(source)
        .with_context(|| format!("failed to search {}", source.display()))?;
    fs::create_dir_all(dest).with_context(|| format!("failed to create {}", dest.display()))?;

    println!("Found {} HTML files under {}", entries.len(), source.display());

    let mut report = ExtractReport::default();
    let pb = progress_bar(entries.len(), "files");
    for entry in &entries {
        let name = flattened_name(&entry.relative);
        let target = dest.join(&name);
        pb.inc(1);

        if target.exists() {
            say(&pb, format!("Skipping (exists): {name}"));
            report.skipped += 1;
            continue;
        }
        match copy_preserving_mtime(&entry.path, &target) {
            Ok(()) => {
                debug!(from = %entry.relative.display(), to = %name, "copied");
                say(&pb, format!("Copied: {} -> {name}", entry.relative.display()));
                report.copied += 1;
            }
            Err(e) => {
                say(
                    &pb,
                    format!("Error copying {}: {e}", entry.path.display()),
                );
                report.skipped += 1;
            }
        }
    }
    pb.finish_and_clear();

    info!(copied = report.copied, skipped = report.skipped, "extraction finished");
    Ok(report)
}
