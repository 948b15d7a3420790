//! dir_scanner.rs
//!
//! Local file discovery for the upload, verify and extract workflows.
//!
//! - `list_directory_files`: regular files directly inside a directory (the
//!   upload/verify unit), sorted so batches are reproducible.
//! - `find_html_files`: every `*.html` file below a root, recursively.
//!
//! Both walk with `ignore::WalkBuilder` with the ignore-file filters turned
//! off: a documentation dump is uploaded as-is, hidden files included.

use ignore::{DirEntry, WalkBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("directory '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("walk error: {0}")]
    Walk(#[from] ignore::Error),
}

/// An HTML file found under a scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlEntry {
    pub path: PathBuf,
    /// Path relative to the scan root.
    pub relative: PathBuf,
}

fn ensure_dir(root: &Path) -> Result<(), ScanError> {
    if !root.exists() {
        return Err(ScanError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    Ok(())
}

fn walker(root: &Path, max_depth: Option<usize>) -> ignore::Walk {
    WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .max_depth(max_depth)
        .build()
}

/// Regular file, or a symlink resolving to one.
fn is_file(entry: &DirEntry) -> bool {
    entry.path().is_file()
}

/// Regular files directly inside `root` (not recursive), sorted by path.
pub fn list_directory_files(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    ensure_dir(root)?;

    let mut out = Vec::new();
    for result in walker(root, Some(1)) {
        let entry = result?;
        if entry.depth() == 1 && is_file(&entry) {
            out.push(entry.into_path());
        }
    }
    out.sort();
    Ok(out)
}

/// File names (not paths) of the regular files directly inside `root`.
pub fn list_directory_file_names(root: &Path) -> Result<Vec<String>, ScanError> {
    Ok(list_directory_files(root)?
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .collect())
}

/// Every `*.html` file below `root`, sorted by relative path.
pub fn find_html_files(root: &Path) -> Result<Vec<HtmlEntry>, ScanError> {
    ensure_dir(root)?;

    let mut out = Vec::new();
    for result in walker(root, None) {
        let entry = match result {
            Ok(e) => e,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !is_file(&entry) {
            continue;
        }
        let is_html = entry.path().extension().and_then(|x| x.to_str()) == Some("html");
        if !is_html {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        out.push(HtmlEntry {
            path: entry.into_path(),
            relative,
        });
    }
    out.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(out)
}
