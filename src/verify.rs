//! Checks that a vector store holds every file of a local directory, by
//! exact file name.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::client::FileStore;
use crate::ingest::dir_scanner::list_directory_file_names;
use crate::terminal::{progress_bar, say};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DirectoryComparison {
    pub directory: PathBuf,
    pub present: Vec<String>,
    pub missing: Vec<String>,
    /// In the store but not in the directory.
    pub unexpected: Vec<String>,
}

impl DirectoryComparison {
    pub fn checked(&self) -> usize {
        self.present.len() + self.missing.len()
    }

    pub fn all_present(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct VerificationReport {
    pub store_file_count: usize,
    /// Names resolved from the store's file IDs, in listing order.
    pub file_names: Vec<String>,
    pub failed_lookups: usize,
    pub comparison: Option<DirectoryComparison>,
}

impl VerificationReport {
    pub fn success(&self) -> bool {
        !self.file_names.is_empty()
            && self
                .comparison
                .as_ref()
                .is_none_or(DirectoryComparison::all_present)
    }
}

/// Compare the local directory's file names against `store_names`.
pub fn compare_with_directory(
    directory: &Path,
    store_names: &[String],
) -> Result<DirectoryComparison> {
    let local = list_directory_file_names(directory)
        .with_context(|| format!("failed to list {}", directory.display()))?;
    let in_store: BTreeSet<&str> = store_names.iter().map(String::as_str).collect();
    let local_set: BTreeSet<&str> = local.iter().map(String::as_str).collect();

    let (present, missing): (Vec<String>, Vec<String>) =
        local.iter().cloned().partition(|n| in_store.contains(n.as_str()));
    let unexpected = in_store
        .into_iter()
        .filter(|n| !local_set.contains(n))
        .map(str::to_string)
        .collect();

    Ok(DirectoryComparison {
        directory: directory.to_path_buf(),
        present,
        missing,
        unexpected,
    })
}

pub async fn verify_store(
    store: &dyn FileStore,
    store_id: &str,
    directory: Option<&Path>,
) -> Result<VerificationReport> {
    println!("Checking vector store: {store_id}");
    let ids = match store.list_vector_store_file_ids(store_id).await {
        Ok(ids) => ids,
        Err(e) => {
            println!("✗ Could not list files in vector store {store_id}: {e}");
            warn!(store = store_id, error = %e, "listing vector store files failed");
            return Ok(VerificationReport::default());
        }
    };
    if ids.is_empty() {
        println!("No files found in vector store.");
        return Ok(VerificationReport::default());
    }
    println!("Found {} files in vector store.", ids.len());

    let mut report = VerificationReport {
        store_file_count: ids.len(),
        ..VerificationReport::default()
    };
    let pb = progress_bar(ids.len(), "files");
    pb.set_message("resolving file names");
    for id in &ids {
        match store.retrieve_file(id).await {
            Ok(file) => report.file_names.push(file.filename),
            Err(e) => {
                say(&pb, format!("  ✗ Could not get details for file {id}: {e}"));
                report.failed_lookups += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if report.file_names.is_empty() {
        println!("Could not resolve any file names in the vector store.");
        return Ok(report);
    }

    if let Some(dir) = directory {
        report.comparison = Some(compare_with_directory(dir, &report.file_names)?);
    }
    info!(
        store = store_id,
        files = report.store_file_count,
        failed_lookups = report.failed_lookups,
        "verification finished"
    );
    Ok(report)
}

pub fn print_report(report: &VerificationReport) {
    if report.failed_lookups > 0 {
        println!(
            "Warning: could not resolve {} of {} file IDs.",
            report.failed_lookups, report.store_file_count
        );
    }

    let Some(cmp) = &report.comparison else {
        println!("\nFiles in vector store:");
        for (i, name) in report.file_names.iter().enumerate() {
            println!("{:>4}. {name}", i + 1);
        }
        return;
    };

    println!(
        "\nComparing {} local files in {}",
        cmp.checked(),
        cmp.directory.display()
    );
    println!("Present in vector store: {}", cmp.present.len());
    println!("Missing from vector store: {}", cmp.missing.len());
    if cmp.all_present() {
        println!("✓ All files are present in the vector store.");
    } else {
        println!("\nMissing files:");
        for name in &cmp.missing {
            println!("  - {name}");
        }
    }
    if !cmp.unexpected.is_empty() {
        println!(
            "\nIn the vector store but not in the directory ({}):",
            cmp.unexpected.len()
        );
        for name in &cmp.unexpected {
            println!("  - {name}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{FakeStore, file};
    use std::collections::HashSet;
    use std::fs;

    fn store_with(names: &[(&str, &str)]) -> FakeStore {
        let ids: Vec<&str> = names.iter().map(|(id, _)| *id).collect();
        FakeStore::with_files(names.iter().map(|(id, n)| file(id, n)).collect())
            .with_store("vs_docs", &ids)
    }

    #[test]
    fn comparison_splits_present_missing_and_unexpected() {
        let tmp = tempfile::tempdir().unwrap();
        for n in ["a.html", "b.html", "c.html"] {
            fs::write(tmp.path().join(n), n).unwrap();
        }
        let cmp = compare_with_directory(
            tmp.path(),
            &["c.html".into(), "a.html".into(), "z.html".into()],
        )
        .unwrap();

        assert_eq!(cmp.present, vec!["a.html", "c.html"]);
        assert_eq!(cmp.missing, vec!["b.html"]);
        assert_eq!(cmp.unexpected, vec!["z.html"]);
        assert_eq!(cmp.checked(), 3);
        assert!(!cmp.all_present());
    }

    #[tokio::test]
    async fn verifies_directory_fully_present() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.html"), "").unwrap();
        fs::write(tmp.path().join("b.html"), "").unwrap();
        let store = store_with(&[("file-1", "a.html"), ("file-2", "b.html")]);

        let report = verify_store(&store, "vs_docs", Some(tmp.path())).await.unwrap();

        assert!(report.success());
        let cmp = report.comparison.unwrap();
        assert_eq!(cmp.present.len(), 2);
        assert!(cmp.unexpected.is_empty());
    }

    #[tokio::test]
    async fn missing_file_fails_verification() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.html"), "").unwrap();
        fs::write(tmp.path().join("new.html"), "").unwrap();
        let store = store_with(&[("file-1", "a.html")]);

        let report = verify_store(&store, "vs_docs", Some(tmp.path())).await.unwrap();
        assert!(!report.success());
        assert_eq!(report.comparison.unwrap().missing, vec!["new.html"]);
    }

    #[tokio::test]
    async fn without_directory_lists_names() {
        let store = store_with(&[("file-1", "a.html"), ("file-2", "b.html")]);
        let report = verify_store(&store, "vs_docs", None).await.unwrap();
        assert!(report.success());
        assert_eq!(report.file_names, vec!["a.html", "b.html"]);
        assert!(report.comparison.is_none());
    }

    #[tokio::test]
    async fn empty_or_unlistable_store_fails() {
        let empty = FakeStore::default().with_store("vs_docs", &[]);
        assert!(!verify_store(&empty, "vs_docs", None).await.unwrap().success());

        let unknown = FakeStore::default();
        assert!(!verify_store(&unknown, "vs_nope", None).await.unwrap().success());
    }

    #[tokio::test]
    async fn failed_lookups_are_counted() {
        let store = FakeStore {
            fail_retrieve: HashSet::from(["file-2".to_string()]),
            ..store_with(&[("file-1", "a.html"), ("file-2", "b.html")])
        };
        let report = verify_store(&store, "vs_docs", None).await.unwrap();
        assert_eq!(report.failed_lookups, 1);
        assert_eq!(report.file_names, vec!["a.html"]);
    }

    #[tokio::test]
    async fn no_resolved_names_fails() {
        let store = FakeStore {
            fail_retrieve: HashSet::from(["file-1".to_string()]),
            ..store_with(&[("file-1", "a.html")])
        };
        let report = verify_store(&store, "vs_docs", None).await.unwrap();
        assert!(!report.success());
        assert_eq!(report.failed_lookups, 1);
    }
}
