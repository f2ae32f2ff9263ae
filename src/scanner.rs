use crate::{config::IndexConfig, error::ConceptLinkError};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// Recursively lists corpus documents under `root`, sorted by path components.
///
/// Hidden entries and subtrees named in [`IndexConfig::excluded_dirs`] are skipped. Unreadable
/// directory entries are logged and skipped; only a missing or unreadable `root` is an error.
#[tracing::instrument(skip(config))]
pub fn scan_documents(root: &Path, config: &IndexConfig) -> Result<Vec<PathBuf>, ConceptLinkError> {
    if !root.is_dir() {
        return Err(ConceptLinkError::NotFound(format!(
            "corpus root {root:?} is not a directory"
        )));
    }
    let extension = config.extension.trim_start_matches('.');
    let mut sorted_files = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            if is_hidden(e) {
                return false;
            }
            if e.file_type().is_dir() {
                let excluded = e
                    .file_name()
                    .to_str()
                    .map(|name| config.is_excluded_dir(name))
                    .unwrap_or(false);
                return !excluded;
            }
            true
        })
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!("Skipping unreadable corpus entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .collect::<Vec<PathBuf>>();
    sorted_files.sort_by(|a, b| a.components().cmp(b.components()));
    sorted_files.dedup();
    tracing::debug!("Found {} documents under {root:?}", sorted_files.len());
    Ok(sorted_files)
}

/// `path` relative to `root` with `/` separators, as stored in the snapshot.
pub fn relative_file(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "# doc\n").unwrap();
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for rel in [
            "zeta.md",
            "alpha.md",
            "finance/options/call-option.md",
            "finance/stock.md",
            "private/secret.md",
            "Templates/concept.md",
            "index/all.md",
            ".hidden/note.md",
            ".draft.md",
            "notes.txt",
        ] {
            touch(root, rel);
        }

        let files = scan_documents(root, &IndexConfig::default()).unwrap();
        let rel: Vec<String> = files.iter().map(|p| relative_file(root, p)).collect();
        assert_eq!(
            rel,
            vec![
                "alpha.md",
                "finance/options/call-option.md",
                "finance/stock.md",
                "zeta.md",
            ]
        );

        // Deterministic across runs
        assert_eq!(files, scan_documents(root, &IndexConfig::default()).unwrap());
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = scan_documents(&dir.path().join("nope"), &IndexConfig::default());
        assert!(matches!(result, Err(ConceptLinkError::NotFound(_))));
    }
}
