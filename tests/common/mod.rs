//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Writes `(relative path, content)` pairs into a fresh temporary corpus.
#[allow(dead_code)]
pub fn create_corpus(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = tempfile::tempdir().unwrap();
    for (relative, content) in files {
        let path = temp_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
    temp_dir
}

/// Corpus with a symmetric pair, an untyped chain and a link to an undefined concept:
///
/// - `call-option <-> put-option` (typed `antonym`)
/// - `call-option -> stock` (untyped)
/// - `stock -> market` (untyped, `market` has no document)
#[allow(dead_code)]
pub fn create_options_corpus() -> TempDir {
    create_corpus(&[
        (
            "finance/call-option.md",
            r#"---
id: call-option
title: Call Option
---

# Call Option

The right to buy a [[stock]] at a fixed price. Opposite of [[put-option]] {rel: antonym}.
"#,
        ),
        (
            "finance/put-option.md",
            r#"---
id: put-option
title: Put Option
---

The right to sell. See [[Call-Option]] {rel: antonym}.
"#,
        ),
        (
            "finance/stock.md",
            r#"---
title: Stock
---

Shares traded on a [[market]].
"#,
        ),
    ])
}

#[allow(dead_code)]
pub fn read_json(path: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[allow(dead_code)]
pub fn index_path(root: &Path) -> PathBuf {
    root.join(".index/links.json")
}
