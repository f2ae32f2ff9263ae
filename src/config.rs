use crate::{error::ConceptLinkError, taxonomy::RelationTaxonomy};
use serde::{Deserialize, Serialize};
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    time::Duration,
};

/// Name of the optional per-corpus configuration file, looked up in the corpus root.
pub const CONFIG_FILE_NAME: &str = ".conceptlink.toml";

/// Default location of the snapshot, relative to the corpus root.
pub const DEFAULT_INDEX_PATH: &str = ".index/links.json";

pub const DEFAULT_DESCRIPTION: &str =
    "Bidirectional concept link index with typed, inferred and reverse adjacency";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// File extension (without dot) of corpus documents.
    pub extension: String,
    /// Directory names whose subtrees are never scanned. Compared case-insensitively.
    pub excluded_dirs: Vec<String>,
    /// Heading texts designating the curated "related concepts" section.
    pub related_headings: Vec<String>,
    /// Relation type assigned to curated links without a `{rel: ...}` suffix.
    pub default_curated_type: String,
    pub description: String,
    pub lock_timeout_secs: u64,
    pub min_free_bytes: u64,
    pub backup_dir: Option<PathBuf>,
    pub backups_enabled: bool,
    pub keep_backups: Option<usize>,
    pub taxonomy: RelationTaxonomy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            extension: "md".to_string(),
            excluded_dirs: ["private", "templates", "template", "index"]
                .into_iter()
                .map(String::from)
                .collect(),
            related_headings: ["related concepts", "related", "see also"]
                .into_iter()
                .map(String::from)
                .collect(),
            default_curated_type: "related".to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            lock_timeout_secs: 30,
            min_free_bytes: 1024 * 1024,
            backup_dir: None,
            backups_enabled: true,
            keep_backups: None,
            taxonomy: RelationTaxonomy::default(),
        }
    }
}

impl IndexConfig {
    pub fn from_toml_str(content: &str) -> Result<IndexConfig, ConceptLinkError> {
        let config: IndexConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<IndexConfig, ConceptLinkError> {
        tracing::debug!("Reading configuration from {:?}", path.as_ref());
        let content = read_to_string(path.as_ref()).map_err(|e| {
            ConceptLinkError::Config(format!("cannot read {:?}: {e}", path.as_ref()))
        })?;
        IndexConfig::from_toml_str(&content)
    }

    /// Loads `explicit` if given, otherwise `<corpus_root>/.conceptlink.toml` when it exists,
    /// otherwise the defaults.
    pub fn discover(
        corpus_root: &Path,
        explicit: Option<&Path>,
    ) -> Result<IndexConfig, ConceptLinkError> {
        if let Some(path) = explicit {
            return IndexConfig::from_file(path);
        }
        let candidate = corpus_root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            IndexConfig::from_file(candidate)
        } else {
            tracing::debug!("No {CONFIG_FILE_NAME} in {corpus_root:?}; using defaults");
            Ok(IndexConfig::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConceptLinkError> {
        if self.extension.trim().is_empty() {
            return Err(ConceptLinkError::Config(
                "extension must not be empty".to_string(),
            ));
        }
        if self.default_curated_type.trim().is_empty() {
            return Err(ConceptLinkError::Config(
                "default_curated_type must not be empty".to_string(),
            ));
        }
        self.taxonomy.validate()
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(name))
    }
}
