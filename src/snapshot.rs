//! On-disk JSON snapshot of a [`ConceptGraph`].
//!
//! Every write happens while holding a [`SnapshotLock`]: an exclusive advisory lock on a sibling
//! `<file>.lock`, acquired with a bounded wait and released when the guard drops. Under the lock
//! a write checks free space, copies the previous snapshot into the backup directory, writes the
//! new content to a temporary file in the target directory and renames it over the target.

use crate::{
    config::IndexConfig,
    error::ConceptLinkError,
    graph::{ConceptGraph, ConceptNode, InferredLink, TypedBacklink},
    links::TypedLink,
};
use chrono::{SecondsFormat, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};
use tempfile::NamedTempFile;

pub const SNAPSHOT_VERSION: &str = "2.0";

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Adjacency of one concept as stored in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeLinks {
    pub links_to: Vec<String>,
    pub linked_from: Vec<String>,
    pub typed_links_to: Vec<TypedLink>,
    pub typed_linked_from: Vec<TypedBacklink>,
    pub inferred_links_to: Vec<InferredLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptMeta {
    pub title: String,
    pub file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotMetadata {
    /// RFC 3339, UTC.
    pub last_updated: String,
    pub total_concepts: usize,
    pub total_links: usize,
    pub broken_links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub links: BTreeMap<String, NodeLinks>,
    pub concepts: BTreeMap<String, ConceptMeta>,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

impl Snapshot {
    pub fn from_graph<D: Into<String>>(graph: &ConceptGraph, description: D) -> Self {
        let mut links = BTreeMap::new();
        let mut concepts = BTreeMap::new();
        for (id, node) in graph.nodes.iter() {
            links.insert(
                id.clone(),
                NodeLinks {
                    links_to: node.links_to.clone(),
                    linked_from: node.linked_from.clone(),
                    typed_links_to: node.typed_links_to.clone(),
                    typed_linked_from: node.typed_linked_from.clone(),
                    inferred_links_to: node.inferred_links_to.clone(),
                },
            );
            concepts.insert(
                id.clone(),
                ConceptMeta {
                    title: node.title.clone(),
                    file: node.file.clone(),
                },
            );
        }
        Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            description: description.into(),
            links,
            concepts,
            metadata: SnapshotMetadata {
                last_updated: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                total_concepts: graph.len(),
                total_links: graph.total_links(),
                broken_links: graph.broken_links.iter().cloned().collect(),
            },
        }
    }

    /// Rebuilds a graph from the forward edges. Reverse views, broken links and inferred links
    /// are recomputed rather than trusted.
    pub fn to_graph(&self) -> ConceptGraph {
        let mut graph = ConceptGraph::new();
        let ids = self.concepts.keys().chain(self.links.keys());
        for id in ids {
            if graph.contains(id) {
                continue;
            }
            let meta = self.concepts.get(id).cloned().unwrap_or_default();
            let mut node = ConceptNode::new(id.clone(), meta.title, meta.file);
            if let Some(adjacency) = self.links.get(id) {
                node.links_to = adjacency.links_to.clone();
                node.typed_links_to = adjacency.typed_links_to.clone();
            }
            graph.insert_node(node);
        }
        graph.link_backrefs();
        graph.infer_two_hop();
        graph
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, ConceptLinkError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(content: &str) -> Result<Snapshot, ConceptLinkError> {
        let snapshot: Snapshot = serde_json::from_str(content)
            .map_err(|e| ConceptLinkError::CorruptSnapshot(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                "Snapshot version {} differs from {SNAPSHOT_VERSION}; reading it anyway",
                snapshot.version
            );
        }
        Ok(snapshot)
    }
}

/// What a successful [`SnapshotLock::write`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    pub backup: Option<PathBuf>,
    pub pruned_backups: usize,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    pub path: PathBuf,
    /// Defaults to `<snapshot dir>/backups`.
    pub backup_dir: Option<PathBuf>,
    pub backups_enabled: bool,
    pub keep_backups: Option<usize>,
    pub lock_timeout: Duration,
    pub min_free_bytes: u64,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        SnapshotStore::from_config(path, &IndexConfig::default())
    }

    pub fn from_config<P: AsRef<Path>>(path: P, config: &IndexConfig) -> Self {
        SnapshotStore {
            path: path.as_ref().to_path_buf(),
            backup_dir: config.backup_dir.clone(),
            backups_enabled: config.backups_enabled,
            keep_backups: config.keep_backups,
            lock_timeout: config.lock_timeout(),
            min_free_bytes: config.min_free_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.parent_dir().join(name)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.parent_dir().join("backups"))
    }

    fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "snapshot".to_string())
    }

    /// Blocks until the exclusive lock is held or `lock_timeout` has elapsed.
    pub fn lock(&self) -> Result<SnapshotLock<'_>, ConceptLinkError> {
        self.lock_interruptible(&AtomicBool::new(false))
    }

    /// Like [`SnapshotStore::lock`], but gives up with [`ConceptLinkError::Interrupted`] as soon
    /// as `interrupt` is set while the lock is contended.
    #[tracing::instrument(skip_all, fields(path = %self.path.display()))]
    pub fn lock_interruptible(
        &self,
        interrupt: &AtomicBool,
    ) -> Result<SnapshotLock<'_>, ConceptLinkError> {
        fs::create_dir_all(self.parent_dir())?;
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;

        let started = Instant::now();
        let mut announced = false;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => break,
                Err(e) if is_contended(&e) => {
                    if interrupt.load(Ordering::SeqCst) {
                        tracing::warn!("Interrupted while waiting for {lock_path:?}");
                        return Err(ConceptLinkError::Interrupted);
                    }
                    let waited = started.elapsed();
                    if waited >= self.lock_timeout {
                        tracing::error!("Gave up waiting for {lock_path:?} after {waited:?}");
                        return Err(ConceptLinkError::LockTimeout {
                            path: lock_path.display().to_string(),
                            waited,
                        });
                    }
                    if !announced {
                        tracing::warn!("{lock_path:?} is held by another process; waiting");
                        announced = true;
                    }
                    thread::sleep(LOCK_POLL_INTERVAL.min(self.lock_timeout - waited));
                }
                Err(e) => return Err(e.into()),
            }
        }
        tracing::debug!("Acquired {lock_path:?}");
        Ok(SnapshotLock { store: self, file })
    }

    fn backup_files(&self) -> Result<Vec<PathBuf>, ConceptLinkError> {
        let dir = self.backup_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let prefix = format!("{}.", self.file_stem());
        let mut backups: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(&prefix) && n.ends_with(".json"))
                    .unwrap_or(false)
            })
            .collect();
        // Timestamps sort lexicographically
        backups.sort();
        Ok(backups)
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Proof of holding the snapshot lock. Reads and writes go through the guard.
#[derive(Debug)]
pub struct SnapshotLock<'a> {
    store: &'a SnapshotStore,
    file: File,
}

impl SnapshotLock<'_> {
    pub fn store(&self) -> &SnapshotStore {
        self.store
    }

    pub fn read(&self) -> Result<Snapshot, ConceptLinkError> {
        let content = fs::read_to_string(&self.store.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                ConceptLinkError::NotFound(format!("no snapshot at {:?}", self.store.path))
            }
            io::ErrorKind::InvalidData => ConceptLinkError::CorruptSnapshot(format!(
                "{:?} is not valid UTF-8",
                self.store.path
            )),
            _ => ConceptLinkError::from(e),
        })?;
        Snapshot::from_json(&content)
    }

    /// Fails with [`ConceptLinkError::DiskSpace`] before touching anything when the target
    /// volume cannot hold the new snapshot plus a backup with `min_free_bytes` to spare.
    pub fn check_disk_space(&self, size: u64) -> Result<(), ConceptLinkError> {
        let dir = self.store.parent_dir();
        let available = fs2::available_space(&dir)?;
        let required = self.store.min_free_bytes.saturating_add(size.saturating_mul(2));
        if available < required {
            return Err(ConceptLinkError::DiskSpace {
                path: dir.display().to_string(),
                available,
                required,
            });
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(path = %self.store.path.display()))]
    pub fn write(&self, snapshot: &Snapshot) -> Result<WriteOutcome, ConceptLinkError> {
        let json = snapshot.to_json()?;
        let bytes = json.len() as u64;
        self.check_disk_space(bytes)?;

        let backup = if self.store.backups_enabled {
            self.backup()?
        } else {
            None
        };

        let dir = self.store.parent_dir();
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.store.path)?;
        tracing::info!(
            "Wrote snapshot {:?} ({} concept(s), {bytes} bytes)",
            self.store.path,
            snapshot.concepts.len()
        );

        let pruned_backups = match self.store.keep_backups {
            Some(keep) => self.prune_backups(keep),
            None => 0,
        };
        Ok(WriteOutcome {
            path: self.store.path.clone(),
            bytes,
            backup,
            pruned_backups,
        })
    }

    /// Copies the current snapshot, if any, to `<backup dir>/<stem>.<UTC timestamp>.json`.
    pub fn backup(&self) -> Result<Option<PathBuf>, ConceptLinkError> {
        if !self.store.path.is_file() {
            return Ok(None);
        }
        let dir = self.store.backup_dir();
        fs::create_dir_all(&dir)?;
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        let target = dir.join(format!("{}.{stamp}.json", self.store.file_stem()));
        fs::copy(&self.store.path, &target)?;
        tracing::debug!("Backed up {:?} to {target:?}", self.store.path);
        Ok(Some(target))
    }

    /// Deletes all but the `keep` newest backups. Failures are logged, not returned.
    pub fn prune_backups(&self, keep: usize) -> usize {
        let backups = match self.store.backup_files() {
            Ok(backups) => backups,
            Err(e) => {
                tracing::warn!("Cannot list backups for pruning: {e}");
                return 0;
            }
        };
        let excess = backups.len().saturating_sub(keep);
        let mut pruned = 0;
        for path in backups.iter().take(excess) {
            match fs::remove_file(path) {
                Ok(()) => pruned += 1,
                Err(e) => tracing::warn!("Failed to remove old backup {path:?}: {e}"),
            }
        }
        if pruned > 0 {
            tracing::info!("Pruned {pruned} old backup(s), keeping {keep}");
        }
        pruned
    }
}

impl Drop for SnapshotLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release {:?}: {e}", self.store.lock_path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn sample_graph() -> ConceptGraph {
        let mut graph = ConceptGraph::new();
        let mut a = ConceptNode::new("a", "A", "a.md");
        a.links_to = vec!["b".to_string(), "ghost".to_string()];
        a.typed_links_to = vec![TypedLink::new("b", "prerequisite_of")];
        let mut b = ConceptNode::new("b", "B", "sub/b.md");
        b.links_to = vec!["c".to_string()];
        graph.insert_node(a);
        graph.insert_node(b);
        graph.insert_node(ConceptNode::new("c", "C", "c.md"));
        graph.link_backrefs();
        graph.infer_two_hop();
        graph
    }

    #[test]
    fn test_from_graph_shape() {
        let snapshot = Snapshot::from_graph(&sample_graph(), "test index");
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.metadata.total_concepts, 3);
        assert_eq!(snapshot.metadata.total_links, 4);
        assert_eq!(snapshot.metadata.broken_links, vec!["ghost"]);
        assert_eq!(snapshot.concepts["b"].file, "sub/b.md");

        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(value["links"]["a"]["typed_links_to"][0]["type"], "prerequisite_of");
        assert_eq!(value["links"]["b"]["typed_linked_from"][0]["from"], "a");
        assert_eq!(value["links"]["a"]["inferred_links_to"][0]["via"], "b");
    }

    #[test]
    fn test_to_graph_rebuilds_derived_views() {
        let graph = sample_graph();
        let mut snapshot = Snapshot::from_graph(&graph, "");
        // Derived views in the file are not trusted
        snapshot.links.get_mut("b").unwrap().linked_from.clear();
        snapshot.links.get_mut("a").unwrap().inferred_links_to.clear();
        assert_eq!(snapshot.to_graph(), graph);
    }

    #[test]
    fn test_corrupt_snapshot() {
        assert!(matches!(
            Snapshot::from_json("{ not json"),
            Err(ConceptLinkError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn test_write_read_backup_and_prune() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SnapshotStore::new(dir.path().join("index/links.json"));
        store.keep_backups = Some(2);
        let snapshot = Snapshot::from_graph(&sample_graph(), "");

        let lock = store.lock().unwrap();
        let first = lock.write(&snapshot).unwrap();
        assert!(first.backup.is_none());
        assert_eq!(lock.read().unwrap(), snapshot);

        for _ in 0..3 {
            let outcome = lock.write(&snapshot).unwrap();
            assert!(outcome.backup.is_some());
        }
        drop(lock);
        assert_eq!(store.backup_files().unwrap().len(), 2);
        assert_eq!(store.backup_dir(), dir.path().join("index/backups"));
    }

    #[test]
    fn test_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SnapshotStore::new(dir.path().join("links.json"));
        store.backups_enabled = false;
        let snapshot = Snapshot::from_graph(&sample_graph(), "");
        let lock = store.lock().unwrap();
        lock.write(&snapshot).unwrap();
        let outcome = lock.write(&snapshot).unwrap();
        assert!(outcome.backup.is_none());
        assert!(!store.backup_dir().exists());
    }

    #[test]
    fn test_missing_snapshot_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("links.json"));
        let lock = store.lock().unwrap();
        assert!(matches!(lock.read(), Err(ConceptLinkError::NotFound(_))));
    }

    #[test]
    fn test_lock_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SnapshotStore::new(dir.path().join("links.json"));
        store.lock_timeout = Duration::from_millis(50);
        let held = store.lock().unwrap();
        let other = store.clone();
        assert!(matches!(
            other.lock(),
            Err(ConceptLinkError::LockTimeout { .. })
        ));
        drop(held);
        assert!(other.lock().is_ok());
    }

    #[test]
    fn test_interrupt_while_waiting_for_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SnapshotStore::new(dir.path().join("links.json"));
        store.lock_timeout = Duration::from_secs(30);
        let _held = store.lock().unwrap();

        let other = store.clone();
        let interrupt = AtomicBool::new(true);
        let started = Instant::now();
        let result = other.lock_interruptible(&interrupt);
        assert!(matches!(result, Err(ConceptLinkError::Interrupted)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_disk_space_preflight() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SnapshotStore::new(dir.path().join("links.json"));
        store.min_free_bytes = u64::MAX / 2;
        let lock = store.lock().unwrap();
        let result = lock.write(&Snapshot::from_graph(&sample_graph(), ""));
        assert!(matches!(result, Err(ConceptLinkError::DiskSpace { .. })));
        assert!(!store.path().exists());
    }
}
