//! End-to-end runs: a full rebuild of the index from the corpus, and an in-place repair of an
//! existing snapshot.
//!
//! Both runs check the interrupt flag between stages and once more right before writing, so a
//! cancelled run never leaves a partially written snapshot behind.

use crate::{
    config::{IndexConfig, DEFAULT_INDEX_PATH},
    error::ConceptLinkError,
    graph::{detect_cycles, ConceptGraph, Cycle, GraphBuilder, SkippedDocument},
    resolver::{
        apply_resolutions, unresolved_after_apply, Contradiction, ContradictionResolver,
        Resolution, ResolutionSummary,
    },
    scanner::scan_documents,
    snapshot::{Snapshot, SnapshotStore, WriteOutcome},
    taxonomy::RelationTaxonomy,
};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Detect and report only; never write.
    pub dry_run: bool,
    /// Set from a signal handler to cancel the run at the next stage boundary.
    pub interrupt: Arc<AtomicBool>,
}

impl RunOptions {
    pub fn check_interrupt(&self, stage: &str) -> Result<(), ConceptLinkError> {
        if self.interrupt.load(Ordering::SeqCst) {
            tracing::warn!("Interrupted before {stage}; nothing was written");
            return Err(ConceptLinkError::Interrupted);
        }
        Ok(())
    }
}

/// Contradiction handling results shared by [`rebuild`] and [`fix`].
#[derive(Debug, Clone, Default)]
pub struct ResolutionOutcome {
    pub resolutions: Vec<Resolution>,
    pub summary: ResolutionSummary,
    pub edges_removed: usize,
    /// Pairs that were resolved but still appear bidirectional. Always empty unless the graph
    /// was modified concurrently with resolution.
    pub unresolved: Vec<Contradiction>,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub output: PathBuf,
    pub documents_scanned: usize,
    pub skipped: Vec<SkippedDocument>,
    pub cycles: Vec<Cycle>,
    pub resolution: ResolutionOutcome,
    pub snapshot: Snapshot,
    /// `None` on a dry run.
    pub written: Option<WriteOutcome>,
}

#[derive(Debug, Clone)]
pub struct FixReport {
    pub index: PathBuf,
    pub resolution: ResolutionOutcome,
    pub snapshot: Snapshot,
    pub written: Option<WriteOutcome>,
}

/// Detects, resolves and applies contradictions, then refreshes two-hop inference since removed
/// typed edges may have been the only path to a suggestion.
#[tracing::instrument(skip_all)]
pub fn resolve_contradictions(
    graph: &mut ConceptGraph,
    taxonomy: &RelationTaxonomy,
) -> ResolutionOutcome {
    let resolver = ContradictionResolver::new(taxonomy.clone());
    let contradictions = resolver.detect(graph);
    if contradictions.is_empty() {
        tracing::info!("No contradictions found");
        return ResolutionOutcome::default();
    }
    let resolutions = resolver.resolve_all(graph, &contradictions);
    let edges_removed = apply_resolutions(graph, &resolutions);
    graph.infer_two_hop();

    let unresolved = unresolved_after_apply(graph, taxonomy, &resolutions);
    for contradiction in unresolved.iter() {
        tracing::error!("Contradiction {contradiction} survived its resolution");
    }
    let summary = ResolutionSummary::from_resolutions(&resolutions);
    tracing::info!(
        "Contradictions: {} detected, {} edge(s) removed, {} kept for review",
        summary.detected,
        edges_removed,
        summary.ambiguous
    );
    ResolutionOutcome {
        resolutions,
        summary,
        edges_removed,
        unresolved,
    }
}

pub fn default_output(root: &Path) -> PathBuf {
    root.join(DEFAULT_INDEX_PATH)
}

/// Corpus root that owns `index`, assuming the `<root>/<dir>/<file>` layout of
/// [`default_output`]. Falls back to the current directory.
pub fn corpus_root_for_index(index: &Path) -> PathBuf {
    index
        .parent()
        .and_then(Path::parent)
        .filter(|root| !root.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Scans `root`, builds the graph, resolves contradictions and writes the snapshot to `output`
/// (default `<root>/.index/links.json`).
#[tracing::instrument(skip(config, opts))]
pub fn rebuild(
    root: &Path,
    output: Option<&Path>,
    config: &IndexConfig,
    opts: &RunOptions,
) -> Result<BuildReport, ConceptLinkError> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(root));
    let store = SnapshotStore::from_config(&output, config);
    // Lock first so a contended index fails the run before any work is done.
    let lock = if opts.dry_run {
        None
    } else {
        Some(store.lock_interruptible(&opts.interrupt)?)
    };

    let paths = scan_documents(root, config)?;
    opts.check_interrupt("building the graph")?;
    let build = GraphBuilder::build_from_paths(root, config, &paths);
    let mut graph = build.graph;

    opts.check_interrupt("cycle detection")?;
    let cycles = detect_cycles(&graph);

    opts.check_interrupt("contradiction resolution")?;
    let resolution = resolve_contradictions(&mut graph, &config.taxonomy);

    let snapshot = Snapshot::from_graph(&graph, config.description.as_str());
    opts.check_interrupt("writing the snapshot")?;
    let written = match lock {
        Some(lock) => Some(lock.write(&snapshot)?),
        None => {
            tracing::info!("Dry run: not writing {output:?}");
            None
        }
    };

    Ok(BuildReport {
        output,
        documents_scanned: paths.len(),
        skipped: build.skipped,
        cycles,
        resolution,
        snapshot,
        written,
    })
}

/// Repairs contradictions in an existing snapshot without reading the corpus.
#[tracing::instrument(skip(config, opts))]
pub fn fix(
    index: &Path,
    config: &IndexConfig,
    opts: &RunOptions,
) -> Result<FixReport, ConceptLinkError> {
    let store = SnapshotStore::from_config(index, config);
    let lock = store.lock_interruptible(&opts.interrupt)?;
    let existing = lock.read()?;
    let mut graph = existing.to_graph();
    tracing::info!("Loaded {} concept(s) from {index:?}", graph.len());

    opts.check_interrupt("contradiction resolution")?;
    let resolution = resolve_contradictions(&mut graph, &config.taxonomy);

    let description = if existing.description.is_empty() {
        config.description.clone()
    } else {
        existing.description.clone()
    };
    let snapshot = Snapshot::from_graph(&graph, description);
    opts.check_interrupt("writing the snapshot")?;
    let written = if opts.dry_run {
        tracing::info!("Dry run: not writing {index:?}");
        None
    } else if resolution.edges_removed == 0 {
        tracing::info!("Nothing to fix in {index:?}");
        None
    } else {
        Some(lock.write(&snapshot)?)
    };

    Ok(FixReport {
        index: index.to_path_buf(),
        resolution,
        snapshot,
        written,
    })
}

/// Builds the graph and reports untyped link cycles. Never writes.
pub fn cycles(root: &Path, config: &IndexConfig) -> Result<Vec<Cycle>, ConceptLinkError> {
    let paths = scan_documents(root, config)?;
    let build = GraphBuilder::build_from_paths(root, config, &paths);
    Ok(detect_cycles(&build.graph))
}
