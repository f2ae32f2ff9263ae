use super::{ConceptGraph, ConceptNode};
use crate::{
    config::IndexConfig,
    document::Document,
    error::ConceptLinkError,
    links::{id_from_filename, normalize_id, LinkExtractor},
    scanner::relative_file,
};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// A document excluded from the graph, with the reason. Non-fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub graph: ConceptGraph,
    pub skipped: Vec<SkippedDocument>,
}

/// Assembles a [`ConceptGraph`] from corpus documents.
///
/// Documents are added one at a time (pass 1: id resolution, link extraction, title/file
/// metadata). [`GraphBuilder::finish`] then derives reverse views, broken links and two-hop
/// inference. Callers are expected to add documents in sorted path order; when two documents
/// claim the same id the first one wins.
#[derive(Debug)]
pub struct GraphBuilder {
    root: PathBuf,
    extractor: LinkExtractor,
    graph: ConceptGraph,
    skipped: Vec<SkippedDocument>,
}

impl GraphBuilder {
    pub fn new<P: AsRef<Path>>(root: P, config: &IndexConfig) -> Self {
        GraphBuilder {
            root: root.as_ref().to_path_buf(),
            extractor: LinkExtractor::new(config),
            graph: ConceptGraph::new(),
            skipped: Vec::new(),
        }
    }

    /// Reads and adds the document at `path`. Unreadable or malformed documents are logged and
    /// recorded as skipped; `Ok(None)` is returned for them.
    pub fn add_path(&mut self, path: &Path) -> Option<String> {
        let file = relative_file(&self.root, path);
        let result = fs::read(path)
            .map_err(|e| ConceptLinkError::parse(&file, format!("unreadable: {e}")))
            .and_then(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|_| ConceptLinkError::parse(&file, "not valid UTF-8"))
            })
            .and_then(|content| self.add_document(path, &content));
        match result {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Excluding {file} from the graph: {e}");
                self.skipped.push(SkippedDocument {
                    file,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Pass 1 for a single document. Returns the node id, or `Ok(None)` if the id was already
    /// claimed by an earlier document.
    #[tracing::instrument(skip(self, content))]
    pub fn add_document(
        &mut self,
        path: &Path,
        content: &str,
    ) -> Result<Option<String>, ConceptLinkError> {
        let file = relative_file(&self.root, path);
        let doc = Document::parse(&file, content)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConceptLinkError::parse(&file, "file name is not valid UTF-8"))?;

        let id = doc
            .frontmatter
            .id()
            .map(|raw| normalize_id(&raw))
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| id_from_filename(stem));
        if id.is_empty() {
            return Err(ConceptLinkError::parse(&file, "cannot derive a node id"));
        }

        if let Some(existing) = self.graph.get(&id) {
            let reason = format!("duplicate id '{id}', already defined by {}", existing.file);
            tracing::warn!("Excluding {file} from the graph: {reason}");
            self.skipped.push(SkippedDocument { file, reason });
            return Ok(None);
        }

        let title = doc
            .frontmatter
            .title()
            .or_else(|| doc.first_title_heading().map(str::to_string))
            .unwrap_or_else(|| titlecase::titlecase(&id.replace(['-', '_'], " ")));

        let links = self.extractor.extract(&doc);
        tracing::trace!(
            "{id}: {} untyped, {} typed link(s)",
            links.links_to.len(),
            links.typed_links_to.len()
        );
        let mut node = ConceptNode::new(id.clone(), title, file);
        node.links_to = links.links_to;
        node.typed_links_to = links.typed_links_to;
        self.graph.insert_node(node);
        Ok(Some(id))
    }

    pub fn skipped(&self) -> &[SkippedDocument] {
        &self.skipped
    }

    /// Runs pass 2 (reverse views, broken links) and pass 3 (two-hop inference).
    pub fn finish(mut self) -> BuildOutput {
        self.graph.link_backrefs();
        self.graph.infer_two_hop();
        tracing::info!(
            "Built graph: {} concept(s), {} link(s), {} broken target(s), {} skipped document(s)",
            self.graph.len(),
            self.graph.total_links(),
            self.graph.broken_links.len(),
            self.skipped.len()
        );
        BuildOutput {
            graph: self.graph,
            skipped: self.skipped,
        }
    }

    /// Builds a graph from already scanned (sorted) `paths`.
    pub fn build_from_paths<P: AsRef<Path>>(
        root: P,
        config: &IndexConfig,
        paths: &[PathBuf],
    ) -> BuildOutput {
        let mut builder = GraphBuilder::new(root, config);
        for path in paths {
            builder.add_path(path);
        }
        builder.finish()
    }
}
