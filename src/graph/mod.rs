//! Concept graph data structures.
//!
//! [`ConceptGraph`] is rebuilt wholesale on every run: [`GraphBuilder`] records forward edges
//! (pass 1), [`ConceptGraph::link_backrefs`] derives reverse views and broken links (pass 2) and
//! [`ConceptGraph::infer_two_hop`] adds two-hop suggestions (pass 3). Every pass walks nodes in
//! sorted id order so that the serialized output is byte-reproducible.

pub mod builder;
pub mod cycles;

pub use builder::{BuildOutput, GraphBuilder, SkippedDocument};
pub use cycles::{detect_cycles, Cycle};

use crate::links::TypedLink;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Reverse view of a [`TypedLink`], stored on the link target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypedBacklink {
    pub from: String,
    #[serde(rename = "type")]
    pub rel_type: String,
}

/// Suggested edge `A -> to` derived from `A -> via -> to`. Never authored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InferredLink {
    pub to: String,
    pub via: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConceptNode {
    pub id: String,
    pub title: String,
    /// Source document, relative to the corpus root with `/` separators.
    pub file: String,
    pub links_to: Vec<String>,
    pub typed_links_to: Vec<TypedLink>,
    pub linked_from: Vec<String>,
    pub typed_linked_from: Vec<TypedBacklink>,
    pub inferred_links_to: Vec<InferredLink>,
}

impl ConceptNode {
    pub fn new<I: Into<String>, T: Into<String>, F: Into<String>>(id: I, title: T, file: F) -> Self {
        ConceptNode {
            id: id.into(),
            title: title.into(),
            file: file.into(),
            ..Default::default()
        }
    }

    /// Direct neighbors: untyped targets first, then typed targets, without repeats.
    pub fn neighbors(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.links_to
            .iter()
            .map(String::as_str)
            .chain(self.typed_links_to.iter().map(|l| l.to.as_str()))
            .filter(|id| seen.insert(*id))
            .collect()
    }

    pub fn has_typed_link(&self, to: &str, rel_type: &str) -> bool {
        self.typed_links_to
            .iter()
            .any(|l| l.to == to && l.rel_type == rel_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConceptGraph {
    pub nodes: BTreeMap<String, ConceptNode>,
    /// Edge targets with no corresponding node. Non-fatal.
    pub broken_links: BTreeSet<String>,
}

impl ConceptGraph {
    pub fn new() -> Self {
        ConceptGraph::default()
    }

    /// Inserts `node` unless its id is already taken. Returns whether it was inserted.
    pub fn insert_node(&mut self, node: ConceptNode) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    pub fn get(&self, id: &str) -> Option<&ConceptNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of authored forward edges (untyped plus typed).
    pub fn total_links(&self) -> usize {
        self.nodes
            .values()
            .map(|n| n.links_to.len() + n.typed_links_to.len())
            .sum()
    }

    pub fn incoming_count(&self, id: &str) -> usize {
        self.nodes.get(id).map(|n| n.linked_from.len()).unwrap_or(0)
    }

    /// Pass 2: rebuilds `linked_from`, `typed_linked_from` and `broken_links` from forward edges.
    #[tracing::instrument(skip_all)]
    pub fn link_backrefs(&mut self) {
        self.broken_links.clear();
        for node in self.nodes.values_mut() {
            node.linked_from.clear();
            node.typed_linked_from.clear();
        }

        let mut untyped: Vec<(String, String)> = Vec::new();
        let mut typed: Vec<(String, TypedBacklink)> = Vec::new();
        for (source, node) in self.nodes.iter() {
            for target in node.links_to.iter() {
                untyped.push((target.clone(), source.clone()));
            }
            for link in node.typed_links_to.iter() {
                typed.push((
                    link.to.clone(),
                    TypedBacklink {
                        from: source.clone(),
                        rel_type: link.rel_type.clone(),
                    },
                ));
            }
        }

        for (target, source) in untyped {
            match self.nodes.get_mut(&target) {
                Some(node) => {
                    if !node.linked_from.contains(&source) {
                        node.linked_from.push(source);
                    }
                }
                None => {
                    tracing::debug!("Broken link {source} -> {target}");
                    self.broken_links.insert(target);
                }
            }
        }
        for (target, backlink) in typed {
            match self.nodes.get_mut(&target) {
                Some(node) => {
                    if !node.typed_linked_from.contains(&backlink) {
                        node.typed_linked_from.push(backlink);
                    }
                }
                None => {
                    tracing::debug!(
                        "Broken typed link {} -[{}]-> {target}",
                        backlink.from,
                        backlink.rel_type
                    );
                    self.broken_links.insert(target);
                }
            }
        }
        if !self.broken_links.is_empty() {
            tracing::info!(
                "{} link target(s) have no document: {:?}",
                self.broken_links.len(),
                self.broken_links
            );
        }
    }

    /// Pass 3: recomputes `inferred_links_to` for every node.
    ///
    /// `A -> B -> C` suggests `A -> C` when `C` is a node, `C != A` and `C` is not already a
    /// direct neighbor of `A`.
    #[tracing::instrument(skip_all)]
    pub fn infer_two_hop(&mut self) {
        let mut inferred: BTreeMap<String, Vec<InferredLink>> = BTreeMap::new();
        for (a_id, a) in self.nodes.iter() {
            let direct = a.neighbors();
            let mut seen = BTreeSet::new();
            let mut suggestions = Vec::new();
            for b_id in direct.iter() {
                let Some(b) = self.nodes.get(*b_id) else {
                    continue;
                };
                for c_id in b.neighbors() {
                    if c_id == a_id.as_str()
                        || !self.nodes.contains_key(c_id)
                        || direct.contains(&c_id)
                    {
                        continue;
                    }
                    let link = InferredLink {
                        to: c_id.to_string(),
                        via: b_id.to_string(),
                    };
                    if seen.insert(link.clone()) {
                        suggestions.push(link);
                    }
                }
            }
            inferred.insert(a_id.clone(), suggestions);
        }
        let mut total = 0;
        for (id, suggestions) in inferred {
            if let Some(node) = self.nodes.get_mut(&id) {
                total += suggestions.len();
                node.inferred_links_to = suggestions;
            }
        }
        tracing::debug!("Inferred {total} two-hop link(s)");
    }

    pub fn has_typed_edge(&self, from: &str, to: &str, rel_type: &str) -> bool {
        self.nodes
            .get(from)
            .map(|n| n.has_typed_link(to, rel_type))
            .unwrap_or(false)
    }

    /// Removes the typed edge from the source's forward list and the target's reverse list.
    /// Returns whether anything was removed.
    pub fn remove_typed_edge(&mut self, from: &str, to: &str, rel_type: &str) -> bool {
        let mut removed = false;
        if let Some(source) = self.nodes.get_mut(from) {
            let before = source.typed_links_to.len();
            source
                .typed_links_to
                .retain(|l| !(l.to == to && l.rel_type == rel_type));
            removed |= source.typed_links_to.len() != before;
        }
        if let Some(target) = self.nodes.get_mut(to) {
            let before = target.typed_linked_from.len();
            target
                .typed_linked_from
                .retain(|l| !(l.from == from && l.rel_type == rel_type));
            removed |= target.typed_linked_from.len() != before;
        }
        removed
    }
}
