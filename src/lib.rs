//! # conceptlink
//!
//! Builds a bidirectional concept-link index over a corpus of Markdown notes and repairs
//! contradictory hierarchical relations.
//!
//! ## Overview
//!
//! Each document is a concept node. Its id comes from frontmatter (`id`, then `rem_id`) or from the
//! file name. Documents reference each other in three ways:
//!
//! - untyped wikilinks: `[[call-option]]`
//! - typed wikilinks: `[[stock]] {rel: part_of}`
//! - curated links under a "Related Concepts" heading: `- [Stock](stock.md) {rel: part_of}`
//!
//! From these the index derives reverse adjacency, a list of broken link targets and two-hop
//! suggestions (`A -> B -> C` suggests `A -> C`). The result is written as one JSON snapshot.
//!
//! ### Contradictions
//!
//! Relation types are classified by a [`taxonomy::RelationTaxonomy`]:
//!
//! - **hierarchical** types (`prerequisite_of`, `example_of`, ...) must not hold in both
//!   directions between two concepts
//! - **symmetric** types (`antonym`, `related`, ...) may
//! - **context-dependent** types (`used_in`, `uses`, ...) are directional, but without a
//!   reliable way to tell which direction is right
//!
//! [`resolver::ContradictionResolver`] scores each bidirectional hierarchical pair with a set of
//! weighted heuristics (domain overrides, title vocabulary, directory depth, incoming links,
//! sequence numbers) and removes the direction that contradicts the relation's meaning.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conceptlink::{config::IndexConfig, pipeline::{rebuild, RunOptions}};
//! use std::path::Path;
//!
//! fn main() -> Result<(), conceptlink::ConceptLinkError> {
//!     let root = Path::new("./notes");
//!     let config = IndexConfig::discover(root, None)?;
//!     let report = rebuild(root, None, &config, &RunOptions::default())?;
//!     println!(
//!         "{} concepts, {} broken links",
//!         report.snapshot.metadata.total_concepts,
//!         report.snapshot.metadata.broken_links.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Module Guide
//!
//! - [`scanner`] and [`document`]: finding and parsing corpus files
//! - [`links`]: link extraction and id normalization
//! - [`graph`]: the concept graph, its build passes and cycle reporting
//! - [`resolver`]: contradiction detection and resolution
//! - [`snapshot`]: the JSON snapshot and its locked, atomic store
//! - [`pipeline`]: `rebuild` and `fix` runs tying everything together
//!
//! ## Features
//!
//! - **bin** (default): the `conceptlink` command-line tool

pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod links;
pub mod pipeline;
pub mod resolver;
pub mod scanner;
pub mod snapshot;
pub mod taxonomy;
#[cfg(test)]
mod tests;

pub use error::*;
