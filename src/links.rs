//! Reference extraction from document bodies.
//!
//! Three independent extractors, each returning normalized (lowercased) ids:
//!
//! - [`extract_untyped_links`]: every inline `[[id]]` marker.
//! - [`extract_typed_links`]: inline markers annotated as `[[id]] {rel: type}`.
//! - [`extract_curated_links`]: markdown links `[Title](file.md)` inside the curated
//!   "related concepts" section, optionally suffixed with `{rel: type}`.
//!
//! Wikilink variants `[[id|alias]]` and `[[id#anchor]]` resolve to `id`.

use crate::{config::IndexConfig, document::Document};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, path::Path};
use unicode_normalization::UnicodeNormalization;

static WIKILINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[([^\[\]|#]+)(?:[#|][^\[\]]*)?\]\]").expect("wikilink pattern is valid")
});

static TYPED_WIKILINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[\[([^\[\]|#]+)(?:[#|][^\[\]]*)?\]\][ \t]*\{\s*rel\s*:\s*([A-Za-z][A-Za-z0-9_\- ]*?)\s*\}",
    )
    .expect("typed wikilink pattern is valid")
});

static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[([^\[\]]+)\]\(([^)\s]+)\)(?:[ \t]*\{\s*rel\s*:\s*([A-Za-z][A-Za-z0-9_\- ]*?)\s*\})?",
    )
    .expect("markdown link pattern is valid")
});

/// Leading ordering prefix of a filename stem: `03-`, `012_`, or a subdomain code followed by a
/// number such as `fin-012-`.
static FILENAME_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z]+[-_])?\d+[-_.]+").expect("filename prefix pattern is valid")
});

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// A typed forward edge as authored in a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypedLink {
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: String,
}

impl TypedLink {
    pub fn new<T: Into<String>, R: Into<String>>(to: T, rel_type: R) -> Self {
        TypedLink {
            to: to.into(),
            rel_type: rel_type.into(),
        }
    }
}

/// Canonical node id: NFC, trimmed, lowercased, whitespace runs replaced by `-`.
pub fn normalize_id(raw: &str) -> String {
    let composed: String = raw.trim().nfc().collect::<String>().to_lowercase();
    WHITESPACE.replace_all(&composed, "-").into_owned()
}

/// Canonical relation type: trimmed, lowercased, `-` and whitespace replaced by `_`.
pub fn normalize_rel_type(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase().replace('-', "_");
    WHITESPACE.replace_all(&lowered, "_").into_owned()
}

/// Derives a node id from a filename stem, stripping a leading numeric or subdomain prefix.
pub fn id_from_filename(stem: &str) -> String {
    let stripped = FILENAME_PREFIX.replace(stem, "");
    if stripped.trim().is_empty() {
        normalize_id(stem)
    } else {
        normalize_id(&stripped)
    }
}

/// Inline `[[id]]` targets, deduplicated, first-seen order.
pub fn extract_untyped_links(body: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    WIKILINK
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| normalize_id(m.as_str()))
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// Inline `[[id]] {rel: type}` targets, deduplicated by `(to, type)`, first-seen order.
pub fn extract_typed_links(body: &str) -> Vec<TypedLink> {
    let mut seen = BTreeSet::new();
    TYPED_WIKILINK
        .captures_iter(body)
        .filter_map(|caps| {
            let to = normalize_id(caps.get(1)?.as_str());
            let rel_type = normalize_rel_type(caps.get(2)?.as_str());
            (!to.is_empty() && !rel_type.is_empty()).then(|| TypedLink::new(to, rel_type))
        })
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Curated links from the default "related concepts" headings, see [`LinkExtractor`].
pub fn extract_curated_links(body: &str) -> Vec<TypedLink> {
    LinkExtractor::default().curated_links(&Document::sections_of(body))
}

/// Curated links take precedence: they come first, and an inline typed link naming the same
/// `(to, type)` pair is dropped.
pub fn merge_typed_links(curated: Vec<TypedLink>, inline: Vec<TypedLink>) -> Vec<TypedLink> {
    let mut seen = BTreeSet::new();
    curated
        .into_iter()
        .chain(inline)
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedLinks {
    pub links_to: Vec<String>,
    pub typed_links_to: Vec<TypedLink>,
}

/// Extraction settings taken from [`IndexConfig`].
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    related_headings: Vec<String>,
    default_curated_type: String,
    extension: String,
}

impl Default for LinkExtractor {
    fn default() -> Self {
        LinkExtractor::new(&IndexConfig::default())
    }
}

impl LinkExtractor {
    pub fn new(config: &IndexConfig) -> Self {
        LinkExtractor {
            related_headings: config.related_headings.clone(),
            default_curated_type: normalize_rel_type(&config.default_curated_type),
            extension: config.extension.trim_start_matches('.').to_string(),
        }
    }

    fn is_related_heading(&self, heading: &str) -> bool {
        let heading = heading.trim().trim_end_matches(':').trim();
        self.related_headings
            .iter()
            .any(|related| related.eq_ignore_ascii_case(heading))
    }

    /// Resolves a markdown link destination to a node id, or `None` for external URLs and
    /// non-document targets.
    fn destination_id(&self, dest: &str) -> Option<String> {
        if dest.contains("://") || dest.starts_with("mailto:") {
            return None;
        }
        let path_part = dest.split(['#', '?']).next().unwrap_or(dest);
        let path = Path::new(path_part);
        let extension_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false);
        if !extension_matches {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let id = id_from_filename(stem);
        (!id.is_empty()).then_some(id)
    }

    pub fn curated_links(&self, sections: &[crate::document::Section]) -> Vec<TypedLink> {
        let mut seen = BTreeSet::new();
        sections
            .iter()
            .filter(|s| {
                s.heading
                    .as_deref()
                    .map(|h| self.is_related_heading(h))
                    .unwrap_or(false)
            })
            .flat_map(|s| MARKDOWN_LINK.captures_iter(&s.body))
            .filter_map(|caps| {
                let to = self.destination_id(caps.get(2)?.as_str())?;
                let rel_type = caps
                    .get(3)
                    .map(|m| normalize_rel_type(m.as_str()))
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| self.default_curated_type.clone());
                Some(TypedLink::new(to, rel_type))
            })
            .filter(|link| seen.insert(link.clone()))
            .collect()
    }

    /// Runs all three extractors over a parsed document and merges typed results.
    pub fn extract(&self, doc: &Document) -> ExtractedLinks {
        let links_to = extract_untyped_links(&doc.body);
        let inline = extract_typed_links(&doc.body);
        let curated = self.curated_links(&doc.sections);
        ExtractedLinks {
            links_to,
            typed_links_to: merge_typed_links(curated, inline),
        }
    }
}
