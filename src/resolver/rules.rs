//! Generality scoring rules for hierarchical contradictions.
//!
//! Each rule inspects the two concepts of a contradiction independently and votes on which one is
//! the more general (or more fundamental) side. A positive score favors `a`, the concept with the
//! lexicographically smaller id; a negative score favors `b`. Rule weights are powers of two so a
//! confident higher-precedence rule always outweighs every lower-precedence rule combined.

use crate::{
    graph::{ConceptGraph, ConceptNode},
    taxonomy::{HierarchyRule, RelationTaxonomy},
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{cmp::Ordering, fmt};

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("number pattern is valid"));

/// Everything a rule may look at when scoring one contradiction.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub graph: &'a ConceptGraph,
    pub taxonomy: &'a RelationTaxonomy,
    pub a: &'a ConceptNode,
    pub b: &'a ConceptNode,
    pub rel_type: &'a str,
    pub rule: &'a HierarchyRule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    /// `1.0` favors `a` as the general side, `-1.0` favors `b`, `0.0` abstains.
    pub score: f64,
    pub confidence: f64,
    pub reason: String,
}

impl Vote {
    pub fn abstain() -> Self {
        Vote {
            score: 0.0,
            confidence: 0.0,
            reason: String::new(),
        }
    }

    fn from_ordering<R: Into<String>>(ordering: Ordering, confidence: f64, reason: R) -> Self {
        let score = match ordering {
            Ordering::Greater => 1.0,
            Ordering::Less => -1.0,
            Ordering::Equal => return Vote::abstain(),
        };
        Vote {
            score,
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
        }
    }

    pub fn is_abstention(&self) -> bool {
        self.score == 0.0 || self.confidence == 0.0
    }
}

pub trait ScoringRule: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;
    fn weight(&self) -> f64;
    fn vote(&self, ctx: &ResolutionContext<'_>) -> Vote;
}

/// Configured id-substring pairs. Highest precedence.
#[derive(Debug, Default, Clone, Copy)]
pub struct DomainOverrideRule;

impl ScoringRule for DomainOverrideRule {
    fn name(&self) -> &'static str {
        "domain_override"
    }

    fn weight(&self) -> f64 {
        16.0
    }

    fn vote(&self, ctx: &ResolutionContext<'_>) -> Vote {
        for pattern in ctx.taxonomy.domain_overrides.iter() {
            let a_general =
                ctx.a.id.contains(&pattern.general) && ctx.b.id.contains(&pattern.specific);
            let b_general =
                ctx.b.id.contains(&pattern.general) && ctx.a.id.contains(&pattern.specific);
            let reason = format!(
                "domain override '{}' over '{}'",
                pattern.general, pattern.specific
            );
            match (a_general, b_general) {
                (true, false) => return Vote::from_ordering(Ordering::Greater, 1.0, reason),
                (false, true) => return Vote::from_ordering(Ordering::Less, 1.0, reason),
                _ => {}
            }
        }
        Vote::abstain()
    }
}

/// Vocabulary hits in titles: general/fundamental words minus specific/advanced words.
#[derive(Debug, Default, Clone, Copy)]
pub struct TitleKeywordRule;

impl TitleKeywordRule {
    pub fn title_score(title: &str, general: &[String], specific: &[String]) -> i64 {
        let tokens: Vec<String> = title
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();
        let hits = |words: &[String]| {
            words
                .iter()
                .filter(|w| tokens.iter().any(|t| t == *w))
                .count() as i64
        };
        hits(general) - hits(specific)
    }
}

impl ScoringRule for TitleKeywordRule {
    fn name(&self) -> &'static str {
        "title_keywords"
    }

    fn weight(&self) -> f64 {
        8.0
    }

    fn vote(&self, ctx: &ResolutionContext<'_>) -> Vote {
        let keywords = ctx.taxonomy.keywords(ctx.rule.vocabulary);
        let score_a = Self::title_score(&ctx.a.title, &keywords.general, &keywords.specific);
        let score_b = Self::title_score(&ctx.b.title, &keywords.general, &keywords.specific);
        Vote::from_ordering(
            score_a.cmp(&score_b),
            1.0,
            format!("title keywords {score_a} vs {score_b}"),
        )
    }
}

/// Shallower documents are more general.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryDepthRule;

impl DirectoryDepthRule {
    pub fn depth(file: &str) -> usize {
        file.split('/').filter(|c| !c.is_empty()).count()
    }
}

impl ScoringRule for DirectoryDepthRule {
    fn name(&self) -> &'static str {
        "directory_depth"
    }

    fn weight(&self) -> f64 {
        4.0
    }

    fn vote(&self, ctx: &ResolutionContext<'_>) -> Vote {
        let depth_a = Self::depth(&ctx.a.file);
        let depth_b = Self::depth(&ctx.b.file);
        Vote::from_ordering(
            depth_b.cmp(&depth_a),
            1.0,
            format!("directory depth {depth_a} vs {depth_b}"),
        )
    }
}

/// More incoming untyped links means more general. Any difference counts fully, so a lower rule
/// never outvotes it.
#[derive(Debug, Default, Clone, Copy)]
pub struct IncomingLinkRule;

impl ScoringRule for IncomingLinkRule {
    fn name(&self) -> &'static str {
        "incoming_links"
    }

    fn weight(&self) -> f64 {
        2.0
    }

    fn vote(&self, ctx: &ResolutionContext<'_>) -> Vote {
        let in_a = ctx.graph.incoming_count(&ctx.a.id);
        let in_b = ctx.graph.incoming_count(&ctx.b.id);
        Vote::from_ordering(
            in_a.cmp(&in_b),
            1.0,
            format!("incoming links {in_a} vs {in_b}"),
        )
    }
}

/// Smaller sequence number embedded in the id comes first. Lowest precedence.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceOrderRule;

impl SequenceOrderRule {
    pub fn sequence_number(id: &str) -> Option<u64> {
        FIRST_NUMBER.find(id).and_then(|m| m.as_str().parse().ok())
    }
}

impl ScoringRule for SequenceOrderRule {
    fn name(&self) -> &'static str {
        "sequence_order"
    }

    fn weight(&self) -> f64 {
        1.0
    }

    fn vote(&self, ctx: &ResolutionContext<'_>) -> Vote {
        match (
            Self::sequence_number(&ctx.a.id),
            Self::sequence_number(&ctx.b.id),
        ) {
            (Some(seq_a), Some(seq_b)) => Vote::from_ordering(
                seq_b.cmp(&seq_a),
                1.0,
                format!("sequence {seq_a} vs {seq_b}"),
            ),
            _ => Vote::abstain(),
        }
    }
}

/// Rules in precedence order.
pub fn default_rules() -> Vec<Box<dyn ScoringRule>> {
    vec![
        Box::new(DomainOverrideRule),
        Box::new(TitleKeywordRule),
        Box::new(DirectoryDepthRule),
        Box::new(IncomingLinkRule),
        Box::new(SequenceOrderRule),
    ]
}
