//! Detection and repair of directional contradictions.
//!
//! A contradiction is a pair of concepts holding the same hierarchical or context-dependent
//! relation type in both directions. [`ContradictionResolver::resolve`] decides which direction
//! survives, and [`apply_resolutions`] removes the losing typed edge from the graph.
//!
//! Resolution is a single pass: every contradiction is scored against the graph as it was
//! before any removal, and the result is not iterated to a fixed point.

pub mod rules;

pub use rules::{default_rules, ResolutionContext, ScoringRule, Vote};

use crate::{
    graph::ConceptGraph,
    taxonomy::{Generality, RelationClass, RelationTaxonomy, TieBreak},
};
use serde::{Serialize, Serializer};
use std::{collections::BTreeSet, fmt};

/// Scores closer to zero than this are treated as "no signal".
const DECISION_EPSILON: f64 = 1e-9;

/// An unordered pair of concepts holding `rel_type` in both directions. `a < b`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Contradiction {
    pub a: String,
    pub b: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub class: RelationClass,
}

impl Contradiction {
    pub fn new<X: Into<String>, Y: Into<String>, T: Into<String>>(
        x: X,
        y: Y,
        rel_type: T,
        class: RelationClass,
    ) -> Self {
        let (x, y) = (x.into(), y.into());
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Contradiction {
            a,
            b,
            rel_type: rel_type.into(),
            class,
        }
    }
}

impl fmt::Display for Contradiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-[{}]-> {}", self.a, self.rel_type, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionAction {
    /// Remove the directed typed edge `from -> to`.
    Remove { from: String, to: String },
    KeepBoth,
}

impl ResolutionAction {
    pub fn is_keep_both(&self) -> bool {
        matches!(self, ResolutionAction::KeepBoth)
    }
}

impl fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionAction::Remove { from, to } => write!(f, "remove_{from}_to_{to}"),
            ResolutionAction::KeepBoth => write!(f, "keep_both"),
        }
    }
}

impl Serialize for ResolutionAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub contradiction: Contradiction,
    pub action: ResolutionAction,
    pub rationale: String,
    /// Signed weighted sum of rule votes; positive favors `a` as the general side. Zero for
    /// non-hierarchical types.
    pub score: f64,
    /// True when a hierarchical contradiction had no deciding signal.
    pub ambiguous: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    pub detected: usize,
    pub removed: usize,
    pub kept_both: usize,
    pub ambiguous: usize,
    pub hierarchical: usize,
    pub context_dependent: usize,
}

impl ResolutionSummary {
    pub fn from_resolutions(resolutions: &[Resolution]) -> Self {
        let mut summary = ResolutionSummary {
            detected: resolutions.len(),
            ..Default::default()
        };
        for resolution in resolutions {
            if resolution.action.is_keep_both() {
                summary.kept_both += 1;
            } else {
                summary.removed += 1;
            }
            if resolution.ambiguous {
                summary.ambiguous += 1;
            }
            match resolution.contradiction.class {
                RelationClass::Hierarchical => summary.hierarchical += 1,
                RelationClass::ContextDependent => summary.context_dependent += 1,
                _ => {}
            }
        }
        summary
    }
}

/// Every typed edge `(A, type, B)` whose type is hierarchical or context-dependent and whose
/// reverse `(B, type, A)` also exists, reported once per unordered pair and type, in discovery
/// order (sources visited in sorted id order).
#[tracing::instrument(skip_all)]
pub fn detect_contradictions(
    graph: &ConceptGraph,
    taxonomy: &RelationTaxonomy,
) -> Vec<Contradiction> {
    let mut seen = BTreeSet::new();
    let mut contradictions = Vec::new();
    for (source, node) in graph.nodes.iter() {
        for link in node.typed_links_to.iter() {
            if link.to == *source || !taxonomy.is_directional(&link.rel_type) {
                continue;
            }
            if !graph.has_typed_edge(&link.to, source, &link.rel_type) {
                continue;
            }
            let contradiction = Contradiction::new(
                source.as_str(),
                link.to.as_str(),
                link.rel_type.as_str(),
                taxonomy.class_of(&link.rel_type),
            );
            if seen.insert((
                contradiction.a.clone(),
                contradiction.b.clone(),
                contradiction.rel_type.clone(),
            )) {
                tracing::debug!("Contradiction detected: {contradiction}");
                contradictions.push(contradiction);
            }
        }
    }
    contradictions
}

/// Removes every non-`keep_both` edge. Returns the number of edges actually removed.
#[tracing::instrument(skip_all)]
pub fn apply_resolutions(graph: &mut ConceptGraph, resolutions: &[Resolution]) -> usize {
    let mut removed = 0;
    for resolution in resolutions {
        if let ResolutionAction::Remove { from, to } = &resolution.action {
            if graph.remove_typed_edge(from, to, &resolution.contradiction.rel_type) {
                tracing::info!(
                    "Removed {from} -[{}]-> {to}: {}",
                    resolution.contradiction.rel_type,
                    resolution.rationale
                );
                removed += 1;
            } else {
                tracing::debug!("Edge {from} -> {to} already absent; nothing to remove");
            }
        }
    }
    removed
}

/// Contradictions that received a determinate resolution but are still present in `graph`.
/// Empty after a correct [`apply_resolutions`].
pub fn unresolved_after_apply(
    graph: &ConceptGraph,
    taxonomy: &RelationTaxonomy,
    resolutions: &[Resolution],
) -> Vec<Contradiction> {
    let determinate: BTreeSet<&Contradiction> = resolutions
        .iter()
        .filter(|r| !r.action.is_keep_both())
        .map(|r| &r.contradiction)
        .collect();
    detect_contradictions(graph, taxonomy)
        .into_iter()
        .filter(|c| determinate.contains(c))
        .collect()
}

#[derive(Debug)]
pub struct ContradictionResolver {
    taxonomy: RelationTaxonomy,
    rules: Vec<Box<dyn ScoringRule>>,
}

impl ContradictionResolver {
    pub fn new(taxonomy: RelationTaxonomy) -> Self {
        ContradictionResolver::with_rules(taxonomy, default_rules())
    }

    /// Uses `rules` in the given precedence order.
    pub fn with_rules(taxonomy: RelationTaxonomy, rules: Vec<Box<dyn ScoringRule>>) -> Self {
        ContradictionResolver { taxonomy, rules }
    }

    pub fn taxonomy(&self) -> &RelationTaxonomy {
        &self.taxonomy
    }

    pub fn detect(&self, graph: &ConceptGraph) -> Vec<Contradiction> {
        detect_contradictions(graph, &self.taxonomy)
    }

    pub fn resolve_all(
        &self,
        graph: &ConceptGraph,
        contradictions: &[Contradiction],
    ) -> Vec<Resolution> {
        contradictions
            .iter()
            .map(|c| self.resolve(graph, c))
            .collect()
    }

    pub fn resolve(&self, graph: &ConceptGraph, contradiction: &Contradiction) -> Resolution {
        match self.taxonomy.class_of(&contradiction.rel_type) {
            RelationClass::Hierarchical => self.resolve_hierarchical(graph, contradiction),
            RelationClass::ContextDependent => Resolution {
                contradiction: contradiction.clone(),
                action: ResolutionAction::Remove {
                    from: contradiction.b.clone(),
                    to: contradiction.a.clone(),
                },
                rationale: format!(
                    "low-confidence: context-dependent relation '{}' has no semantic direction; \
                     kept {} -> {} by id order",
                    contradiction.rel_type, contradiction.a, contradiction.b
                ),
                score: 0.0,
                ambiguous: false,
            },
            RelationClass::Symmetric | RelationClass::Unclassified => Resolution {
                contradiction: contradiction.clone(),
                action: ResolutionAction::KeepBoth,
                rationale: format!(
                    "'{}' is not directional; both directions are valid",
                    contradiction.rel_type
                ),
                score: 0.0,
                ambiguous: false,
            },
        }
    }

    fn resolve_hierarchical(
        &self,
        graph: &ConceptGraph,
        contradiction: &Contradiction,
    ) -> Resolution {
        let (Some(a), Some(b), Some(rule)) = (
            graph.get(&contradiction.a),
            graph.get(&contradiction.b),
            self.taxonomy.hierarchy_rule(&contradiction.rel_type),
        ) else {
            return Resolution {
                contradiction: contradiction.clone(),
                action: ResolutionAction::KeepBoth,
                rationale: "concept missing from graph; left for review".to_string(),
                score: 0.0,
                ambiguous: true,
            };
        };

        let ctx = ResolutionContext {
            graph,
            taxonomy: &self.taxonomy,
            a,
            b,
            rel_type: &contradiction.rel_type,
            rule,
        };
        let mut score = 0.0;
        let mut reasons = Vec::new();
        for scoring_rule in self.rules.iter() {
            let vote = scoring_rule.vote(&ctx);
            if vote.is_abstention() {
                continue;
            }
            score += scoring_rule.weight() * vote.score * vote.confidence;
            reasons.push(format!("{} ({})", scoring_rule.name(), vote.reason));
        }

        if score.abs() < DECISION_EPSILON {
            return self.tie_break(contradiction, rule.on_tie, reasons);
        }

        let (general, specific) = if score > 0.0 { (a, b) } else { (b, a) };
        // Keep the edge whose source plays the role the relation type gives its source.
        let (keep_from, keep_to) = match rule.source_is {
            Generality::General => (general, specific),
            Generality::Specific => (specific, general),
        };
        Resolution {
            contradiction: contradiction.clone(),
            action: ResolutionAction::Remove {
                from: keep_to.id.clone(),
                to: keep_from.id.clone(),
            },
            rationale: format!(
                "{} judged more general than {}; kept {} -[{}]-> {} (score {score:+.2}: {})",
                general.id,
                specific.id,
                keep_from.id,
                contradiction.rel_type,
                keep_to.id,
                reasons.join(", ")
            ),
            score,
            ambiguous: false,
        }
    }

    fn tie_break(
        &self,
        contradiction: &Contradiction,
        on_tie: TieBreak,
        reasons: Vec<String>,
    ) -> Resolution {
        let signals = if reasons.is_empty() {
            "no signal".to_string()
        } else {
            format!("signals cancel out: {}", reasons.join(", "))
        };
        match on_tie {
            TieBreak::KeepBoth => {
                tracing::warn!(
                    "Ambiguous contradiction {contradiction} ({signals}); keeping both directions \
                     for operator review"
                );
                Resolution {
                    contradiction: contradiction.clone(),
                    action: ResolutionAction::KeepBoth,
                    rationale: format!("ambiguous: {signals}; needs operator review"),
                    score: 0.0,
                    ambiguous: true,
                }
            }
            TieBreak::RemoveLaterDiscovered => Resolution {
                contradiction: contradiction.clone(),
                action: ResolutionAction::Remove {
                    from: contradiction.b.clone(),
                    to: contradiction.a.clone(),
                },
                rationale: format!(
                    "{signals}; removed later-discovered direction {} -> {} to break a potential \
                     cycle",
                    contradiction.b, contradiction.a
                ),
                score: 0.0,
                ambiguous: false,
            },
        }
    }
}

#[cfg(test)]
mod tests;
