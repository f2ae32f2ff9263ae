//! Relation-type taxonomy.
//!
//! Every relation type found in a `{rel: type}` annotation belongs to at most one class:
//!
//! - **Hierarchical**: directional; the same type must never hold in both directions between
//!   two concepts.
//! - **Symmetric**: holding in both directions is valid.
//! - **Context-dependent**: direction is ambiguous; a bidirectional occurrence is repaired with a
//!   deterministic, low-confidence tie-break.
//!
//! The assignment is plain data ([`RelationTaxonomy`]) so it can be overridden from the
//! `[taxonomy]` table of the configuration file and tested independently of the resolver.

use crate::error::ConceptLinkError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationClass {
    Hierarchical,
    Symmetric,
    ContextDependent,
    /// Not listed in any class. Indexed, never treated as a contradiction.
    Unclassified,
}

/// Which side of a hierarchical edge `source --type--> target` is the more general (or more
/// fundamental) concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Generality {
    /// `source` is the general side, e.g. `generalizes`, `prerequisite_of`.
    General,
    /// `source` is the specific side, e.g. `example_of`, `part_of`.
    Specific,
}

/// Title vocabulary used by the keyword scoring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vocabulary {
    /// general vs specific words ("overview", "example", ...)
    Generality,
    /// fundamental vs advanced words ("basic", "advanced", ...)
    Fundamentality,
}

/// Fallback when no heuristic signal decides a hierarchical contradiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Leave both directions in place and warn for operator review.
    KeepBoth,
    /// Remove the direction encountered second during detection.
    RemoveLaterDiscovered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyRule {
    pub source_is: Generality,
    pub vocabulary: Vocabulary,
    pub on_tie: TieBreak,
}

impl HierarchyRule {
    pub const fn new(source_is: Generality, vocabulary: Vocabulary, on_tie: TieBreak) -> Self {
        HierarchyRule {
            source_is,
            vocabulary,
            on_tie,
        }
    }
}

/// An id-substring pair forcing the generality decision: a concept whose id contains `general`
/// outranks one whose id contains `specific`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainOverride {
    pub general: String,
    pub specific: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSet {
    pub general: Vec<String>,
    pub specific: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationTaxonomy {
    pub hierarchical: BTreeMap<String, HierarchyRule>,
    pub symmetric: BTreeSet<String>,
    pub context_dependent: BTreeSet<String>,
    pub domain_overrides: Vec<DomainOverride>,
    pub generality_keywords: KeywordSet,
    pub fundamentality_keywords: KeywordSet,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for RelationTaxonomy {
    fn default() -> Self {
        use self::Generality::{General, Specific};
        use TieBreak::*;
        use Vocabulary::*;

        let hierarchical = [
            ("prerequisite_of", General, Fundamentality, RemoveLaterDiscovered),
            ("has_prerequisite", Specific, Fundamentality, RemoveLaterDiscovered),
            ("example_of", Specific, Generality, KeepBoth),
            ("extends", Specific, Generality, KeepBoth),
            ("specializes", Specific, Generality, KeepBoth),
            ("generalizes", General, Generality, KeepBoth),
            ("part_of", Specific, Generality, KeepBoth),
            ("has_part", General, Generality, KeepBoth),
            ("cause_of", General, Generality, KeepBoth),
            ("caused_by", Specific, Generality, KeepBoth),
            ("defines", General, Generality, KeepBoth),
            ("has_subtype", General, Generality, KeepBoth),
        ]
        .into_iter()
        .map(|(name, source_is, vocabulary, on_tie)| {
            (
                name.to_string(),
                HierarchyRule::new(source_is, vocabulary, on_tie),
            )
        })
        .collect();

        let symmetric = [
            "contrasts_with",
            "antonym",
            "related_to",
            "related",
            "analogous_to",
            "complements",
            "derivationally_related",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let context_dependent = [
            "used_in",
            "uses",
            "used_by",
            "member_of",
            "applies_to",
            "supported_by",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        RelationTaxonomy {
            hierarchical,
            symmetric,
            context_dependent,
            domain_overrides: vec![
                DomainOverride {
                    general: "fundamentals".to_string(),
                    specific: "advanced".to_string(),
                },
                DomainOverride {
                    general: "introduction".to_string(),
                    specific: "applications".to_string(),
                },
                DomainOverride {
                    general: "overview".to_string(),
                    specific: "case-study".to_string(),
                },
            ],
            generality_keywords: KeywordSet {
                general: words(&[
                    "introduction",
                    "overview",
                    "fundamentals",
                    "basics",
                    "principles",
                    "theory",
                    "general",
                    "concept",
                    "framework",
                ]),
                specific: words(&[
                    "example",
                    "case",
                    "instance",
                    "application",
                    "specific",
                    "variant",
                    "special",
                    "implementation",
                ]),
            },
            fundamentality_keywords: KeywordSet {
                general: words(&[
                    "basic",
                    "basics",
                    "fundamental",
                    "fundamentals",
                    "introduction",
                    "intro",
                    "foundation",
                    "elementary",
                    "principles",
                    "core",
                ]),
                specific: words(&[
                    "advanced",
                    "complex",
                    "applied",
                    "application",
                    "expert",
                    "specialized",
                    "optimization",
                ]),
            },
        }
    }
}

impl RelationTaxonomy {
    pub fn class_of(&self, rel_type: &str) -> RelationClass {
        if self.hierarchical.contains_key(rel_type) {
            RelationClass::Hierarchical
        } else if self.symmetric.contains(rel_type) {
            RelationClass::Symmetric
        } else if self.context_dependent.contains(rel_type) {
            RelationClass::ContextDependent
        } else {
            RelationClass::Unclassified
        }
    }

    pub fn hierarchy_rule(&self, rel_type: &str) -> Option<&HierarchyRule> {
        self.hierarchical.get(rel_type)
    }

    /// Whether a bidirectional occurrence of `rel_type` must be reported as a contradiction.
    pub fn is_directional(&self, rel_type: &str) -> bool {
        matches!(
            self.class_of(rel_type),
            RelationClass::Hierarchical | RelationClass::ContextDependent
        )
    }

    pub fn keywords(&self, vocabulary: Vocabulary) -> &KeywordSet {
        match vocabulary {
            Vocabulary::Generality => &self.generality_keywords,
            Vocabulary::Fundamentality => &self.fundamentality_keywords,
        }
    }

    /// Checks that no relation type is assigned to more than one class.
    pub fn validate(&self) -> Result<(), ConceptLinkError> {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        let classes = [
            ("hierarchical", self.hierarchical.keys().collect::<Vec<_>>()),
            ("symmetric", self.symmetric.iter().collect()),
            ("context_dependent", self.context_dependent.iter().collect()),
        ];
        for (class, names) in classes.iter() {
            for name in names {
                if let Some(prior) = seen.insert(name.as_str(), *class) {
                    return Err(ConceptLinkError::Config(format!(
                        "relation type '{name}' is listed as both {prior} and {class}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classes() {
        let taxonomy = RelationTaxonomy::default();
        assert_eq!(
            taxonomy.class_of("prerequisite_of"),
            RelationClass::Hierarchical
        );
        assert_eq!(taxonomy.class_of("antonym"), RelationClass::Symmetric);
        assert_eq!(
            taxonomy.class_of("used_in"),
            RelationClass::ContextDependent
        );
        assert_eq!(
            taxonomy.class_of("mentions"),
            RelationClass::Unclassified
        );
        assert!(taxonomy.is_directional("example_of"));
        assert!(taxonomy.is_directional("uses"));
        assert!(!taxonomy.is_directional("contrasts_with"));
        taxonomy.validate().unwrap();
    }

    #[test]
    fn test_tie_break_asymmetry() {
        let taxonomy = RelationTaxonomy::default();
        assert_eq!(
            taxonomy.hierarchy_rule("prerequisite_of").unwrap().on_tie,
            TieBreak::RemoveLaterDiscovered
        );
        for rel in ["example_of", "extends", "specializes", "generalizes"] {
            assert_eq!(
                taxonomy.hierarchy_rule(rel).unwrap().on_tie,
                TieBreak::KeepBoth
            );
        }
    }

    #[test]
    fn test_default_rule_orientation_and_vocabulary() {
        let taxonomy = RelationTaxonomy::default();
        let rule = |rel: &str| taxonomy.hierarchy_rule(rel).unwrap().clone();
        assert_eq!(
            rule("prerequisite_of"),
            HierarchyRule::new(
                Generality::General,
                Vocabulary::Fundamentality,
                TieBreak::RemoveLaterDiscovered
            )
        );
        assert_eq!(
            rule("example_of"),
            HierarchyRule::new(Generality::Specific, Vocabulary::Generality, TieBreak::KeepBoth)
        );
        assert_eq!(rule("has_part").source_is, Generality::General);
        assert_eq!(rule("caused_by").source_is, Generality::Specific);
    }

    #[test]
    fn test_overlapping_classes_rejected() {
        let mut taxonomy = RelationTaxonomy::default();
        taxonomy.symmetric.insert("example_of".to_string());
        assert!(matches!(
            taxonomy.validate(),
            Err(ConceptLinkError::Config(_))
        ));
    }

    #[test]
    fn test_taxonomy_from_toml() {
        let toml_str = r#"
symmetric = ["sibling_of"]
context_dependent = []

[hierarchical.child_of]
source_is = "specific"
vocabulary = "generality"
on_tie = "keep_both"
"#;
        let taxonomy: RelationTaxonomy = toml::from_str(toml_str).unwrap();
        assert_eq!(taxonomy.class_of("child_of"), RelationClass::Hierarchical);
        assert_eq!(taxonomy.class_of("sibling_of"), RelationClass::Symmetric);
        assert_eq!(taxonomy.class_of("used_in"), RelationClass::Unclassified);
        // Keyword sets fall back to defaults when not given
        assert!(!taxonomy.generality_keywords.general.is_empty());
    }
}
