use super::*;
use crate::{graph::ConceptNode, links::TypedLink};
use test_log::test;

fn node(id: &str, title: &str, file: &str, typed: &[(&str, &str)]) -> ConceptNode {
    let mut node = ConceptNode::new(id, title, file);
    node.typed_links_to = typed
        .iter()
        .map(|(to, rel)| TypedLink::new(*to, *rel))
        .collect();
    node.links_to = typed.iter().map(|(to, _)| to.to_string()).collect();
    node
}

fn graph(nodes: Vec<ConceptNode>) -> ConceptGraph {
    let mut graph = ConceptGraph::new();
    for n in nodes {
        graph.insert_node(n);
    }
    graph.link_backrefs();
    graph.infer_two_hop();
    graph
}

fn run(graph: &mut ConceptGraph) -> (ContradictionResolver, Vec<Resolution>) {
    let resolver = ContradictionResolver::new(RelationTaxonomy::default());
    let contradictions = resolver.detect(graph);
    let resolutions = resolver.resolve_all(graph, &contradictions);
    apply_resolutions(graph, &resolutions);
    (resolver, resolutions)
}

#[test]
fn test_prerequisite_tie_removes_later_direction() {
    let mut g = graph(vec![
        node("x", "X", "x.md", &[("y", "prerequisite_of")]),
        node("y", "Y", "y.md", &[("x", "prerequisite_of")]),
    ]);
    let (resolver, resolutions) = run(&mut g);
    assert_eq!(resolutions.len(), 1);
    assert_eq!(
        resolutions[0].action.to_string(),
        "remove_y_to_x"
    );
    assert!(!resolutions[0].ambiguous);

    let survivors = [
        g.has_typed_edge("x", "y", "prerequisite_of"),
        g.has_typed_edge("y", "x", "prerequisite_of"),
    ];
    assert_eq!(survivors.iter().filter(|s| **s).count(), 1);
    assert!(resolver.detect(&g).is_empty());
    assert!(unresolved_after_apply(&g, resolver.taxonomy(), &resolutions).is_empty());
}

#[test]
fn test_title_signal_orients_prerequisite() {
    // b is the basic concept, so b -> a survives even though a sorts first.
    let mut g = graph(vec![
        node(
            "algebra-advanced-topics",
            "Advanced Algebra",
            "algebra-advanced-topics.md",
            &[("algebra-basics", "prerequisite_of")],
        ),
        node(
            "algebra-basics",
            "Basic Algebra",
            "algebra-basics.md",
            &[("algebra-advanced-topics", "prerequisite_of")],
        ),
    ]);
    let (_, resolutions) = run(&mut g);
    assert!(resolutions[0].score < 0.0);
    assert_eq!(
        resolutions[0].action,
        ResolutionAction::Remove {
            from: "algebra-advanced-topics".to_string(),
            to: "algebra-basics".to_string(),
        }
    );
    assert!(g.has_typed_edge(
        "algebra-basics",
        "algebra-advanced-topics",
        "prerequisite_of"
    ));
}

#[test]
fn test_specific_source_keeps_specific_to_general() {
    // example_of points from the specific concept to the general one.
    let mut g = graph(vec![
        node(
            "pricing-example",
            "Pricing Example",
            "finance/options/pricing-example.md",
            &[("pricing-theory", "example_of")],
        ),
        node(
            "pricing-theory",
            "Pricing Theory",
            "finance/pricing-theory.md",
            &[("pricing-example", "example_of")],
        ),
    ]);
    let (_, resolutions) = run(&mut g);
    assert!(resolutions[0].rationale.contains("pricing-theory judged more general"));
    assert!(g.has_typed_edge("pricing-example", "pricing-theory", "example_of"));
    assert!(!g.has_typed_edge("pricing-theory", "pricing-example", "example_of"));
}

#[test]
fn test_example_of_tie_keeps_both() {
    let mut g = graph(vec![
        node("p", "P", "p.md", &[("q", "example_of")]),
        node("q", "Q", "q.md", &[("p", "example_of")]),
    ]);
    let (resolver, resolutions) = run(&mut g);
    assert!(resolutions[0].action.is_keep_both());
    assert!(resolutions[0].ambiguous);
    assert!(resolutions[0].rationale.starts_with("ambiguous"));
    assert!(g.has_typed_edge("p", "q", "example_of"));
    assert!(g.has_typed_edge("q", "p", "example_of"));
    // Still reported, but not as an unresolved determinate resolution
    assert_eq!(resolver.detect(&g).len(), 1);
    assert!(unresolved_after_apply(&g, resolver.taxonomy(), &resolutions).is_empty());

    let summary = ResolutionSummary::from_resolutions(&resolutions);
    assert_eq!(summary.ambiguous, 1);
    assert_eq!(summary.kept_both, 1);
    assert_eq!(summary.removed, 0);
}

#[test]
fn test_symmetric_never_detected_or_removed() {
    let mut g = graph(vec![
        node("call-option", "Call Option", "call-option.md", &[("put-option", "antonym")]),
        node("put-option", "Put Option", "put-option.md", &[("call-option", "antonym")]),
    ]);
    let (_, resolutions) = run(&mut g);
    assert!(resolutions.is_empty());
    assert!(g.has_typed_edge("call-option", "put-option", "antonym"));
    assert!(g.has_typed_edge("put-option", "call-option", "antonym"));

    // Resolved directly, a symmetric pair is kept
    let resolver = ContradictionResolver::new(RelationTaxonomy::default());
    let c = Contradiction::new("put-option", "call-option", "antonym", RelationClass::Symmetric);
    assert_eq!(c.a, "call-option");
    assert!(resolver.resolve(&g, &c).action.is_keep_both());
}

#[test]
fn test_context_dependent_tie_break() {
    let mut g = graph(vec![
        node("m", "M", "m.md", &[("n", "used_in")]),
        node("n", "N", "n.md", &[("m", "used_in")]),
    ]);
    let (resolver, resolutions) = run(&mut g);
    assert_eq!(resolutions.len(), 1);
    assert_eq!(resolutions[0].contradiction.class, RelationClass::ContextDependent);
    assert!(resolutions[0].rationale.starts_with("low-confidence:"));
    assert!(g.has_typed_edge("m", "n", "used_in"));
    assert!(!g.has_typed_edge("n", "m", "used_in"));
    assert!(resolver.detect(&g).is_empty());
}

#[test]
fn test_detection_dedupes_and_ignores_self_and_unclassified() {
    let g = graph(vec![
        node(
            "a",
            "A",
            "a.md",
            &[("b", "prerequisite_of"), ("a", "prerequisite_of"), ("b", "mentions")],
        ),
        node("b", "B", "b.md", &[("a", "prerequisite_of"), ("a", "mentions")]),
    ]);
    let contradictions = detect_contradictions(&g, &RelationTaxonomy::default());
    assert_eq!(
        contradictions,
        vec![Contradiction::new(
            "a",
            "b",
            "prerequisite_of",
            RelationClass::Hierarchical
        )]
    );
}

#[test]
fn test_apply_is_idempotent() {
    let mut g = graph(vec![
        node("x", "X", "x.md", &[("y", "prerequisite_of")]),
        node("y", "Y", "y.md", &[("x", "prerequisite_of")]),
    ]);
    let (_, resolutions) = run(&mut g);
    let snapshot = g.clone();
    assert_eq!(apply_resolutions(&mut g, &resolutions), 0);
    assert_eq!(g, snapshot);
}

#[test]
fn test_action_serializes_as_string() {
    let action = ResolutionAction::Remove {
        from: "a".to_string(),
        to: "b".to_string(),
    };
    assert_eq!(serde_json::to_string(&action).unwrap(), "\"remove_a_to_b\"");
    assert_eq!(
        serde_json::to_string(&ResolutionAction::KeepBoth).unwrap(),
        "\"keep_both\""
    );
}

#[test]
fn test_incoming_links_outrank_sequence_order() {
    // lesson-5 is linked from 11 concepts and lesson-1 from 10; sequence order alone would favor
    // lesson-1.
    let mut nodes = vec![
        node("lesson-1", "Lesson One", "lesson-1.md", &[("lesson-5", "prerequisite_of")]),
        node("lesson-5", "Lesson Five", "lesson-5.md", &[("lesson-1", "prerequisite_of")]),
    ];
    for i in 0..19 {
        let target = if i < 9 { "lesson-1" } else { "lesson-5" };
        let mut reader = node(&format!("reader-{i:02}"), "Reader", "reader.md", &[]);
        reader.links_to = vec![target.to_string()];
        nodes.push(reader);
    }
    let mut g = graph(nodes);
    assert_eq!(g.incoming_count("lesson-1"), 10);
    assert_eq!(g.incoming_count("lesson-5"), 11);

    let (_, resolutions) = run(&mut g);
    assert_eq!(resolutions.len(), 1);
    assert!(resolutions[0].score < 0.0);
    assert_eq!(
        resolutions[0].action,
        ResolutionAction::Remove {
            from: "lesson-1".to_string(),
            to: "lesson-5".to_string(),
        }
    );
    assert!(g.has_typed_edge("lesson-5", "lesson-1", "prerequisite_of"));
    assert!(!g.has_typed_edge("lesson-1", "lesson-5", "prerequisite_of"));
}
