//! Cycle reporting over the untyped `links_to` graph.
//!
//! Cycles are informational: they are logged for the operator and never broken automatically.

use super::ConceptGraph;
use petgraph::{
    graphmap::DiGraphMap,
    visit::{depth_first_search, DfsEvent},
};

/// Ordered path from a node back to itself, e.g. `["a", "b", "a"]`.
pub type Cycle = Vec<String>;

/// Depth-first search from every node in sorted id order. Each back edge `u -> v` closes a cycle
/// running from `v` along the current DFS stack to `u` and back to `v`.
#[tracing::instrument(skip_all)]
pub fn detect_cycles(graph: &ConceptGraph) -> Vec<Cycle> {
    let mut link_graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for id in graph.nodes.keys() {
        link_graph.add_node(id.as_str());
    }
    for (id, node) in graph.nodes.iter() {
        for target in node.links_to.iter() {
            if graph.contains(target) {
                link_graph.add_edge(id.as_str(), target.as_str(), ());
            }
        }
    }

    let mut stack: Vec<&str> = Vec::new();
    let mut cycles: Vec<Cycle> = Vec::new();
    depth_first_search(&link_graph, graph.nodes.keys().map(String::as_str), |event| {
        match event {
            DfsEvent::Discover(id, _) => stack.push(id),
            DfsEvent::Finish(_, _) => {
                stack.pop();
            }
            DfsEvent::BackEdge(_, closing) => {
                if let Some(start) = stack.iter().rposition(|id| *id == closing) {
                    let mut cycle: Cycle = stack[start..].iter().map(|id| id.to_string()).collect();
                    cycle.push(closing.to_string());
                    cycles.push(cycle);
                }
            }
            DfsEvent::TreeEdge(_, _) | DfsEvent::CrossForwardEdge(_, _) => {}
        }
    });

    for cycle in cycles.iter() {
        tracing::info!("Link cycle: {}", cycle.join(" -> "));
    }
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ConceptNode;

    fn graph(edges: &[(&str, &[&str])]) -> ConceptGraph {
        let mut graph = ConceptGraph::new();
        for (id, links) in edges {
            let mut node = ConceptNode::new(*id, *id, format!("{id}.md"));
            node.links_to = links.iter().map(|s| s.to_string()).collect();
            graph.insert_node(node);
        }
        graph.link_backrefs();
        graph
    }

    #[test]
    fn test_two_cycle_reported_once() {
        let g = graph(&[("a", &["b"]), ("b", &["a"])]);
        assert_eq!(detect_cycles(&g), vec![vec!["a", "b", "a"]]);
    }

    #[test]
    fn test_acyclic_and_broken_targets() {
        let g = graph(&[("a", &["b", "ghost"]), ("b", &["c"]), ("c", &[])]);
        assert!(detect_cycles(&g).is_empty());
    }

    #[test]
    fn test_self_loop_and_longer_cycle() {
        let g = graph(&[
            ("a", &["b"]),
            ("b", &["c"]),
            ("c", &["a"]),
            ("d", &["d"]),
        ]);
        assert_eq!(
            detect_cycles(&g),
            vec![vec!["a", "b", "c", "a"], vec!["d", "d"]]
        );
    }
}
