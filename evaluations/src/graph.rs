use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use common::storage::types::relation::Relation;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDegree {
    pub id: String,
    pub degree: usize,
}

/// Topology of the relation set viewed as an undirected simple graph.
/// Bidirectionally-emitted similarity edges collapse to one edge via
/// `(min, max)` pair deduplication before anything is counted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphReport {
    pub node_count: usize,
    pub edge_count: usize,
    pub graph_density: f64,
    pub avg_clustering_coefficient: f64,
    pub connected_components: usize,
    /// Undirected form `2E/N`. (A directed `E/N` reading exists in the
    /// wild; this implementation reports the undirected one.)
    pub avg_degree: f64,
    pub max_degree: usize,
    pub top_nodes: Vec<NodeDegree>,
}

pub fn evaluate_graph(relations: &[Relation]) -> GraphReport {
    // Deduplicate to undirected simple edges; self-references contribute a
    // node but no edge.
    let mut edges: BTreeSet<(String, String)> = BTreeSet::new();
    let mut adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for relation in relations {
        adjacency.entry(relation.from_id.clone()).or_default();
        adjacency.entry(relation.to_id.clone()).or_default();
        if relation.from_id == relation.to_id {
            continue;
        }
        edges.insert(relation.pair_key());
    }
    for (a, b) in &edges {
        adjacency.entry(a.clone()).or_default().insert(b.clone());
        adjacency.entry(b.clone()).or_default().insert(a.clone());
    }

    let node_count = adjacency.len();
    let edge_count = edges.len();
    if node_count == 0 {
        return GraphReport::default();
    }

    #[allow(clippy::cast_precision_loss)]
    let graph_density = if node_count < 2 {
        0.0
    } else {
        let possible = node_count as f64 * (node_count as f64 - 1.0) / 2.0;
        edge_count as f64 / possible
    };

    let avg_clustering_coefficient = average_clustering(&adjacency);
    let connected_components = count_components(&adjacency);

    let mut degrees: Vec<NodeDegree> = adjacency
        .iter()
        .map(|(id, neighbors)| NodeDegree {
            id: id.clone(),
            degree: neighbors.len(),
        })
        .collect();
    // Highest degree first; ties resolve by id for determinism.
    degrees.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.id.cmp(&b.id)));

    let max_degree = degrees.first().map_or(0, |node| node.degree);
    #[allow(clippy::cast_precision_loss)]
    let avg_degree = 2.0 * edge_count as f64 / node_count as f64;
    let top_nodes = degrees.into_iter().take(3).collect();

    GraphReport {
        node_count,
        edge_count,
        graph_density,
        avg_clustering_coefficient,
        connected_components,
        avg_degree,
        max_degree,
        top_nodes,
    }
}

/// Mean over nodes of degree ≥ 2 of `neighbor_edges / C(k, 2)`.
fn average_clustering(adjacency: &BTreeMap<String, BTreeSet<String>>) -> f64 {
    let mut coefficients = Vec::new();

    for neighbors in adjacency.values() {
        let degree = neighbors.len();
        if degree < 2 {
            continue;
        }

        let neighbor_list: Vec<&String> = neighbors.iter().collect();
        let mut neighbor_edges = 0usize;
        for (i, a) in neighbor_list.iter().enumerate() {
            for b in neighbor_list.iter().skip(i + 1) {
                if adjacency.get(*a).is_some_and(|set| set.contains(*b)) {
                    neighbor_edges += 1;
                }
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let possible = (degree * (degree - 1) / 2) as f64;
        #[allow(clippy::cast_precision_loss)]
        coefficients.push(neighbor_edges as f64 / possible);
    }

    #[allow(clippy::cast_precision_loss)]
    if coefficients.is_empty() {
        0.0
    } else {
        coefficients.iter().sum::<f64>() / coefficients.len() as f64
    }
}

fn count_components(adjacency: &BTreeMap<String, BTreeSet<String>>) -> usize {
    let mut visited: HashSet<&String> = HashSet::new();
    let mut components = 0usize;

    for start in adjacency.keys() {
        if visited.contains(start) {
            continue;
        }
        components += 1;
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            if let Some(neighbors) = adjacency.get(node) {
                for neighbor in neighbors {
                    if !visited.contains(neighbor) {
                        stack.push(neighbor);
                    }
                }
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::relation::{RelationSource, RelationType};

    fn edge(from: &str, to: &str) -> Relation {
        Relation::new(from, to, RelationType::SimilarTo, RelationSource::Computed, 0.9)
    }

    #[test]
    fn test_empty_relations() {
        assert_eq!(evaluate_graph(&[]), GraphReport::default());
    }

    #[test]
    fn test_bidirectional_pair_counts_once() {
        let report = evaluate_graph(&[edge("a", "b"), edge("b", "a")]);
        assert_eq!(report.node_count, 2);
        assert_eq!(report.edge_count, 1);
        assert!((report.graph_density - 1.0).abs() < 1e-12);
        assert!((report.avg_degree - 1.0).abs() < 1e-12);
        assert_eq!(report.connected_components, 1);
    }

    #[test]
    fn test_triangle_clustering_is_one() {
        let report = evaluate_graph(&[edge("a", "b"), edge("b", "c"), edge("a", "c")]);
        assert_eq!(report.node_count, 3);
        assert_eq!(report.edge_count, 3);
        assert!((report.avg_clustering_coefficient - 1.0).abs() < 1e-12);
        assert_eq!(report.max_degree, 2);
        assert!((report.avg_degree - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_star_clustering_is_zero() {
        let report = evaluate_graph(&[edge("hub", "a"), edge("hub", "b"), edge("hub", "c")]);
        // Only the hub has degree ≥ 2 and none of its neighbors connect.
        assert!((report.avg_clustering_coefficient).abs() < 1e-12);
        assert_eq!(report.max_degree, 3);
        assert_eq!(report.top_nodes[0].id, "hub");
    }

    #[test]
    fn test_components_counted_with_dangling_targets() {
        let report = evaluate_graph(&[edge("a", "b"), edge("c", "d")]);
        assert_eq!(report.connected_components, 2);
        assert_eq!(report.node_count, 4);
    }

    #[test]
    fn test_self_reference_contributes_node_not_edge() {
        let report = evaluate_graph(&[edge("a", "a"), edge("a", "b")]);
        assert_eq!(report.node_count, 2);
        assert_eq!(report.edge_count, 1);
    }

    #[test]
    fn test_top_nodes_limited_to_three_deterministic() {
        let report = evaluate_graph(&[
            edge("hub", "a"),
            edge("hub", "b"),
            edge("hub", "c"),
            edge("a", "b"),
        ]);
        assert_eq!(report.top_nodes.len(), 3);
        assert_eq!(report.top_nodes[0].id, "hub");
        // a and b tie at degree 2; order falls back to id.
        assert_eq!(report.top_nodes[1].id, "a");
        assert_eq!(report.top_nodes[2].id, "b");
    }
}
