use std::collections::{HashMap, HashSet, VecDeque};

use common::storage::types::relation::Relation;

/// Object ids reachable from `seeds` within `depth` undirected hops over
/// the relation set. The seeds themselves are not included in the result.
pub fn reachable_objects(
    seeds: &HashSet<String>,
    relations: &[Relation],
    depth: usize,
) -> HashSet<String> {
    if depth == 0 || seeds.is_empty() || relations.is_empty() {
        return HashSet::new();
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for relation in relations {
        if relation.from_id == relation.to_id {
            continue;
        }
        adjacency
            .entry(relation.from_id.as_str())
            .or_default()
            .push(relation.to_id.as_str());
        adjacency
            .entry(relation.to_id.as_str())
            .or_default()
            .push(relation.from_id.as_str());
    }

    let mut visited: HashSet<&str> = seeds.iter().map(String::as_str).collect();
    let mut queue: VecDeque<(&str, usize)> =
        seeds.iter().map(|seed| (seed.as_str(), 0usize)).collect();
    let mut reached: HashSet<String> = HashSet::new();

    while let Some((node, hops)) = queue.pop_front() {
        if hops >= depth {
            continue;
        }
        let Some(neighbors) = adjacency.get(node) else {
            continue;
        };
        for neighbor in neighbors {
            if visited.insert(neighbor) {
                reached.insert((*neighbor).to_owned());
                queue.push_back((neighbor, hops + 1));
            }
        }
    }

    reached
}
