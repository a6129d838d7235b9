use crate::domain::model::{DependantMap, TallyTable};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Directed dependant graph built from the inverse map: an edge from a
/// package to each package that depends on it.
struct DependantGraph<'a> {
    graph: DiGraph<&'a str, ()>,
    nodes: HashMap<&'a str, NodeIndex>,
}

impl<'a> DependantGraph<'a> {
    fn build(map: &'a DependantMap) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<&'a str, NodeIndex> = HashMap::new();

        for (name, dependants) in map.iter() {
            let from = Self::ensure_node(&mut graph, &mut nodes, name);
            for dependant in dependants {
                let to = Self::ensure_node(&mut graph, &mut nodes, dependant);
                graph.add_edge(from, to, ());
            }
        }

        Self { graph, nodes }
    }

    fn ensure_node(
        graph: &mut DiGraph<&'a str, ()>,
        nodes: &mut HashMap<&'a str, NodeIndex>,
        name: &'a str,
    ) -> NodeIndex {
        if let Some(&index) = nodes.get(name) {
            index
        } else {
            let index = graph.add_node(name);
            nodes.insert(name, index);
            index
        }
    }

    /// Every package reachable from `name` through any chain of dependant
    /// edges. The starting package is not its own dependant, cycles or not.
    fn reachable_from(&self, name: &str) -> BTreeSet<String> {
        let mut reached = BTreeSet::new();
        let Some(&start) = self.nodes.get(name) else {
            return reached;
        };

        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for neighbor in self.graph.neighbors(current) {
                if visited.insert(neighbor) {
                    reached.insert(self.graph[neighbor].to_string());
                    queue.push_back(neighbor);
                }
            }
        }

        // A cycle can lead back to the start; it still is not listed.
        reached.remove(name);
        reached
    }
}

/// Expands the direct dependant map to its transitive closure, keyed by the
/// same names the direct map has entries for.
pub fn transitive_dependants(map: &DependantMap) -> DependantMap {
    let graph = DependantGraph::build(map);
    let mut transitive = DependantMap::new();
    for (name, _) in map.iter() {
        transitive.insert(name.clone(), graph.reachable_from(name));
    }
    transitive
}

/// Per-name transitive dependant counts, ready for ranking.
pub fn transitive_counts(map: &DependantMap) -> TallyTable {
    let graph = DependantGraph::build(map);
    let mut table = TallyTable::new();
    for (name, _) in map.iter() {
        table.set(name.clone(), graph.reachable_from(name).len() as u64);
    }
    table
}
