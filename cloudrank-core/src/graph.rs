use crate::data::Database;
use cloudrank_scanner::result::{EdgeKind, UserId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Weighted directed interaction graph.
///
/// Parallel interactions between the same two users collapse into one edge
/// whose weight is the number of interactions. A node exists once it is the
/// source or target of an edge, so users referenced but never crawled are
/// nodes too.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    out: HashMap<UserId, BTreeMap<UserId, u64>>,
    out_weight: HashMap<UserId, u64>,
    nodes: BTreeSet<UserId>,
    labels: HashMap<UserId, String>,
    edge_count: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `weight` to the edge `source -> target`, creating it if needed.
    pub fn add_edge(&mut self, source: UserId, target: UserId, weight: u64) {
        let targets = self.out.entry(source).or_default();
        let entry = targets.entry(target).or_insert_with(|| {
            self.edge_count += 1;
            0
        });
        *entry += weight;
        *self.out_weight.entry(source).or_insert(0) += weight;
        self.nodes.insert(source);
        self.nodes.insert(target);
    }

    pub fn weight(&self, source: UserId, target: UserId) -> u64 {
        self.out
            .get(&source)
            .and_then(|targets| targets.get(&target))
            .copied()
            .unwrap_or(0)
    }

    /// Summed weight of every edge leaving `id`. Zero for dangling nodes.
    pub fn out_weight(&self, id: UserId) -> u64 {
        self.out_weight.get(&id).copied().unwrap_or(0)
    }

    /// Outgoing edges of `id` with their weights, by ascending target.
    pub fn neighbors(&self, id: UserId) -> impl Iterator<Item = (UserId, u64)> + '_ {
        self.out
            .get(&id)
            .into_iter()
            .flat_map(|targets| targets.iter().map(|(t, w)| (*t, *w)))
    }

    /// All nodes, ascending.
    pub fn nodes(&self) -> impl Iterator<Item = UserId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Distinct `(source, target)` pairs.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn label(&self, id: UserId) -> Option<&str> {
        self.labels.get(&id).map(String::as_str)
    }

    pub fn set_label(&mut self, id: UserId, label: impl Into<String>) {
        self.labels.insert(id, label.into());
    }
}

/// Builds the interaction graph from everything stored in `db`.
///
/// Each row of the four edge tables adds weight 1 to its `(source, target)`
/// pair. Users are attached as labels (their profile URL).
pub fn build_graph(db: &Database) -> rusqlite::Result<Graph> {
    let mut graph = Graph::new();
    let users = db.user_urls()?;
    info!("Building graph from {} stored users", users.len());

    for (id, url) in users {
        graph.set_label(id, url);

        for kind in EdgeKind::ALL {
            let targets = db.edge_targets(id, kind)?;
            debug!("User {}: {} {} edges", id, targets.len(), kind.as_str());
            for target in targets {
                graph.add_edge(id, target, 1);
            }
        }
    }

    info!(
        "Graph built: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_edges_accumulate() {
        let mut graph = Graph::new();
        graph.add_edge(1, 2, 1);
        graph.add_edge(1, 2, 2);
        graph.add_edge(1, 3, 1);

        assert_eq!(graph.weight(1, 2), 3);
        assert_eq!(graph.weight(2, 1), 0);
        assert_eq!(graph.out_weight(1), 4);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_targets_become_nodes() {
        let mut graph = Graph::new();
        graph.add_edge(5, 9, 1);

        assert!(graph.contains(9));
        assert_eq!(graph.out_weight(9), 0);
        assert_eq!(graph.nodes().collect::<Vec<_>>(), vec![5, 9]);
    }

    #[test]
    fn test_neighbors_sorted_by_target() {
        let mut graph = Graph::new();
        graph.add_edge(1, 30, 1);
        graph.add_edge(1, 10, 2);
        graph.add_edge(1, 20, 1);

        let neighbors: Vec<_> = graph.neighbors(1).collect();
        assert_eq!(neighbors, vec![(10, 2), (20, 1), (30, 1)]);
        assert_eq!(graph.neighbors(99).count(), 0);
    }

    #[test]
    fn test_labels() {
        let mut graph = Graph::new();
        graph.set_label(1, "https://soundcloud.com/one");
        assert_eq!(graph.label(1), Some("https://soundcloud.com/one"));
        assert_eq!(graph.label(2), None);
        // A label alone does not make a node
        assert!(graph.is_empty());
    }
}
