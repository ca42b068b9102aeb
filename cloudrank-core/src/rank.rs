//! Weighted PageRank over the interaction graph.

use crate::graph::Graph;
use cloudrank_scanner::result::UserId;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

/// PageRank configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRankConfig {
    /// Probability of following an edge instead of jumping (typically 0.85)
    pub damping: f64,
    pub max_iterations: usize,
    /// Stop once the summed absolute change of an iteration drops below this
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

pub struct PageRank {
    config: PageRankConfig,
}

/// Graph flattened to dense indexes for the power iteration.
struct Dense {
    ids: Vec<UserId>,
    /// Per source: `(target index, weight / out weight)`
    links: Vec<Vec<(usize, f64)>>,
    dangling: Vec<usize>,
}

impl Dense {
    fn from_graph(graph: &Graph) -> Self {
        let ids: Vec<UserId> = graph.nodes().collect();
        let index: HashMap<UserId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut links = Vec::with_capacity(ids.len());
        let mut dangling = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            let out = graph.out_weight(*id);
            if out == 0 {
                dangling.push(i);
                links.push(Vec::new());
                continue;
            }
            links.push(
                graph
                    .neighbors(*id)
                    .filter_map(|(target, weight)| {
                        index
                            .get(&target)
                            .map(|t| (*t, weight as f64 / out as f64))
                    })
                    .collect(),
            );
        }

        Self {
            ids,
            links,
            dangling,
        }
    }
}

/// One power-iteration step. Total mass is preserved: what dangling nodes
/// hold is spread evenly over every node.
fn iterate_once(scores: &[f64], dense: &Dense, damping: f64) -> Vec<f64> {
    let n = scores.len() as f64;
    let dangling_mass: f64 = dense.dangling.iter().map(|i| scores[*i]).sum();
    let base = (1.0 - damping) / n + damping * dangling_mass / n;

    let mut next = vec![base; scores.len()];
    for (source, links) in dense.links.iter().enumerate() {
        let share = damping * scores[source];
        for (target, fraction) in links {
            next[*target] += share * fraction;
        }
    }
    next
}

impl PageRank {
    pub fn new(config: PageRankConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PageRankConfig {
        &self.config
    }

    /// Ranks every node starting from the uniform distribution.
    pub fn compute(&self, graph: &Graph) -> Ranking {
        let n = graph.node_count();
        self.run(graph, vec![1.0 / n as f64; n])
    }

    /// Ranks every node starting from `initial`. The start is normalized;
    /// nodes missing from it start at zero, and an all-zero start falls back
    /// to uniform.
    pub fn compute_from(&self, graph: &Graph, initial: &HashMap<UserId, f64>) -> Ranking {
        let mut start: Vec<f64> = graph
            .nodes()
            .map(|id| initial.get(&id).copied().unwrap_or(0.0).max(0.0))
            .collect();

        let total: f64 = start.iter().sum();
        if total > 0.0 {
            for score in start.iter_mut() {
                *score /= total;
            }
        } else {
            let uniform = 1.0 / start.len() as f64;
            start.iter_mut().for_each(|score| *score = uniform);
        }

        self.run(graph, start)
    }

    fn run(&self, graph: &Graph, mut scores: Vec<f64>) -> Ranking {
        if graph.is_empty() {
            return Ranking::default();
        }

        let dense = Dense::from_graph(graph);
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            let next = iterate_once(&scores, &dense, self.config.damping);
            let delta: f64 = next
                .iter()
                .zip(&scores)
                .map(|(new, old)| (new - old).abs())
                .sum();
            scores = next;
            iterations += 1;
            debug!("PageRank iteration {}: delta {:e}", iterations, delta);

            if delta < self.config.tolerance {
                converged = true;
                break;
            }
        }

        info!(
            "PageRank over {} nodes: {} iterations, converged: {}",
            dense.ids.len(),
            iterations,
            converged
        );
        Ranking::new(dense.ids.into_iter().zip(scores).collect(), iterations, converged)
    }
}

impl Default for PageRank {
    fn default() -> Self {
        Self::new(PageRankConfig::default())
    }
}

/// Scores in rank order: highest first, ties by ascending user id.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    ordered: Vec<(UserId, f64)>,
    scores: HashMap<UserId, f64>,
    iterations: usize,
    converged: bool,
}

impl Ranking {
    fn new(mut ordered: Vec<(UserId, f64)>, iterations: usize, converged: bool) -> Self {
        ordered.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        let scores = ordered.iter().copied().collect();
        Self {
            ordered,
            scores,
            iterations,
            converged,
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn score(&self, id: UserId) -> Option<f64> {
        self.scores.get(&id).copied()
    }

    /// The `k` best ranked users, best first.
    pub fn top(&self, k: usize) -> &[(UserId, f64)] {
        &self.ordered[..k.min(self.ordered.len())]
    }

    /// The `k` best ranked users, best last.
    pub fn ascending_tail(&self, k: usize) -> Vec<(UserId, f64)> {
        self.top(k).iter().rev().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(UserId, f64)> {
        self.ordered.iter()
    }

    pub fn total(&self) -> f64 {
        self.ordered.iter().map(|(_, score)| score).sum()
    }
}
