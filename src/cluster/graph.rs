//! Symmetric kNN graph construction and greedy modularity community detection.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::Array2;
use rayon::prelude::*;

/// Undirected weighted graph over cells. Edges are stored once with `a < b`.
#[derive(Debug, Clone)]
pub struct NeighborGraph {
    pub n_nodes: usize,
    pub edges: Vec<(usize, usize, f64)>,
}

impl NeighborGraph {
    /// Weighted degree per node.
    pub fn degrees(&self) -> Vec<f64> {
        let mut degrees = vec![0.0; self.n_nodes];
        for &(a, b, w) in &self.edges {
            degrees[a] += w;
            degrees[b] += w;
        }
        degrees
    }

    /// Adjacency lists, both directions.
    pub fn adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let mut adjacency = vec![Vec::new(); self.n_nodes];
        for &(a, b, w) in &self.edges {
            adjacency[a].push((b, w));
            adjacency[b].push((a, w));
        }
        adjacency
    }
}

/// Build the symmetric kNN graph over per-cell component scores (Euclidean, unit weights).
///
/// `k` is clamped to `n - 1`. An edge exists if either endpoint ranks the other among its
/// nearest neighbors.
pub fn knn_graph(scores: &Array2<f64>, k: usize) -> NeighborGraph {
    let n = scores.nrows();
    if n <= 1 {
        return NeighborGraph {
            n_nodes: n,
            edges: Vec::new(),
        };
    }
    let k = k.min(n - 1).max(1);

    let neighbor_lists: Vec<Vec<usize>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let row_i = scores.row(i);
            let mut distances: Vec<(f64, usize)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| {
                    let row_j = scores.row(j);
                    let d2: f64 = row_i
                        .iter()
                        .zip(row_j.iter())
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum();
                    (d2, j)
                })
                .collect();
            distances
                .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            distances.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect();

    let mut edge_set = BTreeSet::new();
    for (i, neighbors) in neighbor_lists.iter().enumerate() {
        for &j in neighbors {
            edge_set.insert((i.min(j), i.max(j)));
        }
    }

    NeighborGraph {
        n_nodes: n,
        edges: edge_set.into_iter().map(|(a, b)| (a, b, 1.0)).collect(),
    }
}

/// Working graph for the aggregation levels: adjacency plus per-node doubled self-loop
/// weight (the internal weight a supernode absorbed).
struct WorkGraph {
    adjacency: Vec<Vec<(usize, f64)>>,
    self_double: Vec<f64>,
}

impl WorkGraph {
    fn from_graph(graph: &NeighborGraph) -> Self {
        WorkGraph {
            adjacency: graph.adjacency(),
            self_double: vec![0.0; graph.n_nodes],
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    fn degrees(&self) -> Vec<f64> {
        self.adjacency
            .iter()
            .zip(&self.self_double)
            .map(|(neighbors, &own)| neighbors.iter().map(|&(_, w)| w).sum::<f64>() + own)
            .collect()
    }
}

/// Greedy modularity (Louvain-style) community detection with a resolution parameter.
///
/// Higher resolution favours more, smaller communities; the pipeline runs this with a value
/// well below 1 to obtain the coarse variant. Node sweep order and tie-breaking are fixed,
/// so the assignment is deterministic. Communities are relabelled compactly in order of
/// first appearance over the node index.
pub fn louvain_communities(graph: &NeighborGraph, resolution: f64) -> Vec<u32> {
    let n = graph.n_nodes;
    if n == 0 {
        return Vec::new();
    }

    let mut membership: Vec<usize> = (0..n).collect();
    let mut work = WorkGraph::from_graph(graph);

    loop {
        let (assignment, improved) = local_move(&work, resolution);
        let n_communities = assignment.iter().copied().max().map_or(0, |c| c + 1);
        if !improved {
            break;
        }
        for m in membership.iter_mut() {
            *m = assignment[*m];
        }
        if n_communities == work.len() {
            break;
        }
        work = aggregate(&work, &assignment, n_communities);
    }

    relabel_compact(&membership)
}

/// One level of local moving: sweep nodes in index order, moving each to the neighboring
/// community with the best modularity gain, until a full sweep makes no move.
fn local_move(work: &WorkGraph, resolution: f64) -> (Vec<usize>, bool) {
    let n = work.len();
    let degrees = work.degrees();
    let m2: f64 = degrees.iter().sum();
    let mut assignment: Vec<usize> = (0..n).collect();
    if m2 <= 0.0 {
        return (assignment, false);
    }

    let mut community_total = degrees.clone();
    let mut improved = false;

    const MAX_SWEEPS: usize = 16;
    for _ in 0..MAX_SWEEPS {
        let mut moved = false;
        for node in 0..n {
            let current = assignment[node];
            community_total[current] -= degrees[node];

            let mut link_weights: BTreeMap<usize, f64> = BTreeMap::new();
            for &(neighbor, weight) in &work.adjacency[node] {
                if neighbor != node {
                    *link_weights.entry(assignment[neighbor]).or_insert(0.0) += weight;
                }
            }

            let gain_of = |community: usize, weight_in: f64| {
                weight_in - resolution * degrees[node] * community_total[community] / m2
            };

            let mut best = current;
            let mut best_gain =
                gain_of(current, link_weights.get(&current).copied().unwrap_or(0.0));
            for (&community, &weight_in) in &link_weights {
                let gain = gain_of(community, weight_in);
                if gain > best_gain + 1e-12 {
                    best_gain = gain;
                    best = community;
                }
            }

            community_total[best] += degrees[node];
            if best != current {
                assignment[node] = best;
                moved = true;
                improved = true;
            }
        }
        if !moved {
            break;
        }
    }

    (compact(&assignment), improved)
}

/// Collapse communities into supernodes, summing parallel edge weights. Internal weight
/// becomes the supernode's doubled self-loop.
fn aggregate(work: &WorkGraph, assignment: &[usize], n_communities: usize) -> WorkGraph {
    let mut self_double = vec![0.0; n_communities];
    let mut between: BTreeMap<(usize, usize), f64> = BTreeMap::new();

    for node in 0..work.len() {
        let a = assignment[node];
        self_double[a] += work.self_double[node];
        for &(neighbor, weight) in &work.adjacency[node] {
            if neighbor <= node {
                continue;
            }
            let b = assignment[neighbor];
            if a == b {
                self_double[a] += 2.0 * weight;
            } else {
                *between.entry((a.min(b), a.max(b))).or_insert(0.0) += weight;
            }
        }
    }

    let mut adjacency = vec![Vec::new(); n_communities];
    for (&(a, b), &w) in &between {
        adjacency[a].push((b, w));
        adjacency[b].push((a, w));
    }

    WorkGraph {
        adjacency,
        self_double,
    }
}

/// Renumber an assignment to compact ids in order of first appearance.
fn compact(assignment: &[usize]) -> Vec<usize> {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let mut next = 0usize;
    let mut out = Vec::with_capacity(assignment.len());
    for &a in assignment {
        let id = *mapping.entry(a).or_insert_with(|| {
            let id = next;
            next += 1;
            id
        });
        out.push(id);
    }
    out
}

fn relabel_compact(membership: &[usize]) -> Vec<u32> {
    compact(membership).into_iter().map(|c| c as u32).collect()
}
