//! 2D spectral layout of the neighbor graph.
//!
//! Coordinates are the two leading non-trivial eigenvectors of the symmetrically normalised
//! adjacency, obtained by power iteration with deflation against the trivial
//! degree-weighted vector. Axes are standardised so panels share a comparable scale.

use crate::cluster::graph::NeighborGraph;
use crate::rng::SimpleRng;

const POWER_ITERATIONS: usize = 200;
const CONVERGENCE_TOL: f64 = 1e-10;

/// Compute one 2D coordinate per node. Isolated nodes land at the origin.
pub fn spectral_layout(graph: &NeighborGraph, seed: u64) -> Vec<[f64; 2]> {
    let n = graph.n_nodes;
    if n == 0 {
        return Vec::new();
    }

    let degrees = graph.degrees();
    let adjacency = graph.adjacency();
    if degrees.iter().all(|&d| d <= 0.0) {
        return vec![[0.0, 0.0]; n];
    }

    // S v, with S = D^{-1/2} A D^{-1/2}
    let normalized_mul = |v: &[f64]| -> Vec<f64> {
        let mut out = vec![0.0; n];
        for (node, neighbors) in adjacency.iter().enumerate() {
            if degrees[node] <= 0.0 {
                continue;
            }
            let mut acc = 0.0;
            for &(neighbor, weight) in neighbors {
                if degrees[neighbor] > 0.0 {
                    acc += weight * v[neighbor] / degrees[neighbor].sqrt();
                }
            }
            out[node] = acc / degrees[node].sqrt();
        }
        out
    };

    // the trivial eigenvector of S is d^{1/2}
    let mut trivial: Vec<f64> = degrees.iter().map(|&d| d.max(0.0).sqrt()).collect();
    normalize(&mut trivial);

    let mut rng = SimpleRng::new(seed);
    let mut axes: Vec<Vec<f64>> = Vec::with_capacity(2);
    for _ in 0..2 {
        let mut v: Vec<f64> = (0..n).map(|_| rng.next_f64() - 0.5).collect();
        deflate(&mut v, &trivial);
        for previous in &axes {
            deflate(&mut v, previous);
        }
        if !normalize(&mut v) {
            axes.push(vec![0.0; n]);
            continue;
        }

        for _ in 0..POWER_ITERATIONS {
            let mut next = normalized_mul(&v);
            deflate(&mut next, &trivial);
            for previous in &axes {
                deflate(&mut next, previous);
            }
            if !normalize(&mut next) {
                next = vec![0.0; n];
                v = next;
                break;
            }
            let delta: f64 = next
                .iter()
                .zip(&v)
                .map(|(a, b)| (a - b).abs().min((a + b).abs()))
                .sum();
            v = next;
            if delta < CONVERGENCE_TOL {
                break;
            }
        }
        axes.push(v);
    }

    let x = standardize(&axes[0]);
    let y = standardize(&axes[1]);
    (0..n).map(|i| [x[i], y[i]]).collect()
}

fn deflate(v: &mut [f64], against: &[f64]) {
    let projection: f64 = v.iter().zip(against).map(|(a, b)| a * b).sum();
    for (value, basis) in v.iter_mut().zip(against) {
        *value -= projection * basis;
    }
}

fn normalize(v: &mut [f64]) -> bool {
    let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm < 1e-12 {
        return false;
    }
    for value in v.iter_mut() {
        *value /= norm;
    }
    true
}

/// Zero-mean, unit-variance scaling; a degenerate axis collapses to zeros.
fn standardize(v: &[f64]) -> Vec<f64> {
    let n = v.len() as f64;
    let mean: f64 = v.iter().sum::<f64>() / n;
    let var: f64 = v.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
    if var < 1e-18 {
        return vec![0.0; v.len()];
    }
    let sd = var.sqrt();
    v.iter().map(|x| (x - mean) / sd).collect()
}
