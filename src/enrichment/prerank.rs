//! Preranked gene set enrichment analysis.
//!
//! Classic ranking-based GSEA on the signed-effect gene ranking: a weighted running-sum
//! enrichment score per set, a permutation null from seeded gene-label shuffles, the
//! sign-matched normalized enrichment score, and Benjamini-Hochberg adjustment across the
//! sets of a collection. Everything is deterministic for a fixed configuration.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::dea::{RankedGeneList, correction};
use crate::enrichment::{EnrichmentOutcome, EnrichmentRow, EnrichmentTable, GeneSetCollection};
use crate::rng::SimpleRng;

/// Configuration for preranked GSEA.
#[derive(Debug, Clone)]
pub struct GseaConfig {
    /// Number of gene-label permutations per set.
    pub n_permutations: usize,
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Exponent on |score| in the running sum.
    pub weight: f64,
    /// Sets with fewer overlapping genes are skipped.
    pub min_set_size: usize,
    /// Sets with more overlapping genes are skipped.
    pub max_set_size: usize,
}

impl Default for GseaConfig {
    fn default() -> Self {
        Self {
            n_permutations: 1000,
            seed: 42,
            weight: 1.0,
            min_set_size: 2,
            max_set_size: 500,
        }
    }
}

impl GseaConfig {
    /// Create a quick configuration for testing (fewer permutations).
    pub fn quick() -> Self {
        Self {
            n_permutations: 100,
            ..Default::default()
        }
    }
}

/// Run preranked GSEA for every qualifying set of `collection` against `ranked`.
///
/// Returns [`EnrichmentOutcome::NoHits`] when no set qualifies (too small or large an
/// overlap, or an empty collection); a degenerate result is not an error.
pub fn prerank_gsea(
    ranked: &RankedGeneList,
    collection: &GeneSetCollection,
    config: &GseaConfig,
) -> anyhow::Result<EnrichmentOutcome> {
    let n = ranked.len();
    if n == 0 {
        return Ok(EnrichmentOutcome::NoHits);
    }

    let scores: Vec<f64> = ranked.entries().iter().map(|(_, s)| *s).collect();
    let position: HashMap<&str, usize> = ranked
        .entries()
        .iter()
        .enumerate()
        .map(|(i, (gene, _))| (gene.as_str(), i))
        .collect();

    // overlap of each set with the ranked universe, in rank order
    let candidates: Vec<(&str, Vec<usize>)> = collection
        .sets
        .iter()
        .filter_map(|set| {
            let mut hits: Vec<usize> = set
                .genes
                .iter()
                .filter_map(|gene| position.get(gene.as_str()).copied())
                .collect();
            hits.sort();
            let in_range = hits.len() >= config.min_set_size
                && hits.len() <= config.max_set_size
                && hits.len() < n;
            in_range.then(|| (set.name.as_str(), hits))
        })
        .collect();

    if candidates.is_empty() {
        return Ok(EnrichmentOutcome::NoHits);
    }

    let scored: Vec<(String, f64, f64, f64)> = candidates
        .par_iter()
        .enumerate()
        .map(|(set_idx, (name, hits))| {
            let es = enrichment_score(hits, &scores, config.weight);
            let (nes, p_value) = permutation_null(hits.len(), &scores, es, set_idx, config);
            (name.to_string(), es, nes, p_value)
        })
        .collect();

    let p_values: Vec<f64> = scored.iter().map(|(_, _, _, p)| *p).collect();
    let adjusted = correction::benjamini_hochberg(&p_values)?;

    let mut rows: Vec<EnrichmentRow> = scored
        .into_iter()
        .zip(adjusted)
        .map(|((set_name, es, nes, p_value), adjusted_p_value)| EnrichmentRow {
            set_name,
            es,
            nes,
            p_value,
            adjusted_p_value,
            log_significance: 0.0,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.adjusted_p_value
            .partial_cmp(&b.adjusted_p_value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.nes
                    .abs()
                    .partial_cmp(&a.nes.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.set_name.cmp(&b.set_name))
    });

    let mut table = EnrichmentTable::new(rows);
    table.log_transform_significance();
    Ok(EnrichmentOutcome::Table(table))
}

/// Signed maximum deviation of the weighted running sum.
///
/// Hits advance the sum by |score|^weight / NR, misses retreat it by 1 / (N - Nh). The
/// extrema of the piecewise-linear sum sit at hit boundaries, so only those are inspected.
fn enrichment_score(hits: &[usize], scores: &[f64], weight: f64) -> f64 {
    let n = scores.len();
    let nh = hits.len();
    let miss_step = 1.0 / (n - nh) as f64;

    let hit_weights: Vec<f64> = hits.iter().map(|&i| scores[i].abs().powf(weight)).collect();
    let total_weight: f64 = hit_weights.iter().sum();
    let uniform = total_weight <= 0.0;

    let mut running = 0.0;
    let mut best = 0.0f64;
    for (k, &pos) in hits.iter().enumerate() {
        let misses_before = (pos - k) as f64;
        let before = running - miss_step * misses_before;
        if before.abs() > best.abs() {
            best = before;
        }
        running += if uniform {
            1.0 / nh as f64
        } else {
            hit_weights[k] / total_weight
        };
        let after = running - miss_step * misses_before;
        if after.abs() > best.abs() {
            best = after;
        }
    }
    best
}

/// Permutation null over random hit positions; returns (NES, p).
///
/// The p-value carries the +1 correction, so even an all-extreme null keeps p strictly
/// positive and the downstream log transform never sees zero.
fn permutation_null(
    nh: usize,
    scores: &[f64],
    es: f64,
    set_idx: usize,
    config: &GseaConfig,
) -> (f64, f64) {
    let n = scores.len();
    let mut same_sign: Vec<f64> = Vec::with_capacity(config.n_permutations);
    for perm in 0..config.n_permutations {
        let mut rng = SimpleRng::new(
            config
                .seed
                .wrapping_add((set_idx * config.n_permutations + perm) as u64),
        );
        let positions = sample_positions(&mut rng, nh, n);
        let null_es = enrichment_score(&positions, scores, config.weight);
        if null_es >= 0.0 && es >= 0.0 || null_es < 0.0 && es < 0.0 {
            same_sign.push(null_es.abs());
        }
    }

    if same_sign.is_empty() {
        return (0.0, 1.0);
    }
    let mean_abs: f64 = same_sign.iter().sum::<f64>() / same_sign.len() as f64;
    let nes = if mean_abs > 0.0 { es / mean_abs } else { 0.0 };
    let extreme = same_sign.iter().filter(|&&x| x >= es.abs()).count();
    let p = (extreme + 1) as f64 / (same_sign.len() + 1) as f64;
    (nes, p)
}

/// Draw `nh` distinct rank positions. Rejection sampling for sparse sets, partial
/// Fisher-Yates once the set covers a large share of the universe.
fn sample_positions(rng: &mut SimpleRng, nh: usize, n: usize) -> Vec<usize> {
    let mut positions: Vec<usize> = if nh * 2 >= n {
        let mut all: Vec<usize> = (0..n).collect();
        rng.shuffle(&mut all);
        all.truncate(nh);
        all
    } else {
        let mut chosen = HashSet::with_capacity(nh);
        let mut out = Vec::with_capacity(nh);
        while out.len() < nh {
            let candidate = rng.next_usize(n);
            if chosen.insert(candidate) {
                out.push(candidate);
            }
        }
        out
    };
    positions.sort();
    positions
}
