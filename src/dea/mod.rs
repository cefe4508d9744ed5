//! Cluster-vs-rest differential expression.
//!
//! For one cluster of a dataset variant, the cluster's cells are the test group and every
//! other cell is the reference group. Per-gene summary statistics (sums and sums of squares
//! for both groups) are accumulated in a single pass over the stored entries of the sparse
//! matrix; Welch t statistics, p-values and log2 fold changes are then computed from those
//! sums and adjusted with Benjamini-Hochberg across all genes.

use nalgebra_sparse::CsrMatrix;
use single_utilities::traits::FloatOpsTS;
use std::collections::HashMap;

pub mod correction;
pub mod welch;

/// Pseudocount added to both group means before the fold change ratio.
pub const PSEUDOCOUNT: f64 = 1e-9;
/// Number of top genes (by |log2FC|) offered as volcano label candidates.
pub const LABEL_CANDIDATES: usize = 20;

/// Per-gene differential expression record.
#[derive(Debug, Clone, PartialEq)]
pub struct DegRecord {
    pub gene: String,
    pub log2_fold_change: f64,
    pub statistic: f64,
    pub p_value: f64,
    pub adjusted_p_value: f64,
}

/// Ordered per-gene results for one (variant, cluster) pair.
///
/// The table carries one record per gene tested and switches sort key during the pipeline:
/// descending |log2FC| for display and labeling, descending signed log2FC as the enrichment
/// input ordering. Both sorts break ties by gene symbol, so either ordering is reproducible
/// from the same records.
#[derive(Debug, Clone)]
pub struct DegTable {
    pub records: Vec<DegRecord>,
}

impl DegTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn sort_by_abs_effect(&mut self) {
        self.records.sort_by(|a, b| {
            b.log2_fold_change
                .abs()
                .partial_cmp(&a.log2_fold_change.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.gene.cmp(&b.gene))
        });
    }

    pub fn sort_by_signed_effect(&mut self) {
        self.records.sort_by(|a, b| {
            b.log2_fold_change
                .partial_cmp(&a.log2_fold_change)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.gene.cmp(&b.gene))
        });
    }

    /// Genes eligible for volcano annotation: the first `n` records of the |log2FC|
    /// ordering.
    pub fn label_candidates(&self, n: usize) -> Vec<String> {
        self.records
            .iter()
            .take(n)
            .map(|r| r.gene.clone())
            .collect()
    }
}

/// Ranked gene list, the exact input contract of preranked enrichment: unique gene
/// identifiers mapped to signed log2 fold changes, ordered descending by value.
#[derive(Debug, Clone)]
pub struct RankedGeneList {
    entries: Vec<(String, f64)>,
}

impl RankedGeneList {
    /// Derive the ranking from a DEG table. This is a pure reordering of the same per-gene
    /// records; no statistic is recomputed. Should a gene identifier appear twice, the
    /// later record wins.
    pub fn from_table(table: &DegTable) -> Self {
        let mut by_gene: HashMap<&str, f64> = HashMap::with_capacity(table.len());
        let mut order: Vec<&str> = Vec::with_capacity(table.len());
        for record in &table.records {
            if by_gene.insert(record.gene.as_str(), record.log2_fold_change).is_none() {
                order.push(record.gene.as_str());
            }
        }
        let mut entries: Vec<(String, f64)> = order
            .into_iter()
            .map(|gene| (gene.to_string(), by_gene[gene]))
            .collect();
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        RankedGeneList { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }
}

/// Test every gene, cluster cells against the rest, and return the table sorted by
/// descending |log2FC|.
///
/// # Arguments
///
/// * `matrix` - Sparse expression matrix (cells × genes)
/// * `genes` - Gene symbols, one per matrix column
/// * `in_cluster` - Per-cell membership mask of the test group
pub fn rank_genes<T>(
    matrix: &CsrMatrix<T>,
    genes: &[String],
    in_cluster: &[bool],
) -> anyhow::Result<DegTable>
where
    T: FloatOpsTS,
{
    let n_cells = matrix.nrows();
    let n_genes = matrix.ncols();
    if genes.len() != n_genes {
        return Err(anyhow::anyhow!(
            "{} gene symbols for {} matrix columns",
            genes.len(),
            n_genes
        ));
    }
    if in_cluster.len() != n_cells {
        return Err(anyhow::anyhow!(
            "membership mask covers {} of {} cells",
            in_cluster.len(),
            n_cells
        ));
    }

    let n1 = in_cluster.iter().filter(|&&m| m).count();
    let n2 = n_cells - n1;
    if n1 == 0 {
        return Err(anyhow::anyhow!("cluster has no member cells"));
    }
    if n2 == 0 {
        // a variant with a single cluster has no reference group; the table still carries
        // one flat record per gene so downstream stages see every gene
        log::warn!("cluster covers every cell; differential signal is undefined");
        let mut table = DegTable {
            records: genes
                .iter()
                .map(|gene| DegRecord {
                    gene: gene.clone(),
                    log2_fold_change: 0.0,
                    statistic: 0.0,
                    p_value: 1.0,
                    adjusted_p_value: 1.0,
                })
                .collect(),
        };
        table.sort_by_abs_effect();
        return Ok(table);
    }

    let mut sums1 = vec![0.0f64; n_genes];
    let mut sum_sqs1 = vec![0.0f64; n_genes];
    let mut sums2 = vec![0.0f64; n_genes];
    let mut sum_sqs2 = vec![0.0f64; n_genes];
    for (cell, gene, value) in matrix.triplet_iter() {
        let v = value.to_f64().unwrap();
        if in_cluster[cell] {
            sums1[gene] += v;
            sum_sqs1[gene] += v * v;
        } else {
            sums2[gene] += v;
            sum_sqs2[gene] += v * v;
        }
    }

    let n1_f = n1 as f64;
    let n2_f = n2 as f64;
    let mut p_values = Vec::with_capacity(n_genes);
    let mut partial: Vec<(String, f64, f64)> = Vec::with_capacity(n_genes);
    for gene_idx in 0..n_genes {
        let test = welch::welch_from_sums(
            sums1[gene_idx],
            sum_sqs1[gene_idx],
            n1_f,
            sums2[gene_idx],
            sum_sqs2[gene_idx],
            n2_f,
        );
        let mean1 = sums1[gene_idx] / n1_f + PSEUDOCOUNT;
        let mean2 = sums2[gene_idx] / n2_f + PSEUDOCOUNT;
        let log2_fc = (mean1 / mean2).log2();
        p_values.push(test.p_value);
        partial.push((genes[gene_idx].clone(), log2_fc, test.statistic));
    }

    let adjusted = correction::benjamini_hochberg(&p_values)?;

    let mut table = DegTable {
        records: partial
            .into_iter()
            .zip(p_values)
            .zip(adjusted)
            .map(|(((gene, log2_fold_change, statistic), p_value), adjusted_p_value)| DegRecord {
                gene,
                log2_fold_change,
                statistic,
                p_value,
                adjusted_p_value,
            })
            .collect(),
    };
    table.sort_by_abs_effect();
    Ok(table)
}
