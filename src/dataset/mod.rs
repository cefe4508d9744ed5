//! Dataset model for panel reporting.
//!
//! The unit the analysis iterates over is the [`DatasetVariant`]: one shared expression
//! matrix together with a cluster assignment and a 2D embedding coordinate per cell. Two
//! variants exist per run, the dataset as originally clustered and a variant re-clustered at
//! a coarser resolution. Variants are immutable once constructed; everything downstream only
//! reads them.

use std::fmt;
use std::sync::Arc;

use nalgebra_sparse::CsrMatrix;

pub mod io;

/// A pre-processed single-cell expression dataset: log-normalised expression values stored
/// sparse (cells × genes) plus the gene and barcode axes.
#[derive(Debug, Clone)]
pub struct ExpressionDataset {
    pub matrix: CsrMatrix<f64>,
    pub genes: Vec<String>,
    pub barcodes: Vec<String>,
}

impl ExpressionDataset {
    pub fn n_cells(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_genes(&self) -> usize {
        self.matrix.ncols()
    }
}

/// The two dataset variants of a run, in their fixed iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariantLabel {
    HighResolution,
    LowResolution,
}

impl VariantLabel {
    /// Variant iteration order: the enum declaration order is the order panels are built
    /// and the order pages are emitted.
    pub const ALL: [VariantLabel; 2] = [VariantLabel::HighResolution, VariantLabel::LowResolution];

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantLabel::HighResolution => "high-resolution",
            VariantLabel::LowResolution => "low-resolution",
        }
    }
}

impl fmt::Display for VariantLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One labeled dataset variant: the shared expression matrix plus a cluster assignment and a
/// 2D embedding coordinate per cell.
#[derive(Debug, Clone)]
pub struct DatasetVariant {
    pub label: VariantLabel,
    pub data: Arc<ExpressionDataset>,
    pub clusters: Vec<u32>,
    pub embedding: Vec<[f64; 2]>,
}

impl DatasetVariant {
    /// Build a variant, validating that both per-cell annotations cover every cell.
    pub fn new(
        label: VariantLabel,
        data: Arc<ExpressionDataset>,
        clusters: Vec<u32>,
        embedding: Vec<[f64; 2]>,
    ) -> anyhow::Result<Self> {
        let n_cells = data.n_cells();
        if clusters.len() != n_cells {
            return Err(anyhow::anyhow!(
                "variant {}: {} cluster assignments for {} cells",
                label,
                clusters.len(),
                n_cells
            ));
        }
        if embedding.len() != n_cells {
            return Err(anyhow::anyhow!(
                "variant {}: {} embedding coordinates for {} cells",
                label,
                embedding.len(),
                n_cells
            ));
        }
        Ok(DatasetVariant {
            label,
            data,
            clusters,
            embedding,
        })
    }

    /// Distinct cluster labels present in this variant, ascending.
    ///
    /// This scan is the single source of cluster labels for the whole run: DEG tables,
    /// enrichment results and panels for this variant are all keyed by its output.
    pub fn cluster_labels(&self) -> Vec<u32> {
        let mut labels = self.clusters.clone();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Cell indices assigned to `cluster`.
    pub fn cells_in_cluster(&self, cluster: u32) -> Vec<usize> {
        self.clusters
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| if c == cluster { Some(i) } else { None })
            .collect()
    }

    /// Per-cell membership mask for `cluster`, the input shape the DEG accumulation pass
    /// wants.
    pub fn cluster_mask(&self, cluster: u32) -> Vec<bool> {
        self.clusters.iter().map(|&c| c == cluster).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    fn tiny_dataset() -> Arc<ExpressionDataset> {
        let mut coo = CooMatrix::new(3, 2);
        coo.push(0, 0, 1.0f64);
        coo.push(1, 1, 2.0);
        coo.push(2, 0, 3.0);
        Arc::new(ExpressionDataset {
            matrix: CsrMatrix::from(&coo),
            genes: vec!["MS4A1".to_string(), "CD3E".to_string()],
            barcodes: vec!["AAA".to_string(), "CCC".to_string(), "GGG".to_string()],
        })
    }

    #[test]
    fn variant_order_is_fixed() {
        assert_eq!(
            VariantLabel::ALL,
            [VariantLabel::HighResolution, VariantLabel::LowResolution]
        );
        assert_eq!(VariantLabel::HighResolution.as_str(), "high-resolution");
        assert_eq!(VariantLabel::LowResolution.as_str(), "low-resolution");
    }

    #[test]
    fn cluster_labels_are_distinct_and_ascending() {
        let variant = DatasetVariant::new(
            VariantLabel::HighResolution,
            tiny_dataset(),
            vec![3, 0, 3],
            vec![[0.0, 0.0], [1.0, 1.0], [2.0, 0.5]],
        )
        .unwrap();
        assert_eq!(variant.cluster_labels(), vec![0, 3]);
        assert_eq!(variant.cells_in_cluster(3), vec![0, 2]);
        assert_eq!(variant.cluster_mask(0), vec![false, true, false]);
    }

    #[test]
    fn mismatched_annotations_are_rejected() {
        let result = DatasetVariant::new(
            VariantLabel::HighResolution,
            tiny_dataset(),
            vec![0, 1],
            vec![[0.0, 0.0], [1.0, 1.0], [2.0, 0.5]],
        );
        assert!(result.is_err());

        let result = DatasetVariant::new(
            VariantLabel::LowResolution,
            tiny_dataset(),
            vec![0, 1, 0],
            vec![[0.0, 0.0]],
        );
        assert!(result.is_err());
    }
}
