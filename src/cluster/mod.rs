//! Derivation of the low-resolution dataset variant.
//!
//! The input dataset arrives with its native clustering; the second variant is recomputed
//! here from the expression matrix alone: principal components of the centred matrix, a
//! symmetric kNN graph over the leading components, greedy modularity community detection at
//! a fixed coarse resolution, and a 2D spectral layout of the same graph for visualization.
//! All steps are deterministic for a fixed seed.

use crate::dataset::ExpressionDataset;

pub mod graph;
pub mod layout;
pub mod pca;

/// Leading principal components the neighbor graph is restricted to.
pub const LEADING_DIMS: usize = 20;
/// Neighbors per cell in the kNN graph, clamped to n - 1 for small inputs.
pub const N_NEIGHBORS: usize = 15;
/// Community detection resolution for the low-resolution variant. Deliberately coarser than
/// the resolution the input's native clustering was produced at.
pub const LOW_RESOLUTION: f64 = 0.3;
/// Seed for the randomised initialisations (power iteration, layout).
pub const RECLUSTER_SEED: u64 = 42;

/// Parameters of the recomputation. The pipeline always runs the defaults; the struct
/// exists so tests can shrink the problem.
#[derive(Debug, Clone)]
pub struct ReclusterParams {
    pub leading_dims: usize,
    pub n_neighbors: usize,
    pub resolution: f64,
    pub seed: u64,
}

impl Default for ReclusterParams {
    fn default() -> Self {
        Self {
            leading_dims: LEADING_DIMS,
            n_neighbors: N_NEIGHBORS,
            resolution: LOW_RESOLUTION,
            seed: RECLUSTER_SEED,
        }
    }
}

/// Result of the recomputation: one cluster assignment and one 2D coordinate per cell.
#[derive(Debug, Clone)]
pub struct Reclustering {
    pub clusters: Vec<u32>,
    pub embedding: Vec<[f64; 2]>,
}

/// Recompute a coarse clustering and a visualization embedding for `data`.
pub fn recluster(data: &ExpressionDataset, params: &ReclusterParams) -> anyhow::Result<Reclustering> {
    let n_cells = data.n_cells();
    if n_cells == 0 {
        return Err(anyhow::anyhow!("cannot recluster a dataset with no cells"));
    }

    log::info!(
        "reclustering {} cells: {} leading dimensions, {} neighbors, resolution {}",
        n_cells,
        params.leading_dims,
        params.n_neighbors,
        params.resolution
    );

    let scores = pca::principal_component_scores(&data.matrix, params.leading_dims, params.seed);
    let knn = graph::knn_graph(&scores, params.n_neighbors);
    let clusters = graph::louvain_communities(&knn, params.resolution);
    let embedding = layout::spectral_layout(&knn, params.seed.wrapping_add(1));

    let n_communities = clusters.iter().max().map(|&c| c as usize + 1).unwrap_or(0);
    log::info!("low-resolution variant: {} communities", n_communities);

    Ok(Reclustering {
        clusters,
        embedding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::{CooMatrix, CsrMatrix};

    /// Two well separated blobs of cells along two marker genes.
    fn blob_dataset(per_blob: usize) -> ExpressionDataset {
        let n = per_blob * 2;
        let mut coo = CooMatrix::new(n, 2);
        for i in 0..per_blob {
            coo.push(i, 0, 10.0 + (i % 3) as f64 * 0.1);
            coo.push(i, 1, 0.2);
        }
        for i in per_blob..n {
            coo.push(i, 0, 0.2);
            coo.push(i, 1, 10.0 + (i % 3) as f64 * 0.1);
        }
        ExpressionDataset {
            matrix: CsrMatrix::from(&coo),
            genes: vec!["A".to_string(), "B".to_string()],
            barcodes: (0..n).map(|i| format!("cell{}", i)).collect(),
        }
    }

    #[test]
    fn recluster_separates_blobs() {
        let data = blob_dataset(12);
        let params = ReclusterParams {
            leading_dims: 2,
            n_neighbors: 4,
            resolution: 1.0,
            seed: 42,
        };
        let result = recluster(&data, &params).unwrap();
        assert_eq!(result.clusters.len(), 24);
        assert_eq!(result.embedding.len(), 24);

        // all cells of one blob share a community, and the blobs differ
        let first_blob = result.clusters[0];
        assert!(result.clusters[..12].iter().all(|&c| c == first_blob));
        let second_blob = result.clusters[12];
        assert!(result.clusters[12..].iter().all(|&c| c == second_blob));
        assert_ne!(first_blob, second_blob);
    }

    #[test]
    fn recluster_is_deterministic() {
        let data = blob_dataset(8);
        let params = ReclusterParams {
            leading_dims: 2,
            n_neighbors: 3,
            ..Default::default()
        };
        let a = recluster(&data, &params).unwrap();
        let b = recluster(&data, &params).unwrap();
        assert_eq!(a.clusters, b.clusters);
        assert_eq!(a.embedding, b.embedding);
    }

    #[test]
    fn recluster_handles_tiny_datasets() {
        let mut coo = CooMatrix::new(3, 2);
        coo.push(0, 0, 1.0);
        coo.push(1, 1, 2.0);
        coo.push(2, 0, 0.5);
        let data = ExpressionDataset {
            matrix: CsrMatrix::from(&coo),
            genes: vec!["A".to_string(), "B".to_string()],
            barcodes: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        };
        let result = recluster(&data, &ReclusterParams::default()).unwrap();
        assert_eq!(result.clusters.len(), 3);
        assert_eq!(result.embedding.len(), 3);
        assert!(!result.clusters.is_empty());
    }
}
