//! Loading of the serialized input dataset.
//!
//! The input is one JSON file holding the pre-processed single-cell object: gene symbols,
//! cell barcodes, log-normalised expression as sparse triplets, one cluster assignment per
//! cell and one 2D embedding coordinate per cell. A dataset that lacks any of the pieces
//! needed downstream fails the load; there is no partial-metadata recovery.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};

use crate::dataset::ExpressionDataset;

/// On-disk layout of the serialized dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetFile {
    /// Gene symbols, column axis of the matrix.
    pub genes: Vec<String>,
    /// Cell barcodes, row axis of the matrix.
    pub barcodes: Vec<String>,
    /// Sparse expression values as (cell, gene, value) triplets.
    pub triplets: Vec<(usize, usize, f64)>,
    /// Native cluster assignment per cell.
    pub clusters: Vec<u32>,
    /// Native 2D embedding coordinate per cell.
    pub embedding: Vec<[f64; 2]>,
}

/// A validated, in-memory dataset together with its native per-cell annotations.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub data: Arc<ExpressionDataset>,
    pub clusters: Vec<u32>,
    pub embedding: Vec<[f64; 2]>,
}

/// Read and validate the serialized dataset at `path`.
pub fn load_dataset(path: &Path) -> anyhow::Result<LoadedDataset> {
    let file = File::open(path).with_context(|| format!("opening dataset {}", path.display()))?;
    let parsed: DatasetFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing dataset {}", path.display()))?;
    build_dataset(parsed)
}

/// Turn a parsed [`DatasetFile`] into a validated [`LoadedDataset`].
pub fn build_dataset(file: DatasetFile) -> anyhow::Result<LoadedDataset> {
    let n_cells = file.barcodes.len();
    let n_genes = file.genes.len();
    if n_cells == 0 {
        return Err(anyhow::anyhow!("dataset has no cells"));
    }
    if n_genes == 0 {
        return Err(anyhow::anyhow!("dataset has no genes"));
    }
    if file.clusters.len() != n_cells {
        return Err(anyhow::anyhow!(
            "{} cluster assignments for {} cells",
            file.clusters.len(),
            n_cells
        ));
    }
    if file.embedding.len() != n_cells {
        return Err(anyhow::anyhow!(
            "{} embedding coordinates for {} cells",
            file.embedding.len(),
            n_cells
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for gene in &file.genes {
        if !seen.insert(gene.as_str()) {
            log::warn!("duplicate gene symbol in dataset: {}", gene);
        }
    }

    let mut rows = Vec::with_capacity(file.triplets.len());
    let mut cols = Vec::with_capacity(file.triplets.len());
    let mut vals = Vec::with_capacity(file.triplets.len());
    for &(cell, gene, value) in &file.triplets {
        rows.push(cell);
        cols.push(gene);
        vals.push(value);
    }
    let coo = CooMatrix::try_from_triplets(n_cells, n_genes, rows, cols, vals)
        .map_err(|e| anyhow::anyhow!("invalid expression triplets: {}", e))?;
    let matrix = CsrMatrix::from(&coo);

    Ok(LoadedDataset {
        data: Arc::new(ExpressionDataset {
            matrix,
            genes: file.genes,
            barcodes: file.barcodes,
        }),
        clusters: file.clusters,
        embedding: file.embedding,
    })
}
