//! Pipeline orchestration.
//!
//! Three strictly sequential stages: variant preparation, the per-cluster analysis loop,
//! and report emission. The (variant, cluster) iteration order is fixed (variants in
//! [`VariantLabel::ALL`] order, clusters ascending within each variant) and is relied on
//! twice, once to build panels and once to emit pages, so the accumulator enforces it.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::cluster::{self, ReclusterParams};
use crate::dataset::{DatasetVariant, VariantLabel, io};
use crate::dea::{self, DegTable, RankedGeneList};
use crate::enrichment::prerank::{GseaConfig, prerank_gsea};
use crate::enrichment::{EnrichmentOutcome, GeneSetCollection, gmt};
use crate::report::{self, RunSummary};

/// Set name prefix selecting the biological-process branch of the ontology collection.
pub const ONTOLOGY_BRANCH_PREFIX: &str = "GOBP_";

/// Composite lookup key for every per-cluster artifact. Ordering is the fixed iteration
/// order: variant first (enum order), then cluster label ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelKey {
    pub variant: VariantLabel,
    pub cluster: u32,
}

impl fmt::Display for PanelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / cluster {}", self.variant, self.cluster)
    }
}

/// Everything the per-cluster analyzer produced for one (variant, cluster) pair.
#[derive(Debug, Clone)]
pub struct ClusterAnalysis {
    pub key: PanelKey,
    /// DEG table in its |log2FC| ordering.
    pub deg: DegTable,
    /// The same records re-sorted by signed effect, the enrichment input.
    pub ranked: RankedGeneList,
    pub ontology: EnrichmentOutcome,
    pub hallmark: EnrichmentOutcome,
}

/// Ordered accumulator of per-cluster analyses.
///
/// Entries are kept in insertion order and must arrive in strictly increasing [`PanelKey`]
/// order, which makes the shared iteration-order invariant explicit and checkable instead
/// of an accident of a nested map.
#[derive(Debug, Default)]
pub struct AnalysisSet {
    entries: Vec<ClusterAnalysis>,
}

impl AnalysisSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, analysis: ClusterAnalysis) -> anyhow::Result<()> {
        if let Some(last) = self.entries.last() {
            if analysis.key <= last.key {
                return Err(anyhow::anyhow!(
                    "analysis for {} arrived out of order (after {})",
                    analysis.key,
                    last.key
                ));
            }
        }
        self.entries.push(analysis);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClusterAnalysis> {
        self.entries.iter()
    }

    pub fn get(&self, key: &PanelKey) -> Option<&ClusterAnalysis> {
        self.entries.iter().find(|a| a.key == *key)
    }

    pub fn keys(&self) -> Vec<PanelKey> {
        self.entries.iter().map(|a| a.key).collect()
    }
}

/// Input and output locations of one run. The analysis parameters themselves are fixed
/// constants; only the file locations vary (so tests can inject synthetic inputs).
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub dataset: PathBuf,
    pub ontology_gmt: PathBuf,
    pub hallmark_gmt: PathBuf,
    pub output: PathBuf,
}

/// Load the dataset and produce exactly two labeled variants, in their fixed order: the
/// native clustering as-is, then the recomputed low-resolution variant.
pub fn prepare_variants(dataset_path: &Path) -> anyhow::Result<Vec<DatasetVariant>> {
    log::info!("loading dataset {}", dataset_path.display());
    let loaded = io::load_dataset(dataset_path)?;
    log::info!(
        "dataset loaded: {} cells, {} genes",
        loaded.data.n_cells(),
        loaded.data.n_genes()
    );

    let high = DatasetVariant::new(
        VariantLabel::HighResolution,
        loaded.data.clone(),
        loaded.clusters,
        loaded.embedding,
    )?;

    let reclustering = cluster::recluster(&high.data, &ReclusterParams::default())?;
    let low = DatasetVariant::new(
        VariantLabel::LowResolution,
        high.data.clone(),
        reclustering.clusters,
        reclustering.embedding,
    )?;

    Ok(vec![high, low])
}

/// Run differential expression and both enrichment analyses for one cluster.
pub fn analyze_cluster(
    variant: &DatasetVariant,
    cluster: u32,
    ontology: &GeneSetCollection,
    hallmark: &GeneSetCollection,
    gsea: &GseaConfig,
) -> anyhow::Result<ClusterAnalysis> {
    let mask = variant.cluster_mask(cluster);
    let deg = dea::rank_genes(&variant.data.matrix, &variant.data.genes, &mask)?;
    let ranked = RankedGeneList::from_table(&deg);
    let ontology_outcome = prerank_gsea(&ranked, ontology, gsea)?;
    let hallmark_outcome = prerank_gsea(&ranked, hallmark, gsea)?;

    Ok(ClusterAnalysis {
        key: PanelKey {
            variant: variant.label,
            cluster,
        },
        deg,
        ranked,
        ontology: ontology_outcome,
        hallmark: hallmark_outcome,
    })
}

/// The per-cluster analysis loop over every variant, in the fixed iteration order.
pub fn analyze_variants(
    variants: &[DatasetVariant],
    ontology: &GeneSetCollection,
    hallmark: &GeneSetCollection,
    gsea: &GseaConfig,
) -> anyhow::Result<AnalysisSet> {
    let mut analyses = AnalysisSet::new();
    for variant in variants {
        let labels = variant.cluster_labels();
        log::info!(
            "analyzing {} variant: {} clusters",
            variant.label,
            labels.len()
        );
        for cluster in labels {
            log::info!("analyzing {} / cluster {}", variant.label, cluster);
            analyses.push(analyze_cluster(variant, cluster, ontology, hallmark, gsea)?)?;
        }
    }
    Ok(analyses)
}

/// Run the whole pipeline: load collections and dataset, analyze every (variant, cluster)
/// pair, emit the report.
pub fn run(inputs: &PipelineInputs) -> anyhow::Result<RunSummary> {
    let ontology = gmt::restrict_to_branch(
        gmt::read_gmt(&inputs.ontology_gmt, "GO biological process")?,
        ONTOLOGY_BRANCH_PREFIX,
    );
    let hallmark = gmt::read_gmt(&inputs.hallmark_gmt, "hallmark pathways")?;

    let variants = prepare_variants(&inputs.dataset)?;
    let analyses = analyze_variants(&variants, &ontology, &hallmark, &GseaConfig::default())?;
    report::emit_report(&variants, &analyses, &inputs.output)
}
