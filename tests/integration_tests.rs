// End-to-end tests for the single-panels pipeline: synthetic datasets on disk, the full
// prepare / analyze / emit sequence, and the fixed page-count and iteration-order
// guarantees of the report.

use std::fs;
use std::path::{Path, PathBuf};

use single_panels::dataset::VariantLabel;
use single_panels::dataset::io::DatasetFile;
use single_panels::enrichment::gmt::parse_gmt;
use single_panels::enrichment::prerank::GseaConfig;
use single_panels::pipeline::{self, PanelKey, PipelineInputs};

/// The smallest interesting scenario: 3 cells, 2 marker genes, 2 pre-assigned clusters.
fn three_cell_dataset() -> DatasetFile {
    DatasetFile {
        genes: vec!["MS4A1".to_string(), "CD3E".to_string()],
        barcodes: vec!["AAA-1".to_string(), "CCC-1".to_string(), "GGG-1".to_string()],
        triplets: vec![(0, 0, 2.5), (1, 1, 3.0), (2, 1, 2.8)],
        clusters: vec![0, 1, 1],
        embedding: vec![[0.0, 0.0], [4.0, 1.0], [4.2, 0.8]],
    }
}

/// Two expression blobs of 12 cells each over 6 genes; genes G0-G2 mark the first blob,
/// G3-G5 the second.
fn two_blob_dataset() -> DatasetFile {
    let n_per_blob = 12usize;
    let genes: Vec<String> = (0..6).map(|g| format!("G{}", g)).collect();
    let mut triplets = Vec::new();
    let mut clusters = Vec::new();
    let mut embedding = Vec::new();
    let mut barcodes = Vec::new();
    for cell in 0..(n_per_blob * 2) {
        let blob = cell / n_per_blob;
        let jitter = (cell % 3) as f64 * 0.1;
        for gene in 0..6 {
            let marks_blob = if blob == 0 { gene < 3 } else { gene >= 3 };
            let value = if marks_blob { 5.0 + jitter } else { 0.3 };
            triplets.push((cell, gene, value));
        }
        clusters.push(blob as u32);
        embedding.push([blob as f64 * 8.0 + jitter, jitter]);
        barcodes.push(format!("cell-{}", cell));
    }
    DatasetFile {
        genes,
        barcodes,
        triplets,
        clusters,
        embedding,
    }
}

fn write_inputs(
    dir: &Path,
    dataset: &DatasetFile,
    ontology_gmt: &str,
    hallmark_gmt: &str,
) -> PipelineInputs {
    let dataset_path = dir.join("dataset.json");
    fs::write(&dataset_path, serde_json::to_string(dataset).unwrap()).unwrap();
    let ontology_path = dir.join("go.gmt");
    fs::write(&ontology_path, ontology_gmt).unwrap();
    let hallmark_path = dir.join("hallmark.gmt");
    fs::write(&hallmark_path, hallmark_gmt).unwrap();
    PipelineInputs {
        dataset: dataset_path,
        ontology_gmt: ontology_path,
        hallmark_gmt: hallmark_path,
        output: dir.join("figures").join("report").join("cluster_panels.pdf"),
    }
}

fn expected_pages(variants: &[single_panels::dataset::DatasetVariant]) -> usize {
    variants.iter().map(|v| v.cluster_labels().len()).sum()
}

#[test]
fn three_cell_scenario_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    // with a 2-gene universe no set passes the size filters, so every enrichment
    // quadrant is the placeholder; the run must still complete
    let inputs = write_inputs(
        dir.path(),
        &three_cell_dataset(),
        "GOBP_B_CELL_ACTIVATION\tdesc\tMS4A1\tCD3E\n",
        "HALLMARK_SOMETHING\tdesc\tMS4A1\tCD3E\n",
    );

    let summary = pipeline::run(&inputs).unwrap();

    let variants = pipeline::prepare_variants(&inputs.dataset).unwrap();
    assert_eq!(variants.len(), 2);
    assert_eq!(variants[0].label, VariantLabel::HighResolution);
    assert_eq!(variants[1].label, VariantLabel::LowResolution);
    assert!(variants.iter().all(|v| !v.cluster_labels().is_empty()));

    assert_eq!(summary.pages, expected_pages(&variants));
    assert!(inputs.output.exists());
    assert!(fs::metadata(&inputs.output).unwrap().len() > 0);
}

#[test]
fn analyses_cover_every_cluster_with_full_deg_tables() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), &three_cell_dataset(), "", "");

    let variants = pipeline::prepare_variants(&inputs.dataset).unwrap();
    let empty = parse_gmt("", "empty").unwrap();
    let analyses =
        pipeline::analyze_variants(&variants, &empty, &empty, &GseaConfig::quick()).unwrap();

    // the keys enumerate exactly the distinct cluster labels of each variant, variants in
    // their fixed order, clusters ascending
    let expected_keys: Vec<PanelKey> = variants
        .iter()
        .flat_map(|v| {
            v.cluster_labels().into_iter().map(|cluster| PanelKey {
                variant: v.label,
                cluster,
            })
        })
        .collect();
    assert_eq!(analyses.keys(), expected_keys);

    for key in &expected_keys {
        let analysis = analyses.get(key).unwrap();
        // one row per gene tested
        assert_eq!(analysis.deg.len(), 2);
        assert_eq!(analysis.ranked.len(), 2);
        // empty collections can only produce the no-hits marker
        assert!(!analysis.ontology.has_results());
        assert!(!analysis.hallmark.has_results());
    }
}

#[test]
fn empty_collections_still_produce_every_page() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), &three_cell_dataset(), "", "");

    let summary = pipeline::run(&inputs).unwrap();
    let variants = pipeline::prepare_variants(&inputs.dataset).unwrap();
    assert_eq!(summary.pages, expected_pages(&variants));
    assert!(inputs.output.exists());
}

#[test]
fn marker_sets_reach_the_enrichment_table_path() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(
        dir.path(),
        &two_blob_dataset(),
        "GOBP_BLOB_A_PROGRAM\tdesc\tG0\tG1\tG2\nGOMF_WRONG_BRANCH\tdesc\tG0\tG1\n",
        "HALLMARK_BLOB_B_PROGRAM\tdesc\tG3\tG4\tG5\n",
    );

    let variants = pipeline::prepare_variants(&inputs.dataset).unwrap();
    let ontology = parse_gmt("GOBP_BLOB_A_PROGRAM\tdesc\tG0\tG1\tG2\n", "go").unwrap();
    let hallmark = parse_gmt("HALLMARK_BLOB_B_PROGRAM\tdesc\tG3\tG4\tG5\n", "hallmark").unwrap();
    let analyses =
        pipeline::analyze_variants(&variants, &ontology, &hallmark, &GseaConfig::quick()).unwrap();

    let key = PanelKey {
        variant: VariantLabel::HighResolution,
        cluster: 0,
    };
    let analysis = analyses.get(&key).unwrap();
    let table = analysis
        .ontology
        .table()
        .expect("the blob-A program overlaps the ranking");
    assert!(table.is_transformed());
    assert_eq!(table.rows[0].set_name, "GOBP_BLOB_A_PROGRAM");
    // blob A's marker program sits at the top of cluster 0's ranking
    assert!(table.rows[0].es > 0.5);

    // the mirrored hallmark set is depleted for cluster 0
    let hallmark_table = analysis.hallmark.table().unwrap();
    assert!(hallmark_table.rows[0].es < -0.5);

    // and the full run renders one page per (variant, cluster) pair
    let summary = pipeline::run(&inputs).unwrap();
    assert_eq!(summary.pages, expected_pages(&variants));
}
