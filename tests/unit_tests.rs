use nalgebra_sparse::{CooMatrix, CsrMatrix};
use single_panels::dea::welch::welch_from_sums;
use single_panels::dea::{RankedGeneList, correction, rank_genes};
use single_panels::enrichment::prerank::{GseaConfig, prerank_gsea};
use single_panels::enrichment::{GeneSet, GeneSetCollection};

#[cfg(test)]
mod public_api {
    use super::*;

    #[test]
    fn welch_detects_a_clear_marker() {
        // Expressing cells: [9, 10, 11, 10, 10] -> sum=50, sum_sq=502
        // Background cells: [1, 2, 3, 2, 2] -> sum=10, sum_sq=22
        let result = welch_from_sums(50.0, 502.0, 5.0, 10.0, 22.0, 5.0);

        println!("marker gene: t={:.3}, p={:.6}", result.statistic, result.p_value);
        assert!(result.p_value < 0.001, "Expected highly significant p-value");
        assert!(result.statistic > 5.0, "Expected large t-statistic");
    }

    #[test]
    fn welch_is_flat_for_identical_groups() {
        let result = welch_from_sums(15.0, 75.0, 3.0, 15.0, 75.0, 3.0);
        assert!(result.statistic.abs() < 0.001);
        assert!(result.p_value > 0.9);
    }

    #[test]
    fn rank_genes_workflow_on_a_sparse_matrix() {
        // 6 cells x 3 genes; gene 0 marks the cluster, gene 1 is flat, gene 2 marks the
        // background cells
        let mut coo = CooMatrix::new(6, 3);
        coo.push(0, 0, 5.0f64);
        coo.push(1, 0, 5.2);
        coo.push(2, 0, 4.8);
        for cell in 0..6 {
            coo.push(cell, 1, 3.0);
        }
        coo.push(3, 2, 6.0);
        coo.push(4, 2, 6.1);
        coo.push(5, 2, 5.9);
        let matrix = CsrMatrix::from(&coo);

        let genes = vec!["UP".to_string(), "FLAT".to_string(), "DOWN".to_string()];
        let mask = vec![true, true, true, false, false, false];
        let table = rank_genes(&matrix, &genes, &mask).expect("rank_genes should work");

        for record in &table.records {
            println!(
                "{}: log2fc={:.3}, p={:.6}, adj={:.6}",
                record.gene, record.log2_fold_change, record.p_value, record.adjusted_p_value
            );
        }

        assert_eq!(table.len(), 3);
        let up = table.records.iter().find(|r| r.gene == "UP").unwrap();
        let down = table.records.iter().find(|r| r.gene == "DOWN").unwrap();
        let flat = table.records.iter().find(|r| r.gene == "FLAT").unwrap();
        assert!(up.log2_fold_change > 1.0);
        assert!(down.log2_fold_change < -1.0);
        assert!(flat.log2_fold_change.abs() < 1e-6);
        assert!(flat.p_value > 0.5);
    }

    #[test]
    fn bh_adjustment_matches_known_values() {
        let p_values = vec![0.05, 0.01, 0.1, 0.04, 0.02];
        let expected = [0.0625, 0.05, 0.1, 0.0625, 0.05];
        let adjusted = correction::benjamini_hochberg(&p_values).unwrap();
        for (a, e) in adjusted.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-9, "expected {}, got {}", e, a);
        }
    }

    #[test]
    fn prerank_scores_a_marker_program() {
        use single_panels::dea::{DegRecord, DegTable};

        let records = (0..30)
            .map(|i| DegRecord {
                gene: format!("G{:02}", i),
                log2_fold_change: 15.0 - i as f64,
                statistic: 0.0,
                p_value: 0.5,
                adjusted_p_value: 0.5,
            })
            .collect();
        let ranked = RankedGeneList::from_table(&DegTable { records });

        let collection = GeneSetCollection {
            name: "demo".to_string(),
            sets: vec![GeneSet {
                name: "TOP_PROGRAM".to_string(),
                genes: (0..5).map(|i| format!("G{:02}", i)).collect(),
            }],
        };

        let outcome = prerank_gsea(&ranked, &collection, &GseaConfig::quick()).unwrap();
        let table = outcome.table().expect("the program overlaps the ranking");
        println!(
            "TOP_PROGRAM: es={:.3}, nes={:.3}, p={:.4}",
            table.rows[0].es, table.rows[0].nes, table.rows[0].p_value
        );
        assert!(table.rows[0].es > 0.9);
        assert!(table.rows[0].nes > 1.0);
        assert!(table.rows[0].p_value < 0.1);
    }
}
