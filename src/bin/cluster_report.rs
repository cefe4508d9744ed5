//! Render the cluster panel report for the pre-processed tumor dataset.
//!
//! No command-line flags: every analysis parameter is a fixed constant in the library and
//! the input/output locations are fixed relative paths.

use std::path::PathBuf;

use single_panels::pipeline::{self, PipelineInputs};

const DATASET_PATH: &str = "data/tumor_atlas.json";
const ONTOLOGY_GMT_PATH: &str = "data/genesets/go_biological_process.gmt";
const HALLMARK_GMT_PATH: &str = "data/genesets/hallmark.gmt";
const REPORT_PATH: &str = "figures/report/cluster_panels.pdf";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let inputs = PipelineInputs {
        dataset: PathBuf::from(DATASET_PATH),
        ontology_gmt: PathBuf::from(ONTOLOGY_GMT_PATH),
        hallmark_gmt: PathBuf::from(HALLMARK_GMT_PATH),
        output: PathBuf::from(REPORT_PATH),
    };

    match pipeline::run(&inputs) {
        Ok(summary) => {
            log::info!(
                "done: {} panel pages written to {}",
                summary.pages,
                summary.output.display()
            );
        }
        Err(err) => {
            log::error!("run aborted: {:#}", err);
            std::process::exit(1);
        }
    }
}
