//! GMT gene set files.
//!
//! One set per line: set name, description, then the member genes, tab-separated. The
//! reference collections come from a gene set database export; parsing deduplicates to
//! (set name, gene) pairs, merging repeated set names and dropping repeated genes within a
//! set.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::enrichment::{GeneSet, GeneSetCollection};

/// Read a GMT file into a deduplicated collection.
pub fn read_gmt(path: &Path, collection_name: &str) -> anyhow::Result<GeneSetCollection> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading gene set collection {}", path.display()))?;
    parse_gmt(&content, collection_name)
        .with_context(|| format!("parsing gene set collection {}", path.display()))
}

/// Parse GMT content. Blank lines are skipped; a line without the name and description
/// fields is malformed.
pub fn parse_gmt(content: &str, collection_name: &str) -> anyhow::Result<GeneSetCollection> {
    let mut sets: Vec<GeneSet> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut members: Vec<HashSet<String>> = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let name = fields
            .next()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| anyhow::anyhow!("line {}: missing set name", line_no + 1))?;
        fields
            .next()
            .ok_or_else(|| anyhow::anyhow!("line {}: missing description field", line_no + 1))?;

        let idx = *index.entry(name.to_string()).or_insert_with(|| {
            sets.push(GeneSet {
                name: name.to_string(),
                genes: Vec::new(),
            });
            members.push(HashSet::new());
            sets.len() - 1
        });

        for gene in fields {
            if gene.is_empty() {
                continue;
            }
            if members[idx].insert(gene.to_string()) {
                sets[idx].genes.push(gene.to_string());
            }
        }
    }

    Ok(GeneSetCollection {
        name: collection_name.to_string(),
        sets,
    })
}

/// Keep only the sets of one ontology branch, selected by set name prefix.
pub fn restrict_to_branch(collection: GeneSetCollection, prefix: &str) -> GeneSetCollection {
    let before = collection.len();
    let sets: Vec<GeneSet> = collection
        .sets
        .into_iter()
        .filter(|set| set.name.starts_with(prefix))
        .collect();
    log::info!(
        "collection {}: {} of {} sets in branch {}",
        collection.name,
        sets.len(),
        before,
        prefix
    );
    GeneSetCollection {
        name: collection.name,
        sets,
    }
}
