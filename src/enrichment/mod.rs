//! Gene set enrichment analysis against fixed reference collections.
//!
//! Two collections are consulted per cluster, one ontology-based (GO Biological Process
//! branch) and one curated (hallmark pathways). Enrichment runs on the ranked gene list
//! derived from the DEG table and either produces a scored table or the explicit
//! [`EnrichmentOutcome::NoHits`] marker; an empty result is an expected, handled condition,
//! never an error.

pub mod gmt;
pub mod prerank;

/// One named gene set. Genes are unique within a set.
#[derive(Debug, Clone)]
pub struct GeneSet {
    pub name: String,
    pub genes: Vec<String>,
}

/// A named collection of gene sets.
#[derive(Debug, Clone)]
pub struct GeneSetCollection {
    pub name: String,
    pub sets: Vec<GeneSet>,
}

impl GeneSetCollection {
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// One scored gene set in an enrichment result.
#[derive(Debug, Clone)]
pub struct EnrichmentRow {
    pub set_name: String,
    /// Raw enrichment score (signed maximum deviation of the running sum).
    pub es: f64,
    /// Normalized enrichment score.
    pub nes: f64,
    pub p_value: f64,
    pub adjusted_p_value: f64,
    /// Transformed significance, -log10 of the adjusted p-value. Populated by
    /// [`EnrichmentTable::log_transform_significance`].
    pub log_significance: f64,
}

/// Ordered enrichment result for one (variant, cluster, collection) triple.
#[derive(Debug, Clone)]
pub struct EnrichmentTable {
    pub rows: Vec<EnrichmentRow>,
    transformed: bool,
}

impl EnrichmentTable {
    pub fn new(rows: Vec<EnrichmentRow>) -> Self {
        EnrichmentTable {
            rows,
            transformed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fill the transformed-significance column with -log10 of the adjusted p-values.
    ///
    /// The transform must hit each result set exactly once; a second call is a no-op, so a
    /// table can never be transformed cumulatively. Adjusted p-values are floored at the
    /// smallest positive double before the logarithm.
    pub fn log_transform_significance(&mut self) {
        if self.transformed {
            return;
        }
        for row in &mut self.rows {
            row.log_significance = -(row.adjusted_p_value.max(f64::MIN_POSITIVE)).log10();
        }
        self.transformed = true;
    }

    pub fn is_transformed(&self) -> bool {
        self.transformed
    }

    /// The `n` most significant rows. Rows are kept sorted by ascending adjusted p-value,
    /// so this is a prefix.
    pub fn top_rows(&self, n: usize) -> &[EnrichmentRow] {
        &self.rows[..n.min(self.rows.len())]
    }
}

/// Outcome of one enrichment run: a scored table, or the explicit marker that the test
/// returned zero rows. The marker still renders (as a placeholder quadrant); the panel
/// assembly consumes both variants uniformly.
#[derive(Debug, Clone)]
pub enum EnrichmentOutcome {
    Table(EnrichmentTable),
    NoHits,
}

impl EnrichmentOutcome {
    pub fn has_results(&self) -> bool {
        matches!(self, EnrichmentOutcome::Table(_))
    }

    pub fn table(&self) -> Option<&EnrichmentTable> {
        match self {
            EnrichmentOutcome::Table(table) => Some(table),
            EnrichmentOutcome::NoHits => None,
        }
    }
}
