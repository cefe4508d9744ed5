//! Multi-page PDF report emission.
//!
//! The emitter replays the analysis accumulator in its fixed (variant, cluster) order and
//! appends one panel page per entry to a single document. Document creation failure is
//! fatal; there is no partial-document recovery.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerIndex, PdfPageIndex, Pt};

use crate::dataset::DatasetVariant;
use crate::pipeline::AnalysisSet;
use crate::plotting;
use plotters::prelude::IntoDrawingArea;

pub mod backend;

use backend::{PAGE_HEIGHT_PX, PAGE_WIDTH_PX, PT_PER_PX, PdfPageBackend};

const PAGE_WIDTH_PT: f64 = PAGE_WIDTH_PX as f64 * PT_PER_PX;
const PAGE_HEIGHT_PT: f64 = PAGE_HEIGHT_PX as f64 * PT_PER_PX;

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub pages: usize,
    pub output: PathBuf,
}

/// A multi-page PDF document the panel pages are appended to.
pub struct PdfReport {
    doc: PdfDocumentReference,
    file: BufWriter<File>,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    first_page: Option<(PdfPageIndex, PdfLayerIndex)>,
    pages: usize,
    path: PathBuf,
}

impl PdfReport {
    /// Create the document at `path`, creating missing parent directories first. An
    /// unwritable location fails here, before any analysis output is rendered into the
    /// document.
    pub fn create(path: &Path, title: &str) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating report directory {}", parent.display()))?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("creating report document {}", path.display()))?;

        let (doc, page, layer) = PdfDocument::new(
            title,
            Mm::from(Pt(PAGE_WIDTH_PT as f32)),
            Mm::from(Pt(PAGE_HEIGHT_PT as f32)),
            "panel",
        );
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow::anyhow!("registering report font: {}", e))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow::anyhow!("registering report font: {}", e))?;

        Ok(Self {
            doc,
            file: BufWriter::new(file),
            font,
            font_bold,
            first_page: Some((page, layer)),
            pages: 0,
            path: path.to_path_buf(),
        })
    }

    /// Append a page and return the drawing backend for it.
    pub fn add_panel_page(&mut self) -> PdfPageBackend {
        let (page, layer) = match self.first_page.take() {
            Some(indices) => indices,
            None => self.doc.add_page(
                Mm::from(Pt(PAGE_WIDTH_PT as f32)),
                Mm::from(Pt(PAGE_HEIGHT_PT as f32)),
                "panel",
            ),
        };
        self.pages += 1;
        let layer_ref = self.doc.get_page(page).get_layer(layer);
        PdfPageBackend::new(
            layer_ref,
            self.font.clone(),
            self.font_bold.clone(),
            PAGE_WIDTH_PX,
            PAGE_HEIGHT_PX,
        )
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Write the document and return the run summary.
    pub fn save(self) -> anyhow::Result<RunSummary> {
        let mut writer = self.file;
        self.doc
            .save(&mut writer)
            .map_err(|e| anyhow::anyhow!("writing report document: {}", e))?;
        Ok(RunSummary {
            pages: self.pages,
            output: self.path,
        })
    }
}

/// Render one panel page per accumulator entry, in accumulator order, into a single
/// document at `path`.
pub fn emit_report(
    variants: &[DatasetVariant],
    analyses: &AnalysisSet,
    path: &Path,
) -> anyhow::Result<RunSummary> {
    let mut report = PdfReport::create(path, "Cluster panels")?;
    for analysis in analyses.iter() {
        let variant = variants
            .iter()
            .find(|v| v.label == analysis.key.variant)
            .ok_or_else(|| {
                anyhow::anyhow!("no dataset variant labeled {}", analysis.key.variant)
            })?;

        let root = report.add_panel_page().into_drawing_area();
        plotting::draw_panel_page(
            &root,
            variant,
            analysis.key.cluster,
            &analysis.deg,
            &analysis.ontology,
            &analysis.hallmark,
        )?;
        root.present()?;
        log::info!("rendered panel {}", analysis.key);
    }

    let summary = report.save()?;
    log::info!(
        "report written: {} pages at {}",
        summary.pages,
        summary.output.display()
    );
    Ok(summary)
}
