//! Chart rendering for the panel report.
//!
//! Four renderers, all generic over the plotters backend: the cluster map (embedding
//! scatter with the current cluster highlighted), the volcano plot (per-gene effect against
//! transformed significance, with capped gene labels), and the enrichment dot plot used for
//! both gene set collections. A panel page composes them in a fixed 2x2 layout; the
//! enrichment quadrants render the "No significant hits" placeholder when a test returned
//! zero rows.

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{Palette, Palette99};

use crate::dataset::DatasetVariant;
use crate::dea::{DegTable, LABEL_CANDIDATES};
use crate::enrichment::EnrichmentOutcome;

/// Gene sets shown per dot plot, most significant first.
pub const MAX_ENRICHMENT_ROWS: usize = 15;
/// Volcano labels may collide this many times in total before further colliding labels are
/// dropped.
pub const MAX_LABEL_OVERLAPS: usize = 10;
/// Adjusted significance below which volcano points are tinted by direction.
pub const SIGNIFICANCE_TINT_THRESHOLD: f64 = 0.05;

const CAPTION_FONT: (&str, u32) = ("sans-serif", 20);
const AXIS_LABEL_FONT: (&str, u32) = ("sans-serif", 11);
const GENE_LABEL_FONT: (&str, u32) = ("sans-serif", 11);
const SET_NAME_CHARS: usize = 30;

/// Render the full 2x2 panel for one (variant, cluster) pair: cluster map beside volcano,
/// stacked above the two enrichment dot plots.
pub fn draw_panel_page<DB>(
    root: &DrawingArea<DB, Shift>,
    variant: &DatasetVariant,
    cluster: u32,
    deg: &DegTable,
    ontology: &EnrichmentOutcome,
    hallmark: &EnrichmentOutcome,
) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let quadrants = root.split_evenly((2, 2));

    draw_cluster_map(&quadrants[0], variant, cluster)?;
    draw_volcano(
        &quadrants[1],
        deg,
        &format!("{} | cluster {} | volcano", variant.label, cluster),
    )?;
    draw_enrichment_dots(
        &quadrants[2],
        ontology,
        &format!("{} | cluster {} | GO biological process", variant.label, cluster),
    )?;
    draw_enrichment_dots(
        &quadrants[3],
        hallmark,
        &format!("{} | cluster {} | hallmark pathways", variant.label, cluster),
    )?;
    Ok(())
}

/// Embedding scatter colored per cluster; the highlighted cluster is drawn saturated and
/// larger, every other cluster is faded.
pub fn draw_cluster_map<DB>(
    area: &DrawingArea<DB, Shift>,
    variant: &DatasetVariant,
    highlight: u32,
) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let x_range = padded_range(variant.embedding.iter().map(|c| c[0]));
    let y_range = padded_range(variant.embedding.iter().map(|c| c[1]));

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("{} | cluster {} | cluster map", variant.label, highlight),
            CAPTION_FONT,
        )
        .margin(8)
        .x_label_area_size(22)
        .y_label_area_size(30)
        .build_cartesian_2d(x_range, y_range)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(4)
        .y_labels(4)
        .label_style(AXIS_LABEL_FONT)
        .draw()?;

    for label in variant.cluster_labels() {
        let color = Palette99::pick(label as usize);
        let (style, size) = if label == highlight {
            (color.filled(), 4)
        } else {
            (color.mix(0.25).filled(), 2)
        };
        chart.draw_series(
            variant
                .embedding
                .iter()
                .zip(&variant.clusters)
                .filter(|&(_, &c)| c == label)
                .map(|(coord, _)| Circle::new((coord[0], coord[1]), size, style)),
        )?;
    }
    Ok(())
}

/// Volcano plot: x = log2 fold change, y = -log10 adjusted p. Labels are overlaid only for
/// the leading label candidates, with a bound on permitted label overlaps.
///
/// Expects the table in its |log2FC| ordering, whose prefix is the label candidate list.
pub fn draw_volcano<DB>(
    area: &DrawingArea<DB, Shift>,
    deg: &DegTable,
    title: &str,
) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let transformed: Vec<(f64, f64)> = deg
        .records
        .iter()
        .map(|r| {
            (
                r.log2_fold_change,
                -(r.adjusted_p_value.max(f64::MIN_POSITIVE)).log10(),
            )
        })
        .collect();

    let x_range = padded_range(transformed.iter().map(|p| p.0));
    let y_max = transformed
        .iter()
        .map(|p| p.1)
        .fold(0.0f64, f64::max)
        .max(1.0);

    let mut chart = ChartBuilder::on(area)
        .caption(title, CAPTION_FONT)
        .margin(8)
        .x_label_area_size(26)
        .y_label_area_size(34)
        .build_cartesian_2d(x_range, 0.0..y_max * 1.08)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(5)
        .y_labels(5)
        .x_desc("log2 fold change")
        .y_desc("-log10 adjusted p")
        .label_style(AXIS_LABEL_FONT)
        .axis_desc_style(AXIS_LABEL_FONT)
        .draw()?;

    chart.draw_series(deg.records.iter().zip(&transformed).map(|(record, &(x, y))| {
        let style = if record.adjusted_p_value < SIGNIFICANCE_TINT_THRESHOLD {
            if record.log2_fold_change >= 0.0 {
                RED.mix(0.7).filled()
            } else {
                BLUE.mix(0.7).filled()
            }
        } else {
            RGBColor(150, 150, 150).mix(0.5).filled()
        };
        Circle::new((x, y), 2, style)
    }))?;

    // greedy label placement over the candidate prefix: colliding labels consume the
    // overlap budget, then get dropped
    let label_font = GENE_LABEL_FONT.into_font().color(&BLACK);
    let mut placed: Vec<(i32, i32, i32, i32)> = Vec::new();
    let mut overlaps_used = 0usize;
    for (record, &(x, y)) in deg.records.iter().zip(&transformed).take(LABEL_CANDIDATES) {
        let (px, py) = chart.backend_coord(&(x, y));
        let width = (record.gene.chars().count() as i32) * 7 + 4;
        let proposed = (px, py, px + width, py + 13);
        let collisions = placed.iter().filter(|b| boxes_overlap(**b, proposed)).count();
        if collisions > 0 {
            overlaps_used += collisions;
            if overlaps_used > MAX_LABEL_OVERLAPS {
                continue;
            }
        }
        placed.push(proposed);
        chart.draw_series(std::iter::once(Text::new(
            record.gene.clone(),
            (x, y),
            label_font.clone(),
        )))?;
    }
    Ok(())
}

/// Enrichment dot plot: the most significant gene sets on the y axis, NES on the x axis,
/// dot radius scaled by the transformed significance. A zero-row outcome renders the
/// placeholder quadrant instead; the caller treats both cases uniformly.
pub fn draw_enrichment_dots<DB>(
    area: &DrawingArea<DB, Shift>,
    outcome: &EnrichmentOutcome,
    title: &str,
) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let table = match outcome.table() {
        Some(table) if !table.is_empty() => table,
        _ => return draw_placeholder(area, title),
    };

    let rows = table.top_rows(MAX_ENRICHMENT_ROWS);
    let n = rows.len() as i32;
    let x_range = padded_range(rows.iter().map(|r| r.nes).chain(std::iter::once(0.0)));
    let max_significance = rows
        .iter()
        .map(|r| r.log_significance)
        .fold(0.0f64, f64::max)
        .max(1e-9);

    let mut chart = ChartBuilder::on(area)
        .caption(title, CAPTION_FONT)
        .margin(8)
        .x_label_area_size(26)
        .y_label_area_size(190)
        .build_cartesian_2d(x_range, (0..n).into_segmented())?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(5)
        .y_labels(n as usize)
        .x_desc("normalized enrichment score")
        .label_style(AXIS_LABEL_FONT)
        .axis_desc_style(AXIS_LABEL_FONT)
        .y_label_formatter(&|segment| match segment {
            SegmentValue::CenterOf(i) if *i >= 0 && *i < n => {
                shorten(&rows[(n - 1 - *i) as usize].set_name)
            }
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(rows.iter().enumerate().map(|(i, row)| {
        // most significant set on top
        let slot = SegmentValue::CenterOf(n - 1 - i as i32);
        let radius = 3 + (row.log_significance / max_significance * 5.0).round() as i32;
        let color = if row.nes >= 0.0 {
            RED.mix(0.8)
        } else {
            BLUE.mix(0.8)
        };
        Circle::new((row.nes, slot), radius, color.filled())
    }))?;
    Ok(())
}

/// Placeholder quadrant for an enrichment run with zero significant gene sets.
fn draw_placeholder<DB>(area: &DrawingArea<DB, Shift>, title: &str) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (width, height) = area.dim_in_pixel();
    area.draw(&Text::new(
        title.to_string(),
        (10, 8),
        CAPTION_FONT.into_font().color(&BLACK),
    ))?;
    area.draw(&Text::new(
        "No significant hits",
        ((width / 2) as i32, (height / 2) as i32),
        ("sans-serif", 22)
            .into_font()
            .color(&RGBColor(110, 110, 110))
            .pos(Pos::new(HPos::Center, VPos::Center)),
    ))?;
    Ok(())
}

/// Finite min..max range with a 5% pad; degenerate inputs widen to a unit interval.
fn padded_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values {
        if v.is_finite() {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    if !lo.is_finite() || !hi.is_finite() {
        return -1.0..1.0;
    }
    if hi - lo < 1e-9 {
        lo -= 1.0;
        hi += 1.0;
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad)..(hi + pad)
}

fn boxes_overlap(a: (i32, i32, i32, i32), b: (i32, i32, i32, i32)) -> bool {
    a.0 < b.2 && b.0 < a.2 && a.1 < b.3 && b.1 < a.3
}

fn shorten(name: &str) -> String {
    if name.chars().count() <= SET_NAME_CHARS {
        name.to_string()
    } else {
        let prefix: String = name.chars().take(SET_NAME_CHARS - 1).collect();
        format!("{}…", prefix)
    }
}
