//! A plotters drawing backend targeting one printpdf page layer.
//!
//! The chart renderers in [`crate::plotting`] are generic over the backend; plugging this
//! one in makes every panel a vector page of the report document. Primitives map to PDF
//! path operations, text maps to the built-in Helvetica fonts (no system font lookup), and
//! alpha is emulated by blending toward the white page background.

use std::convert::Infallible;

use plotters_backend::text_anchor::{HPos, VPos};
use plotters_backend::{
    BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend,
    DrawingErrorKind, FontStyle, FontTransform,
};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    Color, IndirectFontRef, Line, Mm, PdfLayerReference, Point, Polygon, Pt, Rgb,
    TextMatrix, calculate_points_for_circle, calculate_points_for_rect,
};

/// Logical canvas size in pixels; at [`PT_PER_PX`] this is US letter, landscape.
pub const PAGE_WIDTH_PX: u32 = 1584;
pub const PAGE_HEIGHT_PX: u32 = 1224;
/// Pixel-to-point scale: 1584 px × 0.5 = 792 pt = 11 in.
pub const PT_PER_PX: f64 = 0.5;

/// Backend drawing onto one page layer of the report document.
pub struct PdfPageBackend {
    layer: PdfLayerReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    width: u32,
    height: u32,
}

impl PdfPageBackend {
    pub(crate) fn new(
        layer: PdfLayerReference,
        font: IndirectFontRef,
        font_bold: IndirectFontRef,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            layer,
            font,
            font_bold,
            width,
            height,
        }
    }

    /// Pixel coordinate (top-left origin, y down) to page point (bottom-left origin, y up).
    fn point(&self, x: f64, y: f64) -> Point {
        Point {
            x: Pt((x * PT_PER_PX) as f32),
            y: Pt(((self.height as f64 - y) * PT_PER_PX) as f32),
        }
    }

    fn coord(&self, c: BackendCoord) -> Point {
        self.point(c.0 as f64, c.1 as f64)
    }

    /// Alpha-blend toward the white page; PDF output stays opaque.
    fn color(&self, color: BackendColor) -> Color {
        let alpha = color.alpha.clamp(0.0, 1.0);
        let blend = |v: u8| (v as f64 / 255.0) * alpha + (1.0 - alpha);
        Color::Rgb(Rgb::new(
            blend(color.rgb.0) as f32,
            blend(color.rgb.1) as f32,
            blend(color.rgb.2) as f32,
            None,
        ))
    }

    fn apply_stroke<S: BackendStyle>(&self, style: &S) {
        self.layer.set_outline_color(self.color(style.color()));
        self.layer
            .set_outline_thickness((style.stroke_width().max(1) as f64 * PT_PER_PX) as f32);
    }

    fn apply_fill(&self, color: BackendColor) {
        self.layer.set_fill_color(self.color(color));
    }

    fn font_for(&self, style: FontStyle) -> &IndirectFontRef {
        match style {
            FontStyle::Bold => &self.font_bold,
            _ => &self.font,
        }
    }

    fn text_box(&self, text: &str, size_px: f64) -> (f64, f64) {
        let width = text.chars().count() as f64 * size_px * 0.6;
        let height = size_px * 1.2;
        (width, height)
    }
}

impl DrawingBackend for PdfPageBackend {
    type ErrorType = Infallible;

    fn get_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Infallible>> {
        Ok(())
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Infallible>> {
        Ok(())
    }

    fn draw_pixel(
        &mut self,
        point: BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        if color.alpha <= 0.0 {
            return Ok(());
        }
        self.apply_fill(color);
        let center = self.point(point.0 as f64 + 0.5, point.1 as f64 + 0.5);
        let points = calculate_points_for_rect(Pt(PT_PER_PX as f32), Pt(PT_PER_PX as f32), center.x, center.y);
        self.layer.add_polygon(Polygon {
            rings: vec![points],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
        Ok(())
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        if style.color().alpha <= 0.0 {
            return Ok(());
        }
        self.apply_stroke(style);
        self.layer.add_line(Line {
            points: vec![(self.coord(from), false), (self.coord(to), false)],
            is_closed: false,
        });
        Ok(())
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        if style.color().alpha <= 0.0 {
            return Ok(());
        }
        let points: Vec<(Point, bool)> = path
            .into_iter()
            .map(|c| (self.coord(c), false))
            .collect();
        if points.len() < 2 {
            return Ok(());
        }
        self.apply_stroke(style);
        self.layer.add_line(Line {
            points,
            is_closed: false,
        });
        Ok(())
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        if style.color().alpha <= 0.0 {
            return Ok(());
        }
        let width_px = (bottom_right.0 - upper_left.0).abs() as f64;
        let height_px = (bottom_right.1 - upper_left.1).abs() as f64;
        let center = self.point(
            (upper_left.0 + bottom_right.0) as f64 / 2.0,
            (upper_left.1 + bottom_right.1) as f64 / 2.0,
        );
        let points = calculate_points_for_rect(
            Pt((width_px * PT_PER_PX) as f32),
            Pt((height_px * PT_PER_PX) as f32),
            center.x,
            center.y,
        );
        if fill {
            self.apply_fill(style.color());
            self.layer.add_polygon(Polygon {
                rings: vec![points],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            });
        } else {
            self.apply_stroke(style);
            self.layer.add_line(Line {
                points,
                is_closed: true,
            });
        }
        Ok(())
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        if style.color().alpha <= 0.0 {
            return Ok(());
        }
        let mid = self.coord(center);
        let points = calculate_points_for_circle(Pt((radius as f64 * PT_PER_PX) as f32), mid.x, mid.y);
        if fill {
            self.apply_fill(style.color());
            self.layer.add_polygon(Polygon {
                rings: vec![points],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            });
        } else {
            self.apply_stroke(style);
            self.layer.add_line(Line {
                points,
                is_closed: true,
            });
        }
        Ok(())
    }

    fn fill_polygon<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        vert: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        if style.color().alpha <= 0.0 {
            return Ok(());
        }
        let points: Vec<(Point, bool)> = vert
            .into_iter()
            .map(|c| (self.coord(c), false))
            .collect();
        if points.len() < 3 {
            return Ok(());
        }
        self.apply_fill(style.color());
        self.layer.add_polygon(Polygon {
            rings: vec![points],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
        Ok(())
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        if text.is_empty() || style.color().alpha <= 0.0 {
            return Ok(());
        }
        let size_px = style.size();
        let size_pt = size_px * PT_PER_PX;
        let (box_w, box_h) = self.text_box(text, size_px);

        let anchor = style.anchor();
        let left = pos.0 as f64
            + match anchor.h_pos {
                HPos::Left => 0.0,
                HPos::Center => -box_w / 2.0,
                HPos::Right => -box_w,
            };
        let top = pos.1 as f64
            + match anchor.v_pos {
                VPos::Top => 0.0,
                VPos::Center => -box_h / 2.0,
                VPos::Bottom => -box_h,
            };
        let baseline_px = top + size_px * 0.88;

        self.apply_fill(style.color());
        let font = self.font_for(style.style()).clone();

        match style.transform() {
            FontTransform::None => {
                let origin = self.point(left, baseline_px);
                self.layer
                    .use_text(text, size_pt as f32, Mm::from(origin.x), Mm::from(origin.y), &font);
            }
            transform => {
                // rotated text only appears as axis descriptions; anchor the run at the
                // given position and let the text matrix carry the rotation
                let angle = match transform {
                    FontTransform::Rotate90 => -90.0,
                    FontTransform::Rotate180 => 180.0,
                    FontTransform::Rotate270 => 90.0,
                    _ => 0.0,
                };
                let shift = box_w / 2.0;
                let origin = match transform {
                    FontTransform::Rotate90 => self.point(pos.0 as f64, pos.1 as f64 - shift),
                    FontTransform::Rotate270 => self.point(pos.0 as f64 + size_px, pos.1 as f64 + shift),
                    _ => self.coord(pos),
                };
                self.layer.begin_text_section();
                self.layer.set_font(&font, size_pt as f32);
                self.layer
                    .set_text_matrix(TextMatrix::TranslateRotate(origin.x, origin.y, angle));
                self.layer.write_text(text, &font);
                self.layer.end_text_section();
            }
        }
        Ok(())
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Infallible>> {
        let (w, h) = self.text_box(text, style.size());
        Ok((w.ceil() as u32, h.ceil() as u32))
    }
}
