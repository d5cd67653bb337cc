//! Software rasterizer and whiteboard snapshot export.
//!
//! Snapshots are pulled by the tutoring integration when the oracle asks to
//! see the board. The raster is PNG, returned both as bytes and as a
//! `data:` URI that can be embedded in an image payload directly.

#[cfg(test)]
#[path = "raster_test.rs"]
mod raster_test;

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgba, RgbaImage};

use super::{Painter, draw_grid, draw_stroke};
use crate::camera::Point;
use crate::consts::{BACKGROUND_COLOR, SNAPSHOT_MAX_SIZE, SNAPSHOT_PADDING};
use crate::doc::StrokeStore;
use crate::geom::dist_sq_to_segment;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("png encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// An encoded whiteboard raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
    /// `data:image/png;base64,...`
    pub data_uri: String,
}

/// Render every committed stroke into a padded, size-capped PNG.
/// `Ok(None)` when the board is empty.
///
/// # Errors
///
/// Returns [`SnapshotError::Encode`] if PNG encoding fails.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn export_snapshot(doc: &StrokeStore) -> Result<Option<Snapshot>, SnapshotError> {
    let Some(bounds) = doc.bounds() else {
        return Ok(None);
    };
    let area = bounds.padded(SNAPSHOT_PADDING);
    let longest = area.width().max(area.height());
    let scale = if longest > SNAPSHOT_MAX_SIZE { SNAPSHOT_MAX_SIZE / longest } else { 1.0 };

    let width = (area.width() * scale).round().max(1.0) as u32;
    let height = (area.height() * scale).round().max(1.0) as u32;

    let mut painter = RasterPainter::new(width, height);
    painter.clear(BACKGROUND_COLOR)?;
    painter.set_transform(scale, -area.min_x * scale, -area.min_y * scale)?;
    draw_grid(&mut painter, area)?;
    for stroke in doc.chronological() {
        draw_stroke(&mut painter, stroke)?;
    }

    let png = painter.encode_png()?;
    let data_uri = format!("data:image/png;base64,{}", STANDARD.encode(&png));
    Ok(Some(Snapshot { width, height, png, data_uri }))
}

/// [`Painter`] over an in-memory RGBA buffer. Text and glow are not drawn.
pub struct RasterPainter {
    image: RgbaImage,
    scale: f64,
    tx: f64,
    ty: f64,
    alpha: f64,
}

impl RasterPainter {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { image: RgbaImage::new(width, height), scale: 1.0, tx: 0.0, ty: 0.0, alpha: 1.0 }
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Encode the buffer as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Encode`] if the encoder fails.
    pub fn encode_png(&self) -> Result<Vec<u8>, SnapshotError> {
        let mut cursor = Cursor::new(Vec::new());
        self.image.write_to(&mut cursor, ImageFormat::Png)?;
        Ok(cursor.into_inner())
    }

    fn to_screen(&self, p: Point) -> Point {
        Point::new(p.x * self.scale + self.tx, p.y * self.scale + self.ty)
    }

    /// Visit every pixel whose center lies in the screen-space box, clipped
    /// to the image, and paint it where `inside` holds.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn fill_where(&mut self, min: Point, max: Point, color: Rgba<u8>, inside: impl Fn(Point) -> bool) {
        let (w, h) = (i64::from(self.image.width()), i64::from(self.image.height()));
        let x0 = (min.x.floor() as i64).max(0);
        let y0 = (min.y.floor() as i64).max(0);
        let x1 = (max.x.ceil() as i64).min(w - 1);
        let y1 = (max.y.ceil() as i64).min(h - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                if inside(Point::new(x as f64 + 0.5, y as f64 + 0.5)) {
                    self.blend(x as u32, y as u32, color);
                }
            }
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn blend(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        let a = (f64::from(color[3]) / 255.0) * self.alpha;
        let dst = self.image.get_pixel_mut(x, y);
        for i in 0..3 {
            let mixed = f64::from(color[i]) * a + f64::from(dst[i]) * (1.0 - a);
            dst[i] = mixed.round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = 255;
    }
}

impl Painter for RasterPainter {
    type Error = SnapshotError;

    fn size(&self) -> (f64, f64) {
        (f64::from(self.image.width()), f64::from(self.image.height()))
    }

    fn clear(&mut self, color: &str) -> Result<(), SnapshotError> {
        let px = parse_color(color);
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([px[0], px[1], px[2], 255]);
        }
        Ok(())
    }

    fn set_transform(&mut self, scale: f64, tx: f64, ty: f64) -> Result<(), SnapshotError> {
        self.scale = scale;
        self.tx = tx;
        self.ty = ty;
        Ok(())
    }

    fn polyline(&mut self, points: &[Point], color: &str, width: f64) -> Result<(), SnapshotError> {
        let color = parse_color(color);
        let half = (width * self.scale * 0.5).max(0.5);
        let screen: Vec<Point> = points.iter().map(|p| self.to_screen(*p)).collect();
        for pair in screen.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let min = Point::new(a.x.min(b.x) - half, a.y.min(b.y) - half);
            let max = Point::new(a.x.max(b.x) + half, a.y.max(b.y) + half);
            self.fill_where(min, max, color, |p| dist_sq_to_segment(p, a, b) <= half * half);
        }
        Ok(())
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: &str) -> Result<(), SnapshotError> {
        let c = self.to_screen(center);
        let r = radius * self.scale;
        let color = parse_color(color);
        self.fill_where(Point::new(c.x - r, c.y - r), Point::new(c.x + r, c.y + r), color, |p| p.dist_sq(c) <= r * r);
        Ok(())
    }

    fn stroke_circle(&mut self, center: Point, radius: f64, color: &str, width: f64) -> Result<(), SnapshotError> {
        let c = self.to_screen(center);
        let r = radius * self.scale;
        let half = (width * self.scale * 0.5).max(0.5);
        let color = parse_color(color);
        let outer = r + half;
        self.fill_where(Point::new(c.x - outer, c.y - outer), Point::new(c.x + outer, c.y + outer), color, |p| {
            (p.sub(c).length() - r).abs() <= half
        });
        Ok(())
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str) -> Result<(), SnapshotError> {
        let min = self.to_screen(Point::new(x, y));
        let max = self.to_screen(Point::new(x + w, y + h));
        let color = parse_color(color);
        self.fill_where(min, max, color, |p| p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y);
        Ok(())
    }

    fn text(&mut self, _text: &str, _at: Point, _color: &str, _size: f64) -> Result<(), SnapshotError> {
        Ok(())
    }

    fn set_glow(&mut self, _color: Option<&str>, _blur: f64) {}

    fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }
}

/// `#rgb`, `#rrggbb`, or `#rrggbbaa`. Anything else paints white.
#[must_use]
pub fn parse_color(color: &str) -> Rgba<u8> {
    const FALLBACK: Rgba<u8> = Rgba([255, 255, 255, 255]);
    let Some(hex) = color.strip_prefix('#') else {
        return FALLBACK;
    };
    let channel = |s: &str| match u8::from_str_radix(s, 16) {
        Ok(v) => Some(v),
        Err(_) => None,
    };
    let parsed = match hex.len() {
        3 => hex
            .chars()
            .map(|c| channel(&format!("{c}{c}")))
            .collect::<Option<Vec<u8>>>()
            .map(|v| [v[0], v[1], v[2], 255]),
        6 | 8 => (0..hex.len())
            .step_by(2)
            .map(|i| hex.get(i..i + 2).and_then(channel))
            .collect::<Option<Vec<u8>>>()
            .map(|v| [v[0], v[1], v[2], v.get(3).copied().unwrap_or(255)]),
        _ => None,
    };
    parsed.map_or(FALLBACK, Rgba)
}
