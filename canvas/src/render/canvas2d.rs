//! [`Painter`] over the browser's 2D context.
//!
//! This is the only place that touches [`web_sys::CanvasRenderingContext2d`].
//! All fallible `Canvas2D` calls propagate errors via `Result<(), JsValue>`;
//! the top-level caller ([`crate::engine::Engine::render`]) handles the result.

use std::collections::HashMap;
use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

use super::Painter;
use crate::camera::Point;

/// Player avatar images, loaded lazily and kept for the session.
#[derive(Default)]
pub struct AvatarCache {
    images: HashMap<String, HtmlImageElement>,
}

impl AvatarCache {
    /// The image for `url` once it has finished loading. Starts the load on
    /// first request.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the image element cannot be created.
    pub fn ready(&mut self, url: &str) -> Result<Option<&HtmlImageElement>, JsValue> {
        if !self.images.contains_key(url) {
            let img = HtmlImageElement::new()?;
            img.set_cross_origin(Some("anonymous"));
            img.set_src(url);
            self.images.insert(url.to_string(), img);
        }
        Ok(self.images.get(url).filter(|img| img.complete() && img.natural_width() > 0))
    }
}

pub struct Canvas2dPainter<'a> {
    ctx: &'a CanvasRenderingContext2d,
    avatars: &'a mut AvatarCache,
    size: (f64, f64),
}

impl<'a> Canvas2dPainter<'a> {
    #[must_use]
    pub fn new(ctx: &'a CanvasRenderingContext2d, avatars: &'a mut AvatarCache, size: (f64, f64)) -> Self {
        Self { ctx, avatars, size }
    }

    fn circle_path(&self, center: Point, radius: f64) -> Result<(), JsValue> {
        self.ctx.begin_path();
        self.ctx.arc(center.x, center.y, radius, 0.0, 2.0 * PI)
    }
}

impl Painter for Canvas2dPainter<'_> {
    type Error = JsValue;

    fn size(&self) -> (f64, f64) {
        self.size
    }

    fn clear(&mut self, color: &str) -> Result<(), JsValue> {
        self.ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
        self.ctx.set_fill_style_str(color);
        self.ctx.fill_rect(0.0, 0.0, self.size.0, self.size.1);
        Ok(())
    }

    fn set_transform(&mut self, scale: f64, tx: f64, ty: f64) -> Result<(), JsValue> {
        self.ctx.set_transform(scale, 0.0, 0.0, scale, tx, ty)
    }

    fn polyline(&mut self, points: &[Point], color: &str, width: f64) -> Result<(), JsValue> {
        let Some((first, rest)) = points.split_first() else {
            return Ok(());
        };
        self.ctx.begin_path();
        self.ctx.move_to(first.x, first.y);
        for p in rest {
            self.ctx.line_to(p.x, p.y);
        }
        self.ctx.set_stroke_style_str(color);
        self.ctx.set_line_width(width);
        self.ctx.set_line_cap("round");
        self.ctx.set_line_join("round");
        self.ctx.stroke();
        Ok(())
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: &str) -> Result<(), JsValue> {
        self.circle_path(center, radius)?;
        self.ctx.set_fill_style_str(color);
        self.ctx.fill();
        Ok(())
    }

    fn stroke_circle(&mut self, center: Point, radius: f64, color: &str, width: f64) -> Result<(), JsValue> {
        self.circle_path(center, radius)?;
        self.ctx.set_stroke_style_str(color);
        self.ctx.set_line_width(width);
        self.ctx.stroke();
        Ok(())
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str) -> Result<(), JsValue> {
        self.ctx.set_fill_style_str(color);
        self.ctx.fill_rect(x, y, w, h);
        Ok(())
    }

    fn text(&mut self, text: &str, at: Point, color: &str, size: f64) -> Result<(), JsValue> {
        self.ctx.set_text_align("center");
        self.ctx.set_text_baseline("middle");
        self.ctx.set_font(&format!("{size:.0}px sans-serif"));
        self.ctx.set_fill_style_str(color);
        self.ctx.fill_text(text, at.x, at.y)
    }

    fn set_glow(&mut self, color: Option<&str>, blur: f64) {
        match color {
            Some(c) => {
                self.ctx.set_shadow_color(c);
                self.ctx.set_shadow_blur(blur);
            }
            None => self.ctx.set_shadow_blur(0.0),
        }
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.ctx.set_global_alpha(alpha);
    }

    fn avatar(&mut self, url: &str, center: Point, radius: f64) -> Result<bool, JsValue> {
        let Some(img) = self.avatars.ready(url)? else {
            return Ok(false);
        };
        self.ctx.save();
        self.ctx.begin_path();
        self.ctx.arc(center.x, center.y, radius, 0.0, 2.0 * PI)?;
        self.ctx.clip();
        let side = radius * 2.0;
        let drawn = self.ctx.draw_image_with_html_image_element_and_dw_and_dh(
            img,
            center.x - radius,
            center.y - radius,
            side,
            side,
        );
        self.ctx.restore();
        drawn.map(|()| true)
    }
}
