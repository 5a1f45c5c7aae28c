//! Aspect-correct, DPI-aware drawing of cached frames into a pixel canvas.
//!
//! All geometry is computed in logical pixels and scaled by the device pixel
//! ratio when drawing; the backing store is `viewport * dpr` physical pixels.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use log::trace;

use crate::animation::AnimationState;
use crate::cache::FrameCache;
use crate::sequence::FrameIndex;

/// Logical (CSS-pixel) viewport plus its device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

impl Viewport {
    /// Device pixel ratio actually applied; non-positive or NaN ratios count as 1.
    pub fn effective_dpr(&self) -> f64 {
        if self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        }
    }

    /// Physical backing-store size.
    pub fn physical_size(&self) -> (u32, u32) {
        let dpr = self.effective_dpr();
        (
            (self.width * dpr).round().max(0.0) as u32,
            (self.height * dpr).round().max(0.0) as u32,
        )
    }
}

/// Destination rectangle in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Fit `src` inside `dst` preserving aspect ratio, centred on the axis that
/// is not filled.
pub fn fit_contain(src_w: f64, src_h: f64, dst_w: f64, dst_h: f64) -> DrawRect {
    let src_aspect = src_w / src_h;
    let dst_aspect = dst_w / dst_h;
    if src_aspect > dst_aspect {
        let height = dst_w / src_aspect;
        DrawRect {
            x: 0.0,
            y: (dst_h - height) / 2.0,
            width: dst_w,
            height,
        }
    } else {
        let width = dst_h * src_aspect;
        DrawRect {
            x: (dst_w - width) / 2.0,
            y: 0.0,
            width,
            height: dst_h,
        }
    }
}

/// Frame-backed pixel surface.
pub struct Canvas {
    viewport: Viewport,
    backing: RgbaImage,
    /// Frame currently composed into `backing`, if any.
    shown: Option<FrameIndex>,
}

impl Canvas {
    pub fn new(viewport: Viewport) -> Self {
        let (w, h) = viewport.physical_size();
        Self {
            viewport,
            backing: RgbaImage::new(w, h),
            shown: None,
        }
    }

    /// Reallocate the backing store for a new viewport.
    pub fn resize(&mut self, viewport: Viewport) {
        let (w, h) = viewport.physical_size();
        self.viewport = viewport;
        self.backing = RgbaImage::new(w, h);
        self.shown = None;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// False until the surface has a non-zero size.
    pub fn is_attached(&self) -> bool {
        self.backing.width() > 0 && self.backing.height() > 0
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.backing
    }

    pub fn shown(&self) -> Option<FrameIndex> {
        self.shown
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.backing
            .write_to(&mut buf, ImageFormat::Png)
            .context("PNG encoding failed")?;
        Ok(buf.into_inner())
    }
}

/// Result of a render call. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Drawn(FrameIndex),
    /// Frame already on the canvas; nothing was recomposed.
    Unchanged(FrameIndex),
    /// Neither the frame nor its floor is cached; nothing was drawn.
    Skipped,
    /// The canvas has no backing store yet.
    NoTarget,
}

pub struct CanvasRenderer {
    background: Rgba<u8>,
    bias: f64,
    bias_min_width: f64,
    filter: FilterType,
}

impl CanvasRenderer {
    /// `bias` shifts the image horizontally by that fraction of the viewport
    /// width once the viewport is at least `bias_min_width` wide.
    pub fn new(background: Rgba<u8>, bias: f64, bias_min_width: f64) -> Self {
        Self {
            background,
            bias,
            bias_min_width,
            filter: FilterType::Triangle,
        }
    }

    /// Contain-fit rectangle for a `src_w`×`src_h` image in `viewport`.
    pub fn layout(&self, src_w: u32, src_h: u32, viewport: &Viewport) -> DrawRect {
        let mut rect = fit_contain(src_w as f64, src_h as f64, viewport.width, viewport.height);
        if self.bias != 0.0 && viewport.width >= self.bias_min_width {
            rect.x += self.bias * viewport.width;
        }
        rect
    }

    /// Draw frame `frame` (or its floor) into `canvas`.
    pub fn render(
        &self,
        canvas: &mut Canvas,
        cache: &FrameCache,
        animation: &mut AnimationState,
        frame: f64,
    ) -> RenderOutcome {
        let exact = (frame.fract() == 0.0 && frame >= 1.0).then_some(frame as FrameIndex);
        let floor = (frame >= 1.0).then_some(frame.floor() as FrameIndex);
        let Some((index, resource)) = exact
            .and_then(|i| cache.get(i).map(|r| (i, r)))
            .or_else(|| floor.and_then(|i| cache.get(i).map(|r| (i, r))))
        else {
            trace!("render: frame {frame} not cached, skipping");
            return RenderOutcome::Skipped;
        };

        if !canvas.is_attached() {
            return RenderOutcome::NoTarget;
        }

        animation.last_rendered = Some(index);
        if canvas.shown == Some(index) {
            return RenderOutcome::Unchanged(index);
        }

        let viewport = canvas.viewport;
        let dpr = viewport.effective_dpr();
        let rect = self.layout(resource.width(), resource.height(), &viewport);

        for px in canvas.backing.pixels_mut() {
            *px = self.background;
        }
        let w = (rect.width * dpr).round() as u32;
        let h = (rect.height * dpr).round() as u32;
        if w > 0 && h > 0 {
            let scaled = imageops::resize(resource.pixels(), w, h, self.filter);
            let x = (rect.x * dpr).round() as i64;
            let y = (rect.y * dpr).round() as i64;
            imageops::overlay(&mut canvas.backing, &scaled, x, y);
        }
        canvas.shown = Some(index);
        RenderOutcome::Drawn(index)
    }
}

/// Parse `#rrggbb` (or `rrggbb`) into an opaque colour.
pub fn parse_hex_color(s: &str) -> Option<Rgba<u8>> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}
