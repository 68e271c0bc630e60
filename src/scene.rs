//! Retained draw list produced by the layout functions and executed by the
//! CPU renderer. Keeping the list backend-neutral lets layout math be tested
//! without rasterizing anything.

use kurbo::{BezPath, Point, Rect};

/// Straight (non-premultiplied) RGBA color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Same color with alpha scaled by `k` in 0..=1.
    pub fn with_opacity(self, k: f64) -> Self {
        let a = (f64::from(self.a) * k.clamp(0.0, 1.0) + 0.5) as u8;
        Self { a, ..self }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

/// One drawing command. Coordinates are canvas pixels, y-down.
#[derive(Clone, Debug)]
pub enum DrawOp {
    FillRect {
        rect: Rect,
        color: Rgba8,
    },
    FillPath {
        path: BezPath,
        color: Rgba8,
    },
    /// The slide's prepared background image, cover-fit into `dest`. Pixels
    /// outside `dest` are never touched.
    Image {
        slide: usize,
        dest: Rect,
        opacity: f64,
    },
    Text {
        text: String,
        size_px: f32,
        /// Anchor: left edge for `Left`, center of the box for `Center`.
        origin: Point,
        color: Rgba8,
        max_width_px: f32,
        align: TextAlign,
    },
}

/// Ordered draw list for one composed frame layer.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    ops: Vec<DrawOp>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn push(&mut self, op: DrawOp) {
        self.ops.push(op);
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Rgba8) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    pub fn fill_path(&mut self, path: BezPath, color: Rgba8) {
        self.ops.push(DrawOp::FillPath { path, color });
    }

    pub fn image(&mut self, slide: usize, dest: Rect, opacity: f64) {
        self.ops.push(DrawOp::Image {
            slide,
            dest,
            opacity,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn text(
        &mut self,
        text: impl Into<String>,
        size_px: f32,
        origin: Point,
        color: Rgba8,
        max_width_px: f32,
        align: TextAlign,
    ) {
        self.ops.push(DrawOp::Text {
            text: text.into(),
            size_px,
            origin,
            color,
            max_width_px,
            align,
        });
    }
}
