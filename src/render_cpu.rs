//! CPU rasterizer: executes a [`Scene`](crate::scene::Scene)'s draw list
//! into a premultiplied RGBA8 buffer with `vello_cpu`, shaping text through
//! `parley`. Shaped layouts and image paints are cached across frames.

use std::{collections::HashMap, sync::Arc};

use tracing::warn;

use crate::{
    assets::AssetBank,
    error::{QuizError, QuizResult},
    scene::{DrawOp, Scene, TextAlign},
};

/// Brush carried through parley layouts. Color is applied at draw time from
/// the [`DrawOp`], so one shaped layout serves every color and opacity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrush;

#[derive(Clone, PartialEq, Eq, Hash)]
struct ShapeKey {
    text: String,
    size_bits: u32,
    max_width_bits: u32,
}

/// Stateful helper for building parley text layouts from raw font bytes.
struct TextShaper {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
    family_name: Option<String>,
    cache: HashMap<ShapeKey, Arc<parley::Layout<TextBrush>>>,
}

impl TextShaper {
    fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            family_name: None,
            cache: HashMap::new(),
        }
    }

    fn register(&mut self, font_bytes: &[u8]) -> QuizResult<()> {
        if self.family_name.is_some() {
            return Ok(());
        }
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| QuizError::render("no font families registered from font bytes"))?;
        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| QuizError::render("registered font family has no name"))?
            .to_string();
        self.family_name = Some(family_name);
        Ok(())
    }

    fn shape(
        &mut self,
        text: &str,
        size_px: f32,
        max_width_px: f32,
    ) -> QuizResult<Arc<parley::Layout<TextBrush>>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(QuizError::render("text size_px must be finite and > 0"));
        }
        let key = ShapeKey {
            text: text.to_string(),
            size_bits: size_px.to_bits(),
            max_width_bits: max_width_px.to_bits(),
        };
        if let Some(layout) = self.cache.get(&key) {
            return Ok(layout.clone());
        }

        let family_name = self
            .family_name
            .clone()
            .ok_or_else(|| QuizError::render("no font registered for text shaping"))?;

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(TextBrush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(Some(max_width_px));
        layout.align(
            Some(max_width_px),
            parley::Alignment::Start,
            parley::AlignmentOptions::default(),
        );

        let layout = Arc::new(layout);
        self.cache.insert(key, layout.clone());
        Ok(layout)
    }
}

/// Executes scenes on the CPU. One instance per session; caches survive
/// across frames and are keyed by slide index / shaped text.
pub struct CpuRenderer {
    width: u16,
    height: u16,
    shaper: TextShaper,
    font: Option<vello_cpu::peniko::FontData>,
    image_cache: HashMap<usize, vello_cpu::Image>,
    warned_no_font: bool,
}

impl CpuRenderer {
    pub fn new(width: u32, height: u32, font_bytes: Option<&Arc<Vec<u8>>>) -> QuizResult<Self> {
        let width_u16: u16 = width
            .try_into()
            .map_err(|_| QuizError::render("canvas width exceeds u16"))?;
        let height_u16: u16 = height
            .try_into()
            .map_err(|_| QuizError::render("canvas height exceeds u16"))?;

        let mut shaper = TextShaper::new();
        let font = match font_bytes {
            Some(bytes) => {
                shaper.register(bytes)?;
                Some(vello_cpu::peniko::FontData::new(
                    vello_cpu::peniko::Blob::from(bytes.as_ref().clone()),
                    0,
                ))
            }
            None => None,
        };

        Ok(Self {
            width: width_u16,
            height: height_u16,
            shaper,
            font,
            image_cache: HashMap::new(),
            warned_no_font: false,
        })
    }

    /// Rasterize one scene into a fresh premultiplied RGBA8 buffer.
    pub fn render_scene(&mut self, scene: &Scene, bank: &AssetBank) -> QuizResult<Vec<u8>> {
        let mut ctx = vello_cpu::RenderContext::new(self.width, self.height);
        for op in scene.ops() {
            self.draw_op(&mut ctx, op, bank)?;
        }
        ctx.flush();

        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        ctx.render_to_pixmap(&mut pixmap);
        Ok(pixmap.data_as_u8_slice().to_vec())
    }

    fn draw_op(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        op: &DrawOp,
        bank: &AssetBank,
    ) -> QuizResult<()> {
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);

        match op {
            DrawOp::FillRect { rect, color } => {
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    color.r, color.g, color.b, color.a,
                ));
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                    rect.x0, rect.y0, rect.x1, rect.y1,
                ));
            }
            DrawOp::FillPath { path, color } => {
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    color.r, color.g, color.b, color.a,
                ));
                ctx.fill_path(&bezpath_to_cpu(path));
            }
            DrawOp::Image {
                slide,
                dest,
                opacity,
            } => {
                let Some(paint) = self.image_paint_for(*slide, bank)? else {
                    return Ok(());
                };
                let (iw, ih) = image_paint_size(&paint)?;
                let (dw, dh) = (dest.width(), dest.height());
                if dw <= 0.0 || dh <= 0.0 {
                    return Ok(());
                }

                // Cover-fit: scale to fill dest, then rasterize only the
                // centered crop so the paint never spills outside the rect.
                let scale = (dw / iw).max(dh / ih);
                let crop_w = dw / scale;
                let crop_h = dh / scale;
                let crop_x = (iw - crop_w) / 2.0;
                let crop_y = (ih - crop_h) / 2.0;
                ctx.set_transform(
                    vello_cpu::kurbo::Affine::translate((
                        dest.x0 - crop_x * scale,
                        dest.y0 - crop_y * scale,
                    )) * vello_cpu::kurbo::Affine::scale(scale),
                );
                ctx.set_paint(paint);
                let layered = *opacity < 1.0;
                if layered {
                    ctx.push_opacity_layer(*opacity as f32);
                }
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                    crop_x,
                    crop_y,
                    crop_x + crop_w,
                    crop_y + crop_h,
                ));
                if layered {
                    ctx.pop_layer();
                }
            }
            DrawOp::Text {
                text,
                size_px,
                origin,
                color,
                max_width_px,
                align,
            } => {
                let Some(font) = self.font.clone() else {
                    if !self.warned_no_font {
                        warn!("no font loaded; text is skipped for this session");
                        self.warned_no_font = true;
                    }
                    return Ok(());
                };

                let layout = self.shaper.shape(text, *size_px, *max_width_px)?;
                let (tx, ty) = match align {
                    TextAlign::Left => (origin.x, origin.y),
                    TextAlign::Center => (
                        origin.x - f64::from(layout.width()) / 2.0,
                        origin.y - f64::from(layout.height()) / 2.0,
                    ),
                };
                ctx.set_transform(vello_cpu::kurbo::Affine::translate((tx, ty)));
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    color.r, color.g, color.b, color.a,
                ));

                for line in layout.lines() {
                    for item in line.items() {
                        let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                            continue;
                        };
                        let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                            id: g.id,
                            x: g.x,
                            y: g.y,
                        });
                        ctx.glyph_run(&font)
                            .font_size(run.run().font_size())
                            .fill_glyphs(glyphs);
                    }
                }
            }
        }
        Ok(())
    }

    fn image_paint_for(
        &mut self,
        slide: usize,
        bank: &AssetBank,
    ) -> QuizResult<Option<vello_cpu::Image>> {
        if let Some(paint) = self.image_cache.get(&slide) {
            return Ok(Some(paint.clone()));
        }
        let Some(img) = bank.image(slide) else {
            return Ok(None);
        };
        let pixmap = image_premul_bytes_to_pixmap(&img.rgba8_premul, img.width, img.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.image_cache.insert(slide, paint.clone());
        Ok(Some(paint))
    }
}

fn image_paint_size(image: &vello_cpu::Image) -> QuizResult<(f64, f64)> {
    match &image.image {
        vello_cpu::ImageSource::Pixmap(p) => Ok((f64::from(p.width()), f64::from(p.height()))),
        vello_cpu::ImageSource::OpaqueId(_) => Err(QuizError::render(
            "cpu backend does not support opaque image ids",
        )),
    }
}

fn point_to_cpu(p: kurbo::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn image_premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> QuizResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| QuizError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| QuizError::render("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(QuizError::render("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}
