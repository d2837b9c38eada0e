use crate::canvas::RasterImage;
use crate::error::MenuPdfError;
use rustybuzz::{Face as HbFace, UnicodeBuffer};
use std::path::Path as FsPath;
use std::sync::Arc;
use tiny_skia::{
    FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Transform,
};
use ttf_parser::{GlyphId, OutlineBuilder, RasterImageFormat};

/// Turns one pictographic cluster into a square bitmap. The base-14 text path
/// cannot shape color glyphs, so pictographs are placed on the page as images.
pub trait GlyphRasterizer: Send + Sync {
    /// Returns `None` when the cluster cannot be rendered.
    fn rasterize(&self, cluster: &str, px: u32) -> Option<RasterImage>;

    fn name(&self) -> &str;
}

/// Renders clusters from a TrueType/OpenType emoji font. PNG strikes (CBDT, sbix)
/// are used when the font has them, outlines otherwise.
#[derive(Clone)]
pub struct FontGlyphRasterizer {
    data: Arc<Vec<u8>>,
    index: u32,
}

impl FontGlyphRasterizer {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, MenuPdfError> {
        ttf_parser::Face::parse(&data, 0)
            .map_err(|err| MenuPdfError::Font(format!("cannot parse emoji font: {err}")))?;
        Ok(Self {
            data: Arc::new(data),
            index: 0,
        })
    }

    pub fn from_file(path: impl AsRef<FsPath>) -> Result<Self, MenuPdfError> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }
}

impl GlyphRasterizer for FontGlyphRasterizer {
    fn rasterize(&self, cluster: &str, px: u32) -> Option<RasterImage> {
        let face = ttf_parser::Face::parse(&self.data, self.index).ok()?;
        let hb_face = HbFace::from_slice(&self.data, self.index)?;
        let mut buffer = UnicodeBuffer::new();
        buffer.push_str(cluster);
        buffer.guess_segment_properties();
        let output = rustybuzz::shape(&hb_face, &[], buffer);
        let infos = output.glyph_infos();
        let positions = output.glyph_positions();
        if infos.is_empty() || infos.len() != positions.len() {
            return None;
        }

        let upem = face.units_per_em().max(1) as f32;
        let total_advance: f32 = positions.iter().map(|pos| pos.x_advance as f32).sum();
        let size = px as f32;
        let scale = size / upem.max(total_advance);
        let ascender = face.ascender() as f32;
        let descender = face.descender() as f32;
        let extent = (ascender - descender).max(1.0);
        let baseline = size * (ascender / extent);
        let mut pixmap = Pixmap::new(px, px)?;

        let mut pen_x = 0.0f32;
        let mut drawn = 0usize;
        for (info, pos) in infos.iter().zip(positions.iter()) {
            let gid = GlyphId(info.glyph_id as u16);
            let origin_x = pen_x + pos.x_offset as f32 * scale;
            if gid.0 != 0 {
                if draw_strike(&face, gid, px, scale, origin_x, baseline, &mut pixmap) {
                    drawn += 1;
                } else {
                    let mut builder = GlyphPathBuilder::new(origin_x, baseline, scale, -scale);
                    if face.outline_glyph(gid, &mut builder).is_some() {
                        if let Some(path) = builder.finish() {
                            pixmap.fill_path(
                                &path,
                                &outline_paint(),
                                FillRule::Winding,
                                Transform::identity(),
                                None,
                            );
                            drawn += 1;
                        }
                    }
                }
            }
            pen_x += pos.x_advance as f32 * scale;
        }

        if drawn == 0 {
            return None;
        }
        Some(pixmap_to_image(&pixmap))
    }

    fn name(&self) -> &str {
        "font"
    }
}

fn draw_strike(
    face: &ttf_parser::Face<'_>,
    gid: GlyphId,
    px: u32,
    scale: f32,
    origin_x: f32,
    baseline: f32,
    pixmap: &mut Pixmap,
) -> bool {
    let Some(strike) = face.glyph_raster_image(gid, px.min(u16::MAX as u32) as u16) else {
        return false;
    };
    if strike.format != RasterImageFormat::PNG {
        return false;
    }
    let Some(glyph) = decode_png_to_pixmap(strike.data) else {
        return false;
    };
    // Strike pixels are in the strike's own ppem; map them onto our em size.
    let ppem = strike.pixels_per_em.max(1) as f32;
    let s = scale * face.units_per_em().max(1) as f32 / ppem;
    let tx = origin_x + strike.x as f32 * s;
    let ty = baseline - (strike.y as f32 + strike.height as f32) * s;
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(
        0,
        0,
        glyph.as_ref(),
        &paint,
        Transform::from_row(s, 0.0, 0.0, s, tx, ty),
        None,
    );
    true
}

fn outline_paint() -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(0x33, 0x33, 0x33, 0xff);
    paint.anti_alias = true;
    paint
}

/// Deterministic stand-in: a colored disc whose hue is derived from the cluster,
/// so distinct pictographs stay distinguishable without any font.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRasterizer;

impl GlyphRasterizer for PlaceholderRasterizer {
    fn rasterize(&self, cluster: &str, px: u32) -> Option<RasterImage> {
        if cluster.is_empty() || px == 0 {
            return None;
        }
        let mut pixmap = Pixmap::new(px, px)?;
        let size = px as f32;
        let hash = fnv1a(cluster.as_bytes());
        let (r, g, b) = hue_to_rgb8((hash % 360) as f32);

        let mut fill = Paint::default();
        fill.set_color_rgba8(r, g, b, 0xff);
        fill.anti_alias = true;
        let outer = PathBuilder::from_circle(size / 2.0, size / 2.0, size * 0.46)?;
        pixmap.fill_path(&outer, &fill, FillRule::Winding, Transform::identity(), None);

        let mut highlight = Paint::default();
        highlight.set_color_rgba8(0xff, 0xff, 0xff, 0xb0);
        highlight.anti_alias = true;
        let inner = PathBuilder::from_circle(size * 0.5, size * 0.5, size * 0.16)?;
        pixmap.fill_path(&inner, &highlight, FillRule::Winding, Transform::identity(), None);

        Some(pixmap_to_image(&pixmap))
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}

fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in data {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

fn hue_to_rgb8(hue: f32) -> (u8, u8, u8) {
    let (s, l) = (0.62f32, 0.52f32);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h = hue / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to_u8 = |v: f32| ((v + m).clamp(0.0, 1.0) * 255.0).round() as u8;
    (to_u8(r), to_u8(g), to_u8(b))
}

struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale_x: f32,
    scale_y: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale_x: f32, scale_y: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale_x,
            scale_y,
        }
    }

    fn finish(self) -> Option<tiny_skia::Path> {
        self.builder.finish()
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale_x, self.origin_y + y * self.scale_y)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn decode_png_to_pixmap(data: &[u8]) -> Option<Pixmap> {
    let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Png).ok()?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height)?;
    for (src_px, dst_px) in rgba
        .as_raw()
        .chunks_exact(4)
        .zip(pixmap.data_mut().chunks_exact_mut(4))
    {
        let a = src_px[3];
        dst_px[0] = premul_u8(src_px[0], a);
        dst_px[1] = premul_u8(src_px[1], a);
        dst_px[2] = premul_u8(src_px[2], a);
        dst_px[3] = a;
    }
    Some(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn pixmap_to_image(pixmap: &Pixmap) -> RasterImage {
    let mut rgba = Vec::with_capacity(pixmap.pixels().len() * 4);
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RasterImage {
        width: pixmap.width(),
        height: pixmap.height(),
        rgba,
    }
}
