use crate::canvas::Canvas;
use crate::config::LayoutConfig;
use crate::emoji::{GlyphCache, InlineText};
use crate::font::{ELLIPSIS, FontFace, measure_text_width};
use crate::labels::Labels;
use crate::style::{MarkerGlyph, StatusStyle, StyleRegistry};
use crate::tokenize::tokenize;
use crate::types::Pt;
use crate::wrap::{Line, wrap};
use relmenu_document::{Note, Status};

/// Read-only inputs shared by every primitive during one generation.
#[derive(Clone, Copy)]
pub struct LayoutEnv<'a> {
    pub config: &'a LayoutConfig,
    pub styles: &'a StyleRegistry,
    pub labels: &'a Labels,
    pub glyphs: &'a GlyphCache,
}

impl<'a> LayoutEnv<'a> {
    pub fn inline(&self, font_size: Pt, line_height: Pt) -> InlineText<'a> {
        InlineText::new(font_size, line_height, self.config.emoji_metrics(), self.glyphs)
    }

    pub fn item_text(&self) -> InlineText<'a> {
        self.inline(self.config.item_font_size, self.config.item_line_height)
    }

    pub fn note_text(&self) -> InlineText<'a> {
        self.inline(self.config.note_font_size, self.config.note_line_height)
    }

    /// Width of a continuation marker in note text.
    pub fn continuation_width(&self) -> Pt {
        self.note_text().measure_width(ELLIPSIS, FontFace::Regular)
    }

    /// Notes wrap narrower than the note column so that a leading and a trailing
    /// continuation marker always fit next to any line.
    pub fn note_wrap_width(&self) -> Pt {
        self.config.note_width() - self.continuation_width() * 2
    }

    pub fn wrap_note(&self, note: &Note) -> Vec<Line> {
        let tokens = tokenize(note, self.styles.text);
        wrap(&tokens, self.note_wrap_width(), &self.note_text())
    }
}

/// Result of laying out a primitive: how much vertical space it takes.
pub trait BlockLayout {
    fn height(&self) -> Pt;
}

/// Something drawn at a vertical position on the page. `measure` and `draw` are
/// both derived from the single `layout` computation, so the height a primitive
/// reports is always the height it consumes.
pub trait Primitive {
    type Layout: BlockLayout;

    fn layout(&self, env: &LayoutEnv<'_>) -> Self::Layout;

    fn paint(&self, layout: &Self::Layout, canvas: &mut Canvas, env: &LayoutEnv<'_>, top: Pt);

    fn measure(&self, env: &LayoutEnv<'_>) -> Pt {
        self.layout(env).height()
    }

    fn draw(&self, canvas: &mut Canvas, env: &LayoutEnv<'_>, top: Pt) -> Pt {
        let layout = self.layout(env);
        self.paint(&layout, canvas, env, top);
        layout.height()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedHeight(pub Pt);

impl BlockLayout for FixedHeight {
    fn height(&self) -> Pt {
        self.0
    }
}

/// Round status icon.
#[derive(Debug, Clone, Copy)]
pub struct StatusMarker {
    pub status: Status,
    pub left: Pt,
    pub size: Pt,
}

impl Primitive for StatusMarker {
    type Layout = FixedHeight;

    fn layout(&self, _env: &LayoutEnv<'_>) -> FixedHeight {
        FixedHeight(self.size)
    }

    fn paint(&self, _layout: &FixedHeight, canvas: &mut Canvas, env: &LayoutEnv<'_>, top: Pt) {
        let radius = self.size.mul_ratio(1, 2);
        draw_marker(
            canvas,
            env.styles.status(self.status),
            self.left + radius,
            top + radius,
            self.size,
        );
    }
}

pub fn draw_marker(canvas: &mut Canvas, style: &StatusStyle, cx: Pt, cy: Pt, size: Pt) {
    let radius = size.mul_ratio(1, 2);
    canvas.save_state();
    canvas.set_fill_color(style.fill);
    canvas.set_stroke_color(style.border);
    canvas.set_line_width(size * 0.08);
    canvas.circle_path(cx, cy, radius - size * 0.04);
    canvas.fill_stroke();

    canvas.set_stroke_color(style.glyph_color);
    canvas.set_fill_color(style.glyph_color);
    canvas.set_line_width(size * 0.12);
    let at = |dx: f32, dy: f32| (cx + size * dx, cy + size * dy);
    let polyline = |canvas: &mut Canvas, points: &[(f32, f32)]| {
        for (idx, (dx, dy)) in points.iter().enumerate() {
            let (x, y) = at(*dx, *dy);
            if idx == 0 {
                canvas.move_to(x, y);
            } else {
                canvas.line_to(x, y);
            }
        }
        canvas.stroke();
    };
    match style.glyph {
        MarkerGlyph::Check => polyline(canvas, &[(-0.24, 0.0), (-0.07, 0.18), (0.25, -0.17)]),
        MarkerGlyph::Plus => {
            polyline(canvas, &[(-0.24, 0.0), (0.24, 0.0)]);
            polyline(canvas, &[(0.0, -0.24), (0.0, 0.24)]);
        }
        MarkerGlyph::Minus => polyline(canvas, &[(-0.24, 0.0), (0.24, 0.0)]),
        MarkerGlyph::Cross => {
            polyline(canvas, &[(-0.18, -0.18), (0.18, 0.18)]);
            polyline(canvas, &[(-0.18, 0.18), (0.18, -0.18)]);
        }
        MarkerGlyph::Question => {
            let font_size = size * 0.72;
            let width = measure_text_width("?", FontFace::Bold, font_size);
            canvas.set_font(FontFace::Bold, font_size);
            // Cap height is roughly 0.72 em; center it on the marker.
            canvas.draw_string(
                cx - width.mul_ratio(1, 2),
                cy - font_size + font_size * 0.36,
                "?",
            );
        }
        MarkerGlyph::Speech => {
            for dx in [-0.2f32, 0.0, 0.2] {
                let (x, y) = at(dx, 0.0);
                canvas.circle_path(x, y, size * 0.06);
                canvas.fill();
            }
        }
        MarkerGlyph::Empty => {}
    }
    canvas.restore_state();
}

/// Colored band with the section title.
#[derive(Debug, Clone, Copy)]
pub struct SectionHeader<'a> {
    pub title: &'a str,
    /// The margin below the band is only needed when content follows on the
    /// same page.
    pub followed_by_content: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionHeaderLayout {
    pub band: Pt,
    pub margin: Pt,
    pub title: String,
    pub title_line_height: Pt,
}

impl BlockLayout for SectionHeaderLayout {
    fn height(&self) -> Pt {
        self.band + self.margin
    }
}

impl Primitive for SectionHeader<'_> {
    type Layout = SectionHeaderLayout;

    fn layout(&self, env: &LayoutEnv<'_>) -> SectionHeaderLayout {
        let config = env.config;
        let title_line_height = config.section_font_size.mul_ratio(5, 4);
        let inline = env.inline(config.section_font_size, title_line_height);
        let padding = config.marker_gap;
        let title = inline.truncate_to_width(
            self.title,
            FontFace::Bold,
            config.content_width() - padding * 2,
        );
        SectionHeaderLayout {
            band: config.section_header_height,
            margin: if self.followed_by_content {
                config.section_header_margin
            } else {
                Pt::ZERO
            },
            title,
            title_line_height,
        }
    }

    fn paint(&self, layout: &SectionHeaderLayout, canvas: &mut Canvas, env: &LayoutEnv<'_>, top: Pt) {
        let config = env.config;
        canvas.set_fill_color(env.styles.section_band);
        canvas.draw_rect(config.content_left(), top, config.content_width(), layout.band);
        canvas.fill();

        let inline = env.inline(config.section_font_size, layout.title_line_height);
        let line_top = top + (layout.band - layout.title_line_height).mul_ratio(1, 2);
        canvas.set_fill_color(env.styles.section_text);
        inline.draw_inline(
            canvas,
            &layout.title,
            config.content_left() + config.marker_gap,
            line_top,
            FontFace::Bold,
        );
    }
}
