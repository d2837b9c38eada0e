use crate::canvas::Canvas;
use crate::font::{DESCENT, ELLIPSIS, FontFace, encoded_char, measure_text_width, winansi_byte};
use crate::raster::GlyphRasterizer;
use crate::types::Pt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use unicode_properties::{EmojiStatus, UnicodeEmoji};
use unicode_segmentation::UnicodeSegmentation;

pub const PICTOGRAPH_META_KEY: &str = "relmenu.pictograph";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlinePiece<'a> {
    Plain(&'a str),
    Pictograph(&'a str),
}

fn is_pictographic_char(ch: char) -> bool {
    match ch.emoji_status() {
        EmojiStatus::NonEmoji | EmojiStatus::NonEmojiButEmojiComponent => false,
        // Digits, '#' and '*' are only emoji inside keycap sequences.
        EmojiStatus::EmojiOtherAndEmojiComponent => false,
        // Text-default symbols WinAnsi can set, such as the copyright sign.
        EmojiStatus::EmojiOther => winansi_byte(ch).is_none(),
        _ => true,
    }
}

/// A grapheme is drawn as an image when it looks like an emoji: pictographs,
/// flags, keycaps, or anything forced into emoji presentation with U+FE0F.
pub fn is_pictographic_cluster(grapheme: &str) -> bool {
    grapheme
        .chars()
        .any(|ch| ch == '\u{FE0F}' || ch == '\u{20E3}' || is_pictographic_char(ch))
}

/// Splits text into alternating plain runs and single pictographic clusters.
pub fn split_pictographs(text: &str) -> Vec<InlinePiece<'_>> {
    let mut pieces = Vec::new();
    let mut plain_start: Option<usize> = None;
    for (idx, grapheme) in text.grapheme_indices(true) {
        if is_pictographic_cluster(grapheme) {
            if let Some(start) = plain_start.take() {
                pieces.push(InlinePiece::Plain(&text[start..idx]));
            }
            pieces.push(InlinePiece::Pictograph(grapheme));
        } else if plain_start.is_none() {
            plain_start = Some(idx);
        }
    }
    if let Some(start) = plain_start {
        pieces.push(InlinePiece::Plain(&text[start..]));
    }
    pieces
}

/// Plain text in the form the PDF writer will encode it.
pub fn encode_plain(text: &str) -> String {
    text.chars().map(encoded_char).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmojiMetrics {
    /// Image edge as a multiple of the line height.
    pub scale: f32,
    pub gap: Pt,
    pub raster_px: u32,
}

/// Bitmaps for pictographic clusters, rasterized at most once per cluster.
/// Owned by a single generation call.
pub struct GlyphCache {
    rasterizer: Arc<dyn GlyphRasterizer>,
    raster_px: u32,
    entries: RefCell<HashMap<String, Option<String>>>,
    failures: RefCell<Vec<String>>,
}

impl GlyphCache {
    pub fn new(rasterizer: Arc<dyn GlyphRasterizer>, raster_px: u32) -> Self {
        Self {
            rasterizer,
            raster_px,
            entries: RefCell::new(HashMap::new()),
            failures: RefCell::new(Vec::new()),
        }
    }

    /// Resource id of the cluster's image, registering it on the canvas on first
    /// use. `None` when the rasterizer cannot render the cluster.
    pub fn resource_for(&self, cluster: &str, canvas: &mut Canvas) -> Option<String> {
        let cached = self.entries.borrow().get(cluster).cloned();
        match cached {
            Some(entry) => entry,
            None => {
                let entry = match self.rasterizer.rasterize(cluster, self.raster_px) {
                    Some(image) => {
                        let id = format!("emoji{}", self.entries.borrow().len() + 1);
                        canvas.register_image(id.clone(), image);
                        Some(id)
                    }
                    None => {
                        log::warn!(
                            "{} rasterizer could not render pictograph {:?}",
                            self.rasterizer.name(),
                            cluster
                        );
                        self.failures.borrow_mut().push(cluster.to_string());
                        None
                    }
                };
                self.entries
                    .borrow_mut()
                    .insert(cluster.to_string(), entry.clone());
                entry
            }
        }
    }

    pub fn rasterized_count(&self) -> usize {
        self.entries.borrow().values().filter(|v| v.is_some()).count()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.borrow().clone()
    }
}

/// Measures and draws one line's worth of mixed text at a fixed font size and
/// line height.
#[derive(Clone, Copy)]
pub struct InlineText<'a> {
    pub font_size: Pt,
    pub line_height: Pt,
    pub emoji: EmojiMetrics,
    pub cache: &'a GlyphCache,
}

impl<'a> InlineText<'a> {
    pub fn new(font_size: Pt, line_height: Pt, emoji: EmojiMetrics, cache: &'a GlyphCache) -> Self {
        Self {
            font_size,
            line_height,
            emoji,
            cache,
        }
    }

    pub fn pictograph_edge(&self) -> Pt {
        self.line_height * self.emoji.scale
    }

    pub fn pictograph_advance(&self) -> Pt {
        self.pictograph_edge() + self.emoji.gap
    }

    pub fn measure_width(&self, text: &str, face: FontFace) -> Pt {
        split_pictographs(text)
            .into_iter()
            .map(|piece| match piece {
                InlinePiece::Plain(plain) => measure_text_width(plain, face, self.font_size),
                InlinePiece::Pictograph(_) => self.pictograph_advance(),
            })
            .sum()
    }

    /// Longest grapheme prefix of `text` that fits `max_width` with a trailing
    /// ellipsis. Text that already fits is returned unchanged.
    pub fn truncate_to_width(&self, text: &str, face: FontFace, max_width: Pt) -> String {
        if self.measure_width(text, face) <= max_width {
            return text.to_string();
        }
        let budget = max_width - self.measure_width(ELLIPSIS, face);
        let mut out = String::new();
        let mut used = Pt::ZERO;
        for grapheme in text.graphemes(true) {
            let width = self.measure_width(grapheme, face);
            if used + width > budget {
                break;
            }
            used += width;
            out.push_str(grapheme);
        }
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        out.push_str(ELLIPSIS);
        out
    }

    /// Top of the text box inside a line box starting at `line_top`. The box
    /// spans one font size above the baseline plus the descender below it, and
    /// is centered in the line.
    pub fn text_top(&self, line_top: Pt) -> Pt {
        let glyph_box = self.font_size + self.font_size * DESCENT;
        line_top + (self.line_height - glyph_box).mul_ratio(1, 2)
    }

    pub fn baseline(&self, line_top: Pt) -> Pt {
        self.text_top(line_top) + self.font_size
    }

    /// Draws `text` on the line starting at `line_top`; returns the advance, which
    /// always equals `measure_width` for the same input.
    pub fn draw_inline(
        &self,
        canvas: &mut Canvas,
        text: &str,
        x: Pt,
        line_top: Pt,
        face: FontFace,
    ) -> Pt {
        let mut pen = x;
        let text_top = self.text_top(line_top);
        for piece in split_pictographs(text) {
            match piece {
                InlinePiece::Plain(plain) => {
                    canvas.set_font(face, self.font_size);
                    canvas.draw_string(pen, text_top, encode_plain(plain));
                    pen += measure_text_width(plain, face, self.font_size);
                }
                InlinePiece::Pictograph(cluster) => {
                    self.draw_pictograph(canvas, cluster, pen, line_top);
                    pen += self.pictograph_advance();
                }
            }
        }
        pen - x
    }

    fn draw_pictograph(&self, canvas: &mut Canvas, cluster: &str, x: Pt, line_top: Pt) {
        let edge = self.pictograph_edge();
        // Center on the optical middle of the lowercase letters, but never below
        // the line box.
        let middle = self.baseline(line_top) - self.font_size * 0.35;
        let y = (middle - edge.mul_ratio(1, 2)).min(line_top + self.line_height - edge);
        let x = x + self.emoji.gap.mul_ratio(1, 2);
        canvas.meta(PICTOGRAPH_META_KEY, cluster);
        match self.cache.resource_for(cluster, canvas) {
            Some(resource_id) => canvas.draw_image(x, y, edge, edge, resource_id),
            None => {
                canvas.save_state();
                canvas.set_line_width(Pt::from_f32(0.5));
                canvas.draw_rect(x, y, edge, edge);
                canvas.stroke();
                canvas.restore_state();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Command, RasterImage};
    use crate::raster::PlaceholderRasterizer;
    use crate::types::Size;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRasterizer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl GlyphRasterizer for CountingRasterizer {
        fn rasterize(&self, _cluster: &str, px: u32) -> Option<RasterImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return None;
            }
            Some(RasterImage {
                width: px,
                height: px,
                rgba: vec![0; (px * px * 4) as usize],
            })
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn metrics() -> EmojiMetrics {
        EmojiMetrics {
            scale: 1.1,
            gap: Pt::from_f32(1.0),
            raster_px: 16,
        }
    }

    #[test]
    fn splits_plain_text_and_clusters() {
        let text = "Hi \u{1F389}\u{1F389} and \u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}!";
        assert_eq!(
            split_pictographs(text),
            vec![
                InlinePiece::Plain("Hi "),
                InlinePiece::Pictograph("\u{1F389}"),
                InlinePiece::Pictograph("\u{1F389}"),
                InlinePiece::Plain(" and "),
                InlinePiece::Pictograph("\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}"),
                InlinePiece::Plain("!"),
            ]
        );
    }

    #[test]
    fn flags_and_keycaps_are_single_clusters() {
        assert_eq!(
            split_pictographs("\u{1F1E9}\u{1F1EA}1\u{FE0F}\u{20E3}"),
            vec![
                InlinePiece::Pictograph("\u{1F1E9}\u{1F1EA}"),
                InlinePiece::Pictograph("1\u{FE0F}\u{20E3}"),
            ]
        );
        assert_eq!(split_pictographs("caf\u{E9}"), vec![InlinePiece::Plain("caf\u{E9}")]);
    }

    #[test]
    fn text_default_emoji_symbols_are_pictographs() {
        for symbol in ["\u{203C}", "\u{2049}", "\u{2139}", "\u{24C2}", "\u{25AA}", "\u{25B6}", "\u{25C0}", "\u{25FB}", "\u{2934}"] {
            assert_eq!(split_pictographs(symbol), vec![InlinePiece::Pictograph(symbol)], "{symbol:?}");
        }
        assert_eq!(
            split_pictographs("ok\u{203C} \u{2049}"),
            vec![
                InlinePiece::Plain("ok"),
                InlinePiece::Pictograph("\u{203C}"),
                InlinePiece::Plain(" "),
                InlinePiece::Pictograph("\u{2049}"),
            ]
        );
    }

    #[test]
    fn encodable_symbols_and_keycap_bases_stay_text() {
        assert_eq!(
            split_pictographs("\u{A9} 2024 #1 *"),
            vec![InlinePiece::Plain("\u{A9} 2024 #1 *")]
        );
        assert_eq!(encode_plain("\u{A9}"), "\u{A9}");
        assert_eq!(
            split_pictographs("\u{A9}\u{FE0F}"),
            vec![InlinePiece::Pictograph("\u{A9}\u{FE0F}")]
        );
    }

    #[test]
    fn pictograph_width_is_scaled_line_height_plus_gap() {
        let cache = GlyphCache::new(Arc::new(PlaceholderRasterizer), 16);
        let inline = InlineText::new(Pt::from_f32(9.0), Pt::from_f32(12.0), metrics(), &cache);
        assert_eq!(inline.pictograph_edge(), Pt::from_f32(13.2));
        assert_eq!(
            inline.measure_width("\u{1F389}", FontFace::Regular),
            Pt::from_f32(14.2)
        );
        assert_eq!(
            inline.measure_width("ab\u{1F389}", FontFace::Bold),
            measure_text_width("ab", FontFace::Bold, Pt::from_f32(9.0)) + Pt::from_f32(14.2)
        );
    }

    #[test]
    fn draw_advance_matches_measure_and_rasterizes_once() {
        let raster = Arc::new(CountingRasterizer {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = GlyphCache::new(raster.clone(), 16);
        let inline = InlineText::new(Pt::from_f32(11.0), Pt::from_f32(16.0), metrics(), &cache);
        let mut canvas = Canvas::new(Size::a4());
        let text = "go \u{1F389} go \u{1F389}";
        let drawn = inline.draw_inline(&mut canvas, text, Pt::ZERO, Pt::ZERO, FontFace::Regular);
        assert_eq!(drawn, inline.measure_width(text, FontFace::Regular));
        assert_eq!(raster.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.rasterized_count(), 1);
        let images = canvas
            .current_commands()
            .iter()
            .filter(|cmd| matches!(cmd, Command::DrawImage { .. }))
            .count();
        assert_eq!(images, 2);
        let doc = canvas.finish();
        assert_eq!(doc.images.len(), 1);
    }

    #[test]
    fn truncation_respects_width_and_graphemes() {
        let cache = GlyphCache::new(Arc::new(PlaceholderRasterizer), 16);
        let inline = InlineText::new(Pt::from_f32(11.0), Pt::from_f32(16.0), metrics(), &cache);
        assert_eq!(
            inline.truncate_to_width("Short", FontFace::Regular, Pt::from_i32(500)),
            "Short"
        );
        let max = Pt::from_i32(60);
        let cut = inline.truncate_to_width(
            "A considerably longer \u{1F389} item name",
            FontFace::Regular,
            max,
        );
        assert!(cut.ends_with(ELLIPSIS));
        assert!(inline.measure_width(&cut, FontFace::Regular) <= max);
    }

    #[test]
    fn pictographs_never_extend_below_the_line_box() {
        let cache = GlyphCache::new(Arc::new(PlaceholderRasterizer), 16);
        let inline = InlineText::new(Pt::from_f32(9.0), Pt::from_f32(12.0), metrics(), &cache);
        let mut canvas = Canvas::new(Size::a4());
        let top = Pt::from_i32(100);
        inline.draw_inline(&mut canvas, "\u{1F389}", Pt::ZERO, top, FontFace::Regular);
        let bottom = canvas
            .current_commands()
            .iter()
            .find_map(|cmd| match cmd {
                Command::DrawImage { y, height, .. } => Some(*y + *height),
                _ => None,
            })
            .unwrap();
        assert!(bottom <= top + Pt::from_i32(12));
    }

    #[test]
    fn descenders_stay_inside_the_line_box() {
        let cache = GlyphCache::new(Arc::new(PlaceholderRasterizer), 16);
        for (size, line) in [(9.0, 12.0), (11.0, 16.0), (7.5, 10.0)] {
            let inline = InlineText::new(Pt::from_f32(size), Pt::from_f32(line), metrics(), &cache);
            let top = Pt::from_i32(100);
            let descender = inline.baseline(top) + inline.font_size * DESCENT;
            assert!(inline.text_top(top) >= top);
            assert!(descender <= top + inline.line_height, "{size}/{line}: {descender:?}");
        }
    }

    #[test]
    fn failed_rasterization_keeps_width_and_draws_box() {
        let raster = Arc::new(CountingRasterizer {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let cache = GlyphCache::new(raster, 16);
        let inline = InlineText::new(Pt::from_f32(11.0), Pt::from_f32(16.0), metrics(), &cache);
        let mut canvas = Canvas::new(Size::a4());
        let drawn = inline.draw_inline(&mut canvas, "\u{1F389}", Pt::ZERO, Pt::ZERO, FontFace::Regular);
        assert_eq!(drawn, inline.pictograph_advance());
        assert!(
            canvas
                .current_commands()
                .iter()
                .any(|cmd| matches!(cmd, Command::DrawRect { .. }))
        );
        assert_eq!(cache.failures(), vec!["\u{1F389}".to_string()]);
    }
}
