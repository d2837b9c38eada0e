use crate::font::FontFace;
use crate::types::{Color, Pt, Rect, Size};
use std::collections::BTreeMap;

/// Bezier handle length for a quarter circle.
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    // Non-rendered metadata used for page-aware reporting. Ignored by the PDF writer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFontFace(FontFace),
    SetFontSize(Pt),
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    CurveTo {
        x1: Pt,
        y1: Pt,
        x2: Pt,
        y2: Pt,
        x: Pt,
        y: Pt,
    },
    ClosePath,
    Fill,
    Stroke,
    FillStroke,
    // y is the top of the text box; the baseline sits one font size lower.
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
    LinkArea {
        rect: Rect,
        uri: String,
    },
}

/// Straight RGBA pixels (not premultiplied), row major.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    fn new() -> Self {
        Self::default()
    }

    pub fn meta_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.commands.iter().filter_map(move |cmd| match cmd {
            Command::Meta { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::DrawString { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// The recorded output of one generation: pages of drawing commands plus the
/// bitmaps they reference by resource id.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub page_size: Size,
    pub pages: Vec<Page>,
    pub images: BTreeMap<String, RasterImage>,
}

impl RenderedDocument {
    /// Appends each overlay page onto the matching base page. Base commands are
    /// isolated in their own graphics state so the overlay starts from defaults.
    pub fn merge_overlay(&mut self, overlay: RenderedDocument) {
        if self.pages.len() != overlay.pages.len() {
            log::warn!(
                "overlay page count {} does not match document page count {}",
                overlay.pages.len(),
                self.pages.len()
            );
            return;
        }
        for (base_page, overlay_page) in self.pages.iter_mut().zip(overlay.pages) {
            if overlay_page.commands.is_empty() {
                continue;
            }
            base_page.commands.insert(0, Command::SaveState);
            base_page.commands.push(Command::RestoreState);
            base_page.commands.extend(overlay_page.commands);
        }
        self.images.extend(overlay.images);
    }
}

/// Pen state the recorder compares against to drop redundant transitions.
#[derive(Debug, Clone, PartialEq)]
struct PenState {
    fill: Color,
    stroke: Color,
    line_width: Pt,
    face: FontFace,
    font_size: Pt,
}

impl Default for PenState {
    fn default() -> Self {
        Self {
            fill: Color::BLACK,
            stroke: Color::BLACK,
            line_width: Pt::from_i32(1),
            face: FontFace::Regular,
            font_size: Pt::from_i32(12),
        }
    }
}

/// Render target threaded through every primitive. Font and color changes are
/// state transitions on the canvas; redundant transitions are not recorded.
pub struct Canvas {
    page_size: Size,
    finished: Vec<Page>,
    current: Page,
    pen: PenState,
    saved: Vec<PenState>,
    images: BTreeMap<String, RasterImage>,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            finished: Vec::new(),
            current: Page::new(),
            pen: PenState::default(),
            saved: Vec::new(),
            images: BTreeMap::new(),
        }
    }

    fn record(&mut self, command: Command) {
        self.current.commands.push(command);
    }

    /// 1-based number of the page currently being recorded.
    pub fn page_number(&self) -> usize {
        self.finished.len() + 1
    }

    pub fn save_state(&mut self) {
        self.saved.push(self.pen.clone());
        self.record(Command::SaveState);
    }

    /// Unbalanced restores are ignored.
    pub fn restore_state(&mut self) {
        let Some(pen) = self.saved.pop() else {
            return;
        };
        self.pen = pen;
        self.record(Command::RestoreState);
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        self.record(Command::Meta { key, value });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.pen.fill != color {
            self.pen.fill = color;
            self.record(Command::SetFillColor(color));
        }
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.pen.stroke != color {
            self.pen.stroke = color;
            self.record(Command::SetStrokeColor(color));
        }
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.pen.line_width != width {
            self.pen.line_width = width;
            self.record(Command::SetLineWidth(width));
        }
    }

    pub fn set_font(&mut self, face: FontFace, size: Pt) {
        if self.pen.face != face {
            self.pen.face = face;
            self.record(Command::SetFontFace(face));
        }
        if self.pen.font_size != size {
            self.pen.font_size = size;
            self.record(Command::SetFontSize(size));
        }
    }

    pub fn move_to(&mut self, x: Pt, y: Pt) {
        self.record(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Pt, y: Pt) {
        self.record(Command::LineTo { x, y });
    }

    pub fn curve_to(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt, x: Pt, y: Pt) {
        self.record(Command::CurveTo { x1, y1, x2, y2, x, y });
    }

    pub fn close_path(&mut self) {
        self.record(Command::ClosePath);
    }

    /// Four cubic quarter arcs, starting and ending at the rightmost point.
    pub fn circle_path(&mut self, cx: Pt, cy: Pt, radius: Pt) {
        let k = radius * KAPPA;
        let r = radius;
        self.move_to(cx + r, cy);
        self.curve_to(cx + r, cy + k, cx + k, cy + r, cx, cy + r);
        self.curve_to(cx - k, cy + r, cx - r, cy + k, cx - r, cy);
        self.curve_to(cx - r, cy - k, cx - k, cy - r, cx, cy - r);
        self.curve_to(cx + k, cy - r, cx + r, cy - k, cx + r, cy);
        self.close_path();
    }

    pub fn fill(&mut self) {
        self.record(Command::Fill);
    }

    pub fn stroke(&mut self) {
        self.record(Command::Stroke);
    }

    pub fn fill_stroke(&mut self) {
        self.record(Command::FillStroke);
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        let text = text.into();
        self.record(Command::DrawString { x, y, text });
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.record(Command::DrawRect { x, y, width, height });
    }

    /// The first registration of an id wins.
    pub fn register_image(&mut self, resource_id: impl Into<String>, image: RasterImage) {
        self.images.entry(resource_id.into()).or_insert(image);
    }

    pub fn draw_image(&mut self, x: Pt, y: Pt, width: Pt, height: Pt, resource_id: impl Into<String>) {
        let resource_id = resource_id.into();
        self.record(Command::DrawImage {
            x,
            y,
            width,
            height,
            resource_id,
        });
    }

    pub fn link_area(&mut self, rect: Rect, uri: impl Into<String>) {
        let uri = uri.into();
        self.record(Command::LinkArea { rect, uri });
    }

    fn reset_pen(&mut self) {
        self.saved.clear();
        self.pen = PenState::default();
    }

    pub fn show_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.finished.push(page);
        self.reset_pen();
    }

    /// Throws away everything recorded on the current page.
    pub fn discard_current_page(&mut self) {
        self.current = Page::new();
        self.reset_pen();
    }

    pub fn current_command_count(&self) -> usize {
        self.current.commands.len()
    }

    pub fn is_current_empty(&self) -> bool {
        self.current.commands.is_empty()
    }

    pub fn current_commands(&self) -> &[Command] {
        &self.current.commands
    }

    /// Closes the current page if it has content (or if there is no page yet).
    pub fn finish(mut self) -> RenderedDocument {
        if !self.is_current_empty() || self.finished.is_empty() {
            self.show_page();
        }
        self.finish_without_show()
    }

    /// Returns the pages closed so far; the page in progress is dropped.
    pub fn finish_without_show(self) -> RenderedDocument {
        RenderedDocument {
            page_size: self.page_size,
            pages: self.finished,
            images: self.images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_state_changes_are_not_recorded() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_fill_color(Color::BLACK);
        canvas.set_font(FontFace::Regular, Pt::from_f32(12.0));
        assert!(canvas.is_current_empty());
        canvas.set_fill_color(Color::WHITE);
        canvas.set_fill_color(Color::WHITE);
        canvas.set_font(FontFace::Bold, Pt::from_f32(12.0));
        assert_eq!(canvas.current_command_count(), 2);
    }

    #[test]
    fn restore_state_rewinds_dedup_state() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.save_state();
        canvas.set_fill_color(Color::WHITE);
        canvas.restore_state();
        canvas.set_fill_color(Color::WHITE);
        let fills = canvas
            .current_commands()
            .iter()
            .filter(|cmd| matches!(cmd, Command::SetFillColor(_)))
            .count();
        assert_eq!(fills, 2);
    }

    #[test]
    fn merge_overlay_isolates_base_state() {
        let mut base = Canvas::new(Size::a4());
        base.set_fill_color(Color::WHITE);
        base.draw_rect(Pt::ZERO, Pt::ZERO, Pt::from_i32(1), Pt::from_i32(1));
        let mut doc = base.finish();

        let mut overlay = Canvas::new(Size::a4());
        overlay.draw_string(Pt::ZERO, Pt::ZERO, "footer");
        doc.merge_overlay(overlay.finish());

        let cmds = &doc.pages[0].commands;
        assert_eq!(cmds.first(), Some(&Command::SaveState));
        assert_eq!(cmds[cmds.len() - 2], Command::RestoreState);
        assert!(matches!(cmds.last(), Some(Command::DrawString { .. })));
    }

    #[test]
    fn finish_always_yields_a_page() {
        let doc = Canvas::new(Size::a4()).finish();
        assert_eq!(doc.pages.len(), 1);
    }
}
