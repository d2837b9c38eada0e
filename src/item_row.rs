use crate::canvas::Canvas;
use crate::config::LayoutConfig;
use crate::font::{ELLIPSIS, FontFace};
use crate::primitives::{BlockLayout, LayoutEnv, Primitive, StatusMarker};
use crate::types::Pt;
use crate::wrap::Line;
use relmenu_document::{Item, Status};

pub const ITEM_META_KEY: &str = "relmenu.item";

/// Which part of an item a row draws. Split items are drawn as a `Start`, zero
/// or more `Middle`s and an `End`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPiece {
    Whole,
    Start,
    Middle,
    End,
}

impl ItemPiece {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemPiece::Whole => "whole",
            ItemPiece::Start => "start",
            ItemPiece::Middle => "middle",
            ItemPiece::End => "end",
        }
    }

    pub fn continued_from_previous(self) -> bool {
        matches!(self, ItemPiece::Middle | ItemPiece::End)
    }

    pub fn continues_on_next(self) -> bool {
        matches!(self, ItemPiece::Start | ItemPiece::Middle)
    }
}

/// Space left after a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingGap {
    None,
    Item,
    SectionEnd,
}

impl TrailingGap {
    pub fn height(self, config: &LayoutConfig) -> Pt {
        match self {
            TrailingGap::None => Pt::ZERO,
            TrailingGap::Item => config.item_gap,
            TrailingGap::SectionEnd => config.section_end_gap,
        }
    }
}

/// Wrapped note lines of an item. Blank notes have none.
pub fn wrap_item_note(item: &Item, env: &LayoutEnv<'_>) -> Vec<Line> {
    match &item.note {
        Some(note) if !note.is_blank() => env.wrap_note(note),
        _ => Vec::new(),
    }
}

/// Height of a name line plus `note_lines` lines of note, without trailing gap.
pub fn row_height(config: &LayoutConfig, note_lines: usize) -> Pt {
    if note_lines == 0 {
        config.item_line_height
    } else {
        config.item_line_height + config.note_gap + config.note_line_height * note_lines
    }
}

/// One item, or one piece of a split item: marker and name line, then the note
/// lines this piece carries.
#[derive(Debug, Clone, Copy)]
pub struct ItemRow<'a> {
    pub name: &'a str,
    pub status: Status,
    pub lines: &'a [Line],
    pub piece: ItemPiece,
    pub gap: TrailingGap,
}

impl<'a> ItemRow<'a> {
    pub fn new(item: &'a Item, lines: &'a [Line], piece: ItemPiece, gap: TrailingGap) -> Self {
        Self {
            name: &item.name,
            status: item.status,
            lines,
            piece,
            gap,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRowLayout {
    pub name: String,
    pub body: Pt,
    pub gap: Pt,
}

impl BlockLayout for ItemRowLayout {
    fn height(&self) -> Pt {
        self.body + self.gap
    }
}

impl Primitive for ItemRow<'_> {
    type Layout = ItemRowLayout;

    fn layout(&self, env: &LayoutEnv<'_>) -> ItemRowLayout {
        let config = env.config;
        let name = env.item_text().truncate_to_width(
            self.name,
            FontFace::Bold,
            config.content_width() - config.marker_reserve(),
        );
        ItemRowLayout {
            name,
            body: row_height(config, self.lines.len()),
            gap: self.gap.height(config),
        }
    }

    fn paint(&self, layout: &ItemRowLayout, canvas: &mut Canvas, env: &LayoutEnv<'_>, top: Pt) {
        let config = env.config;
        canvas.meta(
            ITEM_META_KEY,
            format!("{}:{}:{}", self.piece.as_str(), self.lines.len(), self.name),
        );

        let marker = StatusMarker {
            status: self.status,
            left: config.content_left(),
            size: config.marker_size,
        };
        marker.draw(
            canvas,
            env,
            top + (config.item_line_height - config.marker_size).mul_ratio(1, 2),
        );

        canvas.set_fill_color(env.styles.text);
        env.item_text().draw_inline(
            canvas,
            &layout.name,
            config.content_left() + config.marker_reserve(),
            top,
            FontFace::Bold,
        );

        let note_text = env.note_text();
        let marker_width = env.continuation_width();
        let text_left = config.note_left() + marker_width;
        let notes_top = top + config.item_line_height + config.note_gap;
        let last = self.lines.len().saturating_sub(1);
        for (idx, line) in self.lines.iter().enumerate() {
            let line_top = notes_top + config.note_line_height * idx;
            if idx == 0 && self.piece.continued_from_previous() {
                canvas.set_fill_color(env.styles.muted_text);
                note_text.draw_inline(canvas, ELLIPSIS, config.note_left(), line_top, FontFace::Regular);
            }
            let mut pen = text_left;
            for segment in &line.segments {
                canvas.set_fill_color(segment.format.color);
                let advance =
                    note_text.draw_inline(canvas, &segment.text, pen, line_top, segment.format.face);
                if segment.format.underline || segment.format.strikethrough {
                    let baseline = note_text.baseline(line_top);
                    let size = note_text.font_size;
                    canvas.set_stroke_color(segment.format.color);
                    canvas.set_line_width(size * 0.06);
                    if segment.format.underline {
                        let y = baseline + size * 0.1;
                        canvas.move_to(pen, y);
                        canvas.line_to(pen + advance, y);
                        canvas.stroke();
                    }
                    if segment.format.strikethrough {
                        let y = baseline - size * 0.3;
                        canvas.move_to(pen, y);
                        canvas.line_to(pen + advance, y);
                        canvas.stroke();
                    }
                }
                pen += advance;
            }
            if idx == last && self.piece.continues_on_next() {
                canvas.set_fill_color(env.styles.muted_text);
                note_text.draw_inline(canvas, ELLIPSIS, pen, line_top, FontFace::Regular);
            }
        }
    }
}
