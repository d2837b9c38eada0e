use crate::canvas::Canvas;
use crate::font::FontFace;
use crate::primitives::{BlockLayout, FixedHeight, LayoutEnv, Primitive, draw_marker};
use crate::types::{Pt, Rect};
use relmenu_document::{Document, Status};

pub const FOOTER_META_KEY: &str = "relmenu.footer";

/// Title block. The first page carries the full header, later pages a single
/// compact line.
#[derive(Debug, Clone, Copy)]
pub struct PageHeader<'a> {
    pub document: &'a Document,
    pub page_number: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderLine {
    pub text: String,
    pub face: FontFace,
    pub font_size: Pt,
    pub line_height: Pt,
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageHeaderLayout {
    pub height: Pt,
    pub lines: Vec<HeaderLine>,
}

impl BlockLayout for PageHeaderLayout {
    fn height(&self) -> Pt {
        self.height
    }
}

impl PageHeader<'_> {
    fn participants(&self, env: &LayoutEnv<'_>) -> String {
        self.document
            .participants
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(env.labels.participants_joiner)
    }
}

impl Primitive for PageHeader<'_> {
    type Layout = PageHeaderLayout;

    fn layout(&self, env: &LayoutEnv<'_>) -> PageHeaderLayout {
        let config = env.config;
        let labels = env.labels;
        let width = config.content_width();
        let participants = self.participants(env);
        let small = config.header_font_size;
        let small_line = small.mul_ratio(7, 5);
        let mut lines = Vec::new();
        let mut push = |text: String, face: FontFace, font_size: Pt, line_height: Pt, muted: bool| {
            let inline = env.inline(font_size, line_height);
            lines.push(HeaderLine {
                text: inline.truncate_to_width(&text, face, width),
                face,
                font_size,
                line_height,
                muted,
            });
        };
        if self.page_number <= 1 {
            let title = config.title_font_size;
            push(labels.title.to_string(), FontFace::Bold, title, title.mul_ratio(5, 4), false);
            if !participants.is_empty() {
                push(participants, FontFace::Regular, small, small_line, false);
            }
            push(
                format!("{}: {}", labels.created, labels.date(self.document.timestamp)),
                FontFace::Regular,
                small,
                small_line,
                true,
            );
        } else {
            let text = if participants.is_empty() {
                labels.title.to_string()
            } else {
                format!("{} \u{b7} {}", labels.title, participants)
            };
            push(text, FontFace::Bold, small, small_line, false);
        }
        PageHeaderLayout {
            height: config.header_height(self.page_number),
            lines,
        }
    }

    fn paint(&self, layout: &PageHeaderLayout, canvas: &mut Canvas, env: &LayoutEnv<'_>, top: Pt) {
        let mut line_top = top;
        for line in &layout.lines {
            if line_top + line.line_height > top + layout.height {
                log::debug!("header line {:?} does not fit the header band", line.text);
                break;
            }
            let color = if line.muted {
                env.styles.muted_text
            } else {
                env.styles.text
            };
            canvas.set_fill_color(color);
            env.inline(line.font_size, line.line_height).draw_inline(
                canvas,
                &line.text,
                env.config.content_left(),
                line_top,
                line.face,
            );
            line_top += line.line_height;
        }
    }
}

/// One marker and localized label per status, spread across the page width.
#[derive(Debug, Clone, Copy, Default)]
pub struct Legend;

#[derive(Debug, Clone, PartialEq)]
pub struct LegendLayout {
    pub height: Pt,
    pub font_size: Pt,
    pub spacing: Pt,
    pub entries: Vec<(Status, &'static str, Pt)>,
}

impl BlockLayout for LegendLayout {
    fn height(&self) -> Pt {
        self.height
    }
}

impl Legend {
    fn label_gap(env: &LayoutEnv<'_>) -> Pt {
        env.config.legend_marker_size.mul_ratio(1, 3)
    }

    fn entries_at(env: &LayoutEnv<'_>, font_size: Pt) -> Vec<(Status, &'static str, Pt)> {
        let inline = env.inline(font_size, font_size.mul_ratio(5, 4));
        let marker = env.config.legend_marker_size + Self::label_gap(env);
        Status::ALL
            .iter()
            .map(|status| {
                let label = env.labels.status(*status);
                (*status, label, marker + inline.measure_width(label, FontFace::Regular))
            })
            .collect()
    }
}

impl Primitive for Legend {
    type Layout = LegendLayout;

    fn layout(&self, env: &LayoutEnv<'_>) -> LegendLayout {
        let config = env.config;
        let page_width = config.page_size.width;
        let slots = Status::ALL.len() as i32 + 1;
        let min_spacing = config.legend_marker_size;
        let step = Pt::from_f32(0.5);
        let mut font_size = config.legend_font_size;
        loop {
            let entries = Self::entries_at(env, font_size);
            let total: Pt = entries.iter().map(|entry| entry.2).sum();
            let spacing = (page_width - total) / slots;
            if spacing >= min_spacing || font_size <= config.legend_min_font_size {
                return LegendLayout {
                    height: config.legend_height,
                    font_size,
                    spacing: spacing.max(Pt::ZERO),
                    entries,
                };
            }
            font_size = (font_size - step).max(config.legend_min_font_size);
        }
    }

    fn paint(&self, layout: &LegendLayout, canvas: &mut Canvas, env: &LayoutEnv<'_>, top: Pt) {
        let config = env.config;
        let marker = config.legend_marker_size;
        let middle = top + layout.height.mul_ratio(1, 2);
        let line_height = layout.font_size.mul_ratio(5, 4);
        let inline = env.inline(layout.font_size, line_height);
        let mut x = layout.spacing;
        for (status, label, width) in &layout.entries {
            draw_marker(
                canvas,
                env.styles.status(*status),
                x + marker.mul_ratio(1, 2),
                middle,
                marker,
            );
            canvas.set_fill_color(env.styles.text);
            inline.draw_inline(
                canvas,
                label,
                x + marker + Self::label_gap(env),
                middle - line_height.mul_ratio(1, 2),
                FontFace::Regular,
            );
            x += *width + layout.spacing;
        }
    }
}

/// Bottom band: branding and re-import hint on the left (one link area over
/// both), page number and last-updated date on the right.
#[derive(Debug, Clone, Copy)]
pub struct Footer {
    pub page_number: usize,
    pub page_count: usize,
    pub timestamp: i64,
}

impl Primitive for Footer {
    type Layout = FixedHeight;

    fn layout(&self, env: &LayoutEnv<'_>) -> FixedHeight {
        FixedHeight(env.config.footer_height)
    }

    fn paint(&self, _layout: &FixedHeight, canvas: &mut Canvas, env: &LayoutEnv<'_>, top: Pt) {
        let config = env.config;
        let labels = env.labels;
        let left = config.content_left();
        let right = left + config.content_width();
        let line_height = config.footer_line_height;
        let inline = env.inline(config.footer_font_size, line_height);
        let padding = line_height.mul_ratio(1, 2);
        let first = top + padding;
        let second = first + line_height;

        canvas.meta(
            FOOTER_META_KEY,
            format!("{}/{}", self.page_number, self.page_count),
        );
        canvas.set_stroke_color(env.styles.rule);
        canvas.set_line_width(Pt::from_f32(0.5));
        canvas.move_to(left, top);
        canvas.line_to(right, top);
        canvas.stroke();

        let page_label = labels.page_of(self.page_number, self.page_count);
        let updated = format!("{}: {}", labels.last_updated, labels.date(self.timestamp));
        let page_width = inline.measure_width(&page_label, FontFace::Regular);
        let updated_width = inline.measure_width(&updated, FontFace::Regular);
        canvas.set_fill_color(env.styles.muted_text);
        inline.draw_inline(canvas, &page_label, right - page_width, first, FontFace::Regular);
        inline.draw_inline(canvas, &updated, right - updated_width, second, FontFace::Regular);

        let available = config.content_width() - page_width.max(updated_width) - padding * 2;
        let branding = inline.truncate_to_width(labels.branding, FontFace::Bold, available);
        let hint = inline.truncate_to_width(labels.source_hint, FontFace::Regular, available);
        canvas.set_fill_color(env.styles.link);
        let branding_width = inline.draw_inline(canvas, &branding, left, first, FontFace::Bold);
        canvas.set_fill_color(env.styles.muted_text);
        let hint_width = inline.draw_inline(canvas, &hint, left, second, FontFace::Regular);

        let branding_rect = Rect {
            x: left,
            y: first,
            width: branding_width,
            height: line_height,
        };
        let hint_rect = Rect {
            x: left,
            y: second,
            width: hint_width,
            height: line_height,
        };
        canvas.link_area(branding_rect.union(&hint_rect), config.link_url.clone());
    }
}
