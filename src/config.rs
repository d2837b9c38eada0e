use crate::emoji::EmojiMetrics;
use crate::error::MenuPdfError;
use crate::types::{Margins, Pt, Size};
use serde::Deserialize;

pub const DEFAULT_LINK_URL: &str = "https://relationshipmenu.org";

/// Page geometry and spacing. All lengths are PDF points. Every field has a
/// default, so a JSON override only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub page_size: Size,
    pub margins: Margins,

    pub full_header_height: Pt,
    pub compact_header_height: Pt,
    pub title_font_size: Pt,
    pub header_font_size: Pt,
    pub legend_height: Pt,
    pub legend_gap: Pt,
    pub legend_font_size: Pt,
    pub legend_min_font_size: Pt,
    pub legend_marker_size: Pt,
    pub footer_height: Pt,
    pub footer_font_size: Pt,
    pub footer_line_height: Pt,

    pub section_header_height: Pt,
    pub section_header_margin: Pt,
    pub section_font_size: Pt,

    pub item_font_size: Pt,
    pub item_line_height: Pt,
    pub note_font_size: Pt,
    pub note_line_height: Pt,
    pub note_gap: Pt,
    pub item_gap: Pt,
    pub section_end_gap: Pt,
    pub marker_size: Pt,
    pub marker_gap: Pt,

    /// Remaining space a page must have before a note is split across it.
    pub min_split_space: Pt,

    pub emoji_scale: f32,
    pub emoji_gap: Pt,
    pub emoji_raster_px: u32,

    pub link_url: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let pt = Pt::from_f32;
        Self {
            page_size: Size::a4(),
            margins: Margins {
                top: pt(36.0),
                right: pt(40.0),
                bottom: pt(28.0),
                left: pt(40.0),
            },
            full_header_height: pt(70.0),
            compact_header_height: pt(30.0),
            title_font_size: pt(22.0),
            header_font_size: pt(10.0),
            legend_height: pt(26.0),
            legend_gap: pt(10.0),
            legend_font_size: pt(8.5),
            legend_min_font_size: pt(5.0),
            legend_marker_size: pt(9.0),
            footer_height: pt(36.0),
            footer_font_size: pt(7.5),
            footer_line_height: pt(10.0),
            section_header_height: pt(22.0),
            section_header_margin: pt(8.0),
            section_font_size: pt(12.0),
            item_font_size: pt(11.0),
            item_line_height: pt(16.0),
            note_font_size: pt(9.0),
            note_line_height: pt(12.0),
            note_gap: pt(2.0),
            item_gap: pt(8.0),
            section_end_gap: pt(4.0),
            marker_size: pt(10.0),
            marker_gap: pt(6.0),
            min_split_space: pt(30.0),
            emoji_scale: 1.1,
            emoji_gap: pt(1.0),
            emoji_raster_px: 64,
            link_url: DEFAULT_LINK_URL.to_string(),
        }
    }
}

impl LayoutConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, MenuPdfError> {
        let config: LayoutConfig = serde_json::from_str(raw)
            .map_err(|err| MenuPdfError::InvalidConfiguration(format!("layout json: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn content_left(&self) -> Pt {
        self.margins.left
    }

    pub fn content_width(&self) -> Pt {
        self.page_size.width - self.margins.left - self.margins.right
    }

    /// Top of the footer band. Nothing but the footer may extend below it.
    pub fn content_max_y(&self) -> Pt {
        self.page_size.height - self.margins.bottom - self.footer_height
    }

    pub fn footer_top(&self) -> Pt {
        self.content_max_y()
    }

    pub fn header_height(&self, page_number: usize) -> Pt {
        if page_number <= 1 {
            self.full_header_height
        } else {
            self.compact_header_height
        }
    }

    pub fn legend_top(&self, page_number: usize) -> Pt {
        self.margins.top + self.header_height(page_number)
    }

    /// Cursor position right below the legend.
    pub fn body_top(&self, page_number: usize) -> Pt {
        self.legend_top(page_number) + self.legend_height + self.legend_gap
    }

    pub fn marker_reserve(&self) -> Pt {
        self.marker_size + self.marker_gap
    }

    pub fn note_left(&self) -> Pt {
        self.content_left() + self.marker_reserve()
    }

    pub fn note_width(&self) -> Pt {
        self.content_width() - self.marker_reserve()
    }

    pub fn emoji_metrics(&self) -> EmojiMetrics {
        EmojiMetrics {
            scale: self.emoji_scale,
            gap: self.emoji_gap,
            raster_px: self.emoji_raster_px,
        }
    }

    pub fn validate(&self) -> Result<(), MenuPdfError> {
        let invalid = |message: String| Err(MenuPdfError::InvalidConfiguration(message));
        let positive = [
            ("item_line_height", self.item_line_height),
            ("note_line_height", self.note_line_height),
            ("item_font_size", self.item_font_size),
            ("note_font_size", self.note_font_size),
            ("section_header_height", self.section_header_height),
            ("legend_font_size", self.legend_font_size),
            ("legend_min_font_size", self.legend_min_font_size),
            ("footer_line_height", self.footer_line_height),
        ];
        for (name, value) in positive {
            if value <= Pt::ZERO {
                return invalid(format!("{name} must be > 0"));
            }
        }
        let non_negative = [
            ("note_gap", self.note_gap),
            ("item_gap", self.item_gap),
            ("section_end_gap", self.section_end_gap),
            ("section_header_margin", self.section_header_margin),
            ("min_split_space", self.min_split_space),
            ("emoji_gap", self.emoji_gap),
        ];
        for (name, value) in non_negative {
            if value < Pt::ZERO {
                return invalid(format!("{name} must be >= 0"));
            }
        }
        if self.note_width() <= Pt::ZERO {
            return invalid("margins and marker leave no room for text".to_string());
        }
        if !(self.emoji_scale.is_finite() && self.emoji_scale > 0.0) {
            return invalid(format!("emoji_scale must be > 0, got {}", self.emoji_scale));
        }
        if !(8..=512).contains(&self.emoji_raster_px) {
            return invalid(format!(
                "emoji_raster_px must be within 8..=512, got {}",
                self.emoji_raster_px
            ));
        }
        if self.legend_min_font_size > self.legend_font_size {
            return invalid("legend_min_font_size exceeds legend_font_size".to_string());
        }
        // A fresh page must hold a section header plus one item name line.
        let minimum = self.section_header_height + self.section_header_margin + self.item_line_height;
        for page_number in [1usize, 2] {
            let room = self.content_max_y() - self.body_top(page_number);
            if room < minimum {
                return invalid(format!(
                    "page {page_number} body has {}pt, needs at least {}pt",
                    room.to_f32(),
                    minimum.to_f32()
                ));
            }
        }
        Ok(())
    }
}
