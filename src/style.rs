use crate::types::Color;
use relmenu_document::Status;

/// Symbol drawn inside a status marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerGlyph {
    Check,
    Plus,
    Question,
    Minus,
    Cross,
    Speech,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusStyle {
    pub fill: Color,
    pub border: Color,
    pub glyph_color: Color,
    pub glyph: MarkerGlyph,
}

/// Colors for status markers and page chrome. Pure lookup; shared read-only by
/// every generation.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRegistry {
    statuses: [StatusStyle; 7],
    pub text: Color,
    pub muted_text: Color,
    pub section_band: Color,
    pub section_text: Color,
    pub rule: Color,
    pub link: Color,
}

fn solid(fill: Color, glyph: MarkerGlyph) -> StatusStyle {
    StatusStyle {
        fill,
        border: fill,
        glyph_color: Color::WHITE,
        glyph,
    }
}

impl StyleRegistry {
    pub fn standard() -> Self {
        Self {
            statuses: [
                solid(Color::from_rgb8(0x2e, 0x7d, 0x32), MarkerGlyph::Check),
                solid(Color::from_rgb8(0x7c, 0xb3, 0x42), MarkerGlyph::Plus),
                solid(Color::from_rgb8(0xf9, 0xa8, 0x25), MarkerGlyph::Question),
                solid(Color::from_rgb8(0xef, 0x6c, 0x00), MarkerGlyph::Minus),
                solid(Color::from_rgb8(0xc6, 0x28, 0x28), MarkerGlyph::Cross),
                solid(Color::from_rgb8(0x15, 0x65, 0xc0), MarkerGlyph::Speech),
                StatusStyle {
                    fill: Color::WHITE,
                    border: Color::from_rgb8(0x9e, 0x9e, 0x9e),
                    glyph_color: Color::from_rgb8(0x9e, 0x9e, 0x9e),
                    glyph: MarkerGlyph::Empty,
                },
            ],
            text: Color::from_rgb8(0x21, 0x21, 0x21),
            muted_text: Color::from_rgb8(0x75, 0x75, 0x75),
            section_band: Color::from_rgb8(0x37, 0x47, 0x4f),
            section_text: Color::WHITE,
            rule: Color::from_rgb8(0xcf, 0xd8, 0xdc),
            link: Color::from_rgb8(0x15, 0x65, 0xc0),
        }
    }

    pub fn status(&self, status: Status) -> &StatusStyle {
        let idx = Status::ALL
            .iter()
            .position(|s| *s == status)
            .unwrap_or(Status::ALL.len() - 1);
        &self.statuses[idx]
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
