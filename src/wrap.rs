use crate::emoji::InlineText;
use crate::font::FontFace;
use crate::tokenize::{TextFormat, Token, TokenKind};
use crate::types::Pt;

/// Width source for the wrapper. Measuring and drawing both go through the same
/// implementation, so line breaks cannot differ between the two.
pub trait MeasureText {
    fn text_width(&self, text: &str, face: FontFace) -> Pt;
}

impl MeasureText for InlineText<'_> {
    fn text_width(&self, text: &str, face: FontFace) -> Pt {
        self.measure_width(text, face)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub format: TextFormat,
    pub width: Pt,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Line {
    pub segments: Vec<Segment>,
    pub width: Pt,
}

impl Line {
    pub fn text(&self) -> String {
        self.segments.iter().map(|seg| seg.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

struct Placed<'t> {
    token: &'t Token,
    width: Pt,
}

struct LineBuilder<'t> {
    placed: Vec<Placed<'t>>,
    width: Pt,
}

impl<'t> LineBuilder<'t> {
    fn new() -> Self {
        Self {
            placed: Vec::new(),
            width: Pt::ZERO,
        }
    }

    fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    fn push(&mut self, token: &'t Token, width: Pt) {
        self.placed.push(Placed { token, width });
        self.width += width;
    }

    fn close(&mut self) -> Line {
        let mut placed = std::mem::take(&mut self.placed);
        self.width = Pt::ZERO;
        while placed
            .last()
            .is_some_and(|p| p.token.kind == TokenKind::Space)
        {
            placed.pop();
        }
        merge_segments(placed)
    }
}

fn merge_segments(placed: Vec<Placed<'_>>) -> Line {
    let mut segments: Vec<Segment> = Vec::new();
    for p in placed {
        match segments.last_mut() {
            Some(last) if last.format == p.token.format => {
                last.text.push_str(&p.token.text);
                last.width += p.width;
            }
            _ => segments.push(Segment {
                text: p.token.text.clone(),
                format: p.token.format,
                width: p.width,
            }),
        }
    }
    let width = segments.iter().map(|seg| seg.width).sum();
    Line { segments, width }
}

/// Greedy line breaking. Words are never split; a word wider than `max_width`
/// sits alone on its own line. Hard newlines always close the current line, even
/// an empty one. Spaces at a break are dropped.
pub fn wrap(tokens: &[Token], max_width: Pt, measurer: &dyn MeasureText) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut current = LineBuilder::new();
    for token in tokens {
        match token.kind {
            TokenKind::Newline => lines.push(current.close()),
            TokenKind::Space => {
                if current.is_empty() {
                    continue;
                }
                let width = measurer.text_width(&token.text, token.format.face);
                if current.width + width <= max_width {
                    current.push(token, width);
                } else {
                    lines.push(current.close());
                }
            }
            TokenKind::Word => {
                let width = measurer.text_width(&token.text, token.format.face);
                if current.is_empty() || current.width + width <= max_width {
                    current.push(token, width);
                } else {
                    lines.push(current.close());
                    current.push(token, width);
                }
            }
        }
    }
    if !current.is_empty() {
        let line = current.close();
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}
