use crate::font::FontFace;
use crate::types::Color;
use relmenu_document::{Note, Run};

/// Formatting of a run with its tri-state flags resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextFormat {
    pub face: FontFace,
    pub underline: bool,
    pub strikethrough: bool,
    pub color: Color,
}

impl TextFormat {
    pub fn from_run(run: &Run, default_color: Color) -> Self {
        Self {
            face: FontFace::from_flags(run.bold.unwrap_or(false), run.italic.unwrap_or(false)),
            underline: run.underline.unwrap_or(false),
            strikethrough: run.strikethrough.unwrap_or(false),
            color: run.color.map(Color::from).unwrap_or(default_color),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Space,
    Newline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Exact source text. Empty for newlines.
    pub text: String,
    pub format: TextFormat,
}

/// Splits a note into word, space and hard-newline tokens. Tokens never cross a
/// run boundary and each carries the resolved format of its run.
pub fn tokenize(note: &Note, default_color: Color) -> Vec<Token> {
    let mut tokens = Vec::new();
    for run in &note.runs {
        if run.text.is_empty() {
            continue;
        }
        let format = TextFormat::from_run(run, default_color);
        let mut segments = run.text.split('\n').peekable();
        let mut first = true;
        while let Some(segment) = segments.next() {
            if !first {
                tokens.push(Token {
                    kind: TokenKind::Newline,
                    text: String::new(),
                    format,
                });
            }
            first = false;
            // "\r\n" counts as one newline.
            let segment = if segments.peek().is_some() {
                segment.strip_suffix('\r').unwrap_or(segment)
            } else {
                segment
            };
            push_words_and_spaces(segment, format, &mut tokens);
        }
    }
    tokens
}

/// Whitespace the wrapper may break at. No-break spaces belong to their word.
fn is_break_space(ch: char) -> bool {
    ch.is_whitespace() && !matches!(ch, '\u{A0}' | '\u{2007}' | '\u{202F}')
}

fn push_words_and_spaces(segment: &str, format: TextFormat, tokens: &mut Vec<Token>) {
    let mut start = 0usize;
    let mut in_space: Option<bool> = None;
    for (idx, ch) in segment.char_indices() {
        let is_space = is_break_space(ch);
        match in_space {
            Some(prev) if prev != is_space => {
                tokens.push(token_for(&segment[start..idx], prev, format));
                start = idx;
            }
            _ => {}
        }
        in_space = Some(is_space);
    }
    if let Some(prev) = in_space {
        tokens.push(token_for(&segment[start..], prev, format));
    }
}

fn token_for(text: &str, is_space: bool, format: TextFormat) -> Token {
    Token {
        kind: if is_space {
            TokenKind::Space
        } else {
            TokenKind::Word
        },
        text: text.to_string(),
        format,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relmenu_document::Rgb;

    fn kinds_and_text(tokens: &[Token]) -> Vec<(TokenKind, &str)> {
        tokens
            .iter()
            .map(|token| (token.kind, token.text.as_str()))
            .collect()
    }

    #[test]
    fn splits_words_spaces_and_newlines() {
        let note = Note::plain("one  two\nthree\n");
        let tokens = tokenize(&note, Color::BLACK);
        assert_eq!(
            kinds_and_text(&tokens),
            vec![
                (TokenKind::Word, "one"),
                (TokenKind::Space, "  "),
                (TokenKind::Word, "two"),
                (TokenKind::Newline, ""),
                (TokenKind::Word, "three"),
                (TokenKind::Newline, ""),
            ]
        );
    }

    #[test]
    fn crlf_is_a_single_newline() {
        let tokens = tokenize(&Note::plain("a\r\nb"), Color::BLACK);
        assert_eq!(
            kinds_and_text(&tokens),
            vec![
                (TokenKind::Word, "a"),
                (TokenKind::Newline, ""),
                (TokenKind::Word, "b"),
            ]
        );
    }

    #[test]
    fn no_break_spaces_stay_inside_words() {
        let tokens = tokenize(&Note::plain("10\u{A0}km a\u{202F}b\tc"), Color::BLACK);
        assert_eq!(
            kinds_and_text(&tokens),
            vec![
                (TokenKind::Word, "10\u{A0}km"),
                (TokenKind::Space, " "),
                (TokenKind::Word, "a\u{202F}b"),
                (TokenKind::Space, "\t"),
                (TokenKind::Word, "c"),
            ]
        );
    }

    #[test]
    fn tokens_never_span_runs_and_carry_run_format() {
        let red = Rgb::new(255, 0, 0);
        let note = Note::new(vec![
            Run::plain("Hel").bold().color(red),
            Run::plain(""),
            Run::plain("lo wor").italic(),
        ]);
        let tokens = tokenize(&note, Color::BLACK);
        assert_eq!(
            kinds_and_text(&tokens),
            vec![
                (TokenKind::Word, "Hel"),
                (TokenKind::Word, "lo"),
                (TokenKind::Space, " "),
                (TokenKind::Word, "wor"),
            ]
        );
        assert_eq!(tokens[0].format.face, FontFace::Bold);
        assert_eq!(tokens[0].format.color, Color::from(red));
        assert_eq!(tokens[1].format.face, FontFace::Oblique);
        assert_eq!(tokens[1].format.color, Color::BLACK);
    }

    #[test]
    fn unset_flags_resolve_to_plain() {
        let run = Run {
            text: "x".to_string(),
            bold: Some(false),
            underline: Some(true),
            ..Run::default()
        };
        let format = TextFormat::from_run(&run, Color::WHITE);
        assert_eq!(format.face, FontFace::Regular);
        assert!(format.underline);
        assert!(!format.strikethrough);
        assert_eq!(format.color, Color::WHITE);
    }
}
