use crate::types::Pt;

/// Continuation and truncation marker.
pub const ELLIPSIS: &str = "\u{2026}";

/// Helvetica descender depth below the baseline, in em.
pub const DESCENT: f32 = 0.207;

/// The four Helvetica faces used for item text. Widths come from the Adobe core
/// font metrics, so the PDF needs no embedded font program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontFace {
    Regular,
    Bold,
    Oblique,
    BoldOblique,
}

impl FontFace {
    pub const ALL: [FontFace; 4] = [
        FontFace::Regular,
        FontFace::Bold,
        FontFace::Oblique,
        FontFace::BoldOblique,
    ];

    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FontFace::Regular,
            (true, false) => FontFace::Bold,
            (false, true) => FontFace::Oblique,
            (true, true) => FontFace::BoldOblique,
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, FontFace::Bold | FontFace::BoldOblique)
    }

    pub fn base_font(self) -> &'static str {
        match self {
            FontFace::Regular => "Helvetica",
            FontFace::Bold => "Helvetica-Bold",
            FontFace::Oblique => "Helvetica-Oblique",
            FontFace::BoldOblique => "Helvetica-BoldOblique",
        }
    }

    /// Name of the font in every page's resource dictionary.
    pub fn resource_name(self) -> &'static str {
        match self {
            FontFace::Regular => "F1",
            FontFace::Bold => "F2",
            FontFace::Oblique => "F3",
            FontFace::BoldOblique => "F4",
        }
    }
}

// Advance widths in 1/1000 em for U+0020..=U+007E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

/// Maps a character to its WinAnsi (cp1252) code, which is what the PDF writer
/// emits for base-14 text.
pub fn winansi_byte(ch: char) -> Option<u8> {
    let byte = match ch {
        '\u{0020}'..='\u{007E}' => ch as u8,
        '\u{00A0}'..='\u{00FF}' => ch as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Characters outside WinAnsi are written as '?' and measured the same way.
pub fn encoded_char(ch: char) -> char {
    match ch {
        '\t' => ' ',
        _ if winansi_byte(ch).is_some() => ch,
        _ => '?',
    }
}

fn ascii_width(byte: u8, bold: bool) -> u16 {
    let table = if bold {
        &HELVETICA_BOLD_WIDTHS
    } else {
        &HELVETICA_WIDTHS
    };
    table
        .get(byte.wrapping_sub(0x20) as usize)
        .copied()
        .unwrap_or(556)
}

fn latin1_base_letter(ch: char) -> Option<u8> {
    let base = match ch {
        'À'..='Å' => b'A',
        'Ç' => b'C',
        'È'..='Ë' => b'E',
        'Ì'..='Ï' => b'I',
        'Ð' => b'D',
        'Ñ' => b'N',
        'Ò'..='Ö' | 'Ø' => b'O',
        'Ù'..='Ü' => b'U',
        'Ý' | 'Ÿ' => b'Y',
        'Š' => b'S',
        'Ž' => b'Z',
        'à'..='å' => b'a',
        'ç' => b'c',
        'è'..='ë' => b'e',
        'ì'..='ï' => b'i',
        'ñ' => b'n',
        'ò'..='ö' | 'ø' => b'o',
        'ù'..='ü' => b'u',
        'ý' | 'ÿ' => b'y',
        'š' => b's',
        'ž' => b'z',
        _ => return None,
    };
    Some(base)
}

pub fn char_width_units(ch: char, face: FontFace) -> u16 {
    let ch = encoded_char(ch);
    let bold = face.is_bold();
    if ch.is_ascii() {
        return ascii_width(ch as u8, bold);
    }
    if let Some(base) = latin1_base_letter(ch) {
        return ascii_width(base, bold);
    }
    match ch {
        '\u{00A0}' => 278,
        '\u{2026}' | '\u{2014}' | '\u{2122}' | '\u{2030}' | 'Æ' | 'Œ' => 1000,
        'æ' | 'œ' => {
            if bold {
                889
            } else {
                944
            }
        }
        'ß' => 611,
        '\u{2022}' => 350,
        '\u{2018}' | '\u{2019}' | '\u{201A}' => {
            if bold {
                278
            } else {
                222
            }
        }
        '\u{201C}' | '\u{201D}' | '\u{201E}' => {
            if bold {
                500
            } else {
                333
            }
        }
        '\u{2039}' | '\u{203A}' | '«' | '»' => 333,
        _ => 556,
    }
}

pub fn measure_text_width(text: &str, face: FontFace, size: Pt) -> Pt {
    let units: i64 = text
        .chars()
        .map(|ch| char_width_units(ch, face) as i64)
        .sum();
    let size_milli = size.to_milli_i64() as i128;
    let milli = (units as i128 * size_milli + 500) / 1000;
    Pt::from_milli_i64(milli.clamp(0, i64::MAX as i128) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_widths_match_core_metrics() {
        let size = Pt::from_f32(10.0);
        // H(722) e(556) l(222) l(222) o(556) = 2278 units.
        assert_eq!(
            measure_text_width("Hello", FontFace::Regular, size).to_milli_i64(),
            22_780
        );
        // H(722) e(556) l(278) l(278) o(611) = 2445 units.
        assert_eq!(
            measure_text_width("Hello", FontFace::Bold, size).to_milli_i64(),
            24_450
        );
        assert_eq!(
            measure_text_width("Hello", FontFace::Oblique, size),
            measure_text_width("Hello", FontFace::Regular, size)
        );
    }

    #[test]
    fn unencodable_chars_measure_as_question_mark() {
        let size = Pt::from_f32(12.0);
        assert_eq!(
            measure_text_width("\u{4E2D}", FontFace::Regular, size),
            measure_text_width("?", FontFace::Regular, size)
        );
        assert_eq!(encoded_char('\u{4E2D}'), '?');
        assert_eq!(encoded_char('ü'), 'ü');
        assert_eq!(winansi_byte('\u{2026}'), Some(0x85));
    }
}
