//! Text sanitisation: reduce arbitrary Unicode to what Helvetica can draw.
//!
//! The signature block and regenerated field appearances use the standard
//! Helvetica font with `WinAnsiEncoding` and literal strings. Anything outside
//! printable ASCII either renders as garbage or breaks the string encoding,
//! so text is folded down before it reaches a content stream:
//!
//! 1. invisible spacing marks become a plain space,
//! 2. typographic quotes and dashes become their ASCII look-alikes,
//! 3. every other non-ASCII code point is **dropped**, not transliterated.
//!
//! Step 3 loses information (`"María"` → `"Mara"`). That is acceptable for a
//! display-only audit block and is asserted by the tests below.

/// Map `text` onto printable ASCII (0x20–0x7E).
pub fn sanitize(text: &str) -> String {
    text.chars().filter_map(fold_char).collect()
}

fn fold_char(c: char) -> Option<char> {
    match c {
        // narrow no-break space, word joiner, zero-width space/non-joiner/joiner
        '\u{202F}' | '\u{2060}' | '\u{200B}' | '\u{200C}' | '\u{200D}' => Some(' '),
        '\u{00A0}' => Some(' '),
        '\u{201C}' | '\u{201D}' => Some('"'),
        '\u{2018}' | '\u{2019}' => Some('\''),
        '\u{2013}' | '\u{2014}' => Some('-'),
        '\t' | '\n' | '\r' => Some(' '),
        ' '..='~' => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invisible_marks_become_spaces() {
        let input = "a\u{202F}b\u{2060}c\u{200B}d\u{200C}e\u{200D}f";
        let out = sanitize(input);
        assert_eq!(out, "a b c d e f");
        for mark in ['\u{202F}', '\u{2060}', '\u{200B}', '\u{200C}', '\u{200D}'] {
            assert!(!out.contains(mark), "U+{:04X} survived", mark as u32);
        }
    }

    #[test]
    fn typographic_punctuation_is_normalised() {
        assert_eq!(
            sanitize("\u{201C}Hi\u{201D} \u{2018}there\u{2019} 9\u{2013}5 \u{2014} ok"),
            "\"Hi\" 'there' 9-5 - ok"
        );
    }

    #[test]
    fn accented_letters_are_dropped() {
        assert_eq!(sanitize("María Ñoño"), "Mara oo");
        assert_eq!(sanitize("Zoë 李"), "Zo ");
    }

    #[test]
    fn controls_fold_to_space_or_vanish() {
        assert_eq!(sanitize("line1\nline2\tend\u{7}"), "line1 line2 end");
    }

    #[test]
    fn ascii_passes_through() {
        let s = "Jane Doe <jane@example.com> (100%)";
        assert_eq!(sanitize(s), s);
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn output_is_printable_ascii() {
        let out = sanitize("¡Hola! — “quoted” · naïve café\u{FEFF}");
        assert!(out.bytes().all(|b| (0x20..=0x7E).contains(&b)), "got {out:?}");
    }
}
