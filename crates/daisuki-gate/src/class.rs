//! Character classification for the Japanese-only gate.

/// Class of a single Unicode scalar value as seen by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CharClass {
    Hiragana,
    Katakana,
    Kanji,
    /// Japanese punctuation, the ideographic space and fullwidth forms.
    Punctuation,
    Emoji,
    Whitespace,
    /// ASCII letter or digit. Always rejected, and always reported.
    Forbidden,
    /// Anything outside the allowed set that is not ASCII alphanumeric.
    /// Rejected, but not reported by the diagnostic helper.
    Foreign,
}

impl CharClass {
    /// Whether characters of this class may appear in gated text.
    pub const fn is_allowed(self) -> bool {
        !matches!(self, CharClass::Forbidden | CharClass::Foreign)
    }
}

/// Is this one of the ASCII letters or digits the gate forbids?
#[inline]
pub const fn is_forbidden(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

/// Whitespace as the gate sees it: Unicode whitespace plus U+FEFF, the
/// byte-order mark that pasted text often starts with.
#[inline]
pub fn is_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}'
}

/// Classify a character.
///
/// The forbidden ASCII check comes first so that a Latin letter is never
/// mistaken for something allowed. U+3000 (ideographic space) is reported as
/// punctuation since the punctuation block contains it.
pub fn classify(c: char) -> CharClass {
    if is_forbidden(c) {
        return CharClass::Forbidden;
    }
    match c {
        '\u{3040}'..='\u{309F}' => CharClass::Hiragana,
        '\u{30A0}'..='\u{30FF}' => CharClass::Katakana,
        '\u{4E00}'..='\u{9FAF}' | '\u{3400}'..='\u{4DBF}' => CharClass::Kanji,
        '\u{3000}'..='\u{303F}' | '\u{FF00}'..='\u{FFEF}' => CharClass::Punctuation,
        '\u{1F300}'..='\u{1F9FF}' | '\u{2600}'..='\u{26FF}' | '\u{2700}'..='\u{27BF}' => {
            CharClass::Emoji
        }
        c if is_space(c) => CharClass::Whitespace,
        _ => CharClass::Foreign,
    }
}
