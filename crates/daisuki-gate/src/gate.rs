//! The Japanese-only gate and its diagnostic helper.

use crate::class::{classify, is_forbidden, is_space};
use crate::error::Rejection;

/// Outcome of running the gate over a text, with the diagnostic attached.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Verdict {
    pub acceptable: bool,
    pub invalid_characters: Vec<char>,
}

/// Is `text` written entirely in Japanese script?
///
/// Empty and all-whitespace input is acceptable. Otherwise any ASCII letter or
/// digit rejects the text immediately, before the allowed-class scan runs.
pub fn is_acceptable(text: &str) -> bool {
    if text.chars().all(is_space) {
        return true;
    }
    if text.chars().any(is_forbidden) {
        return false;
    }
    text.chars().all(|c| classify(c).is_allowed())
}

/// Distinct forbidden ASCII letters and digits in `text`, in order of first
/// appearance.
///
/// Foreign characters are not reported; see the crate docs.
pub fn invalid_characters(text: &str) -> Vec<char> {
    let mut found: Vec<char> = Vec::new();
    for c in text.chars().filter(|&c| is_forbidden(c)) {
        if !found.contains(&c) {
            found.push(c);
        }
    }
    found
}

/// Run both the gate and the diagnostic.
pub fn inspect(text: &str) -> Verdict {
    Verdict {
        acceptable: is_acceptable(text),
        invalid_characters: invalid_characters(text),
    }
}

/// Gate `text`, returning the diagnostic as an error on rejection.
pub fn require_japanese(text: &str) -> Result<(), Rejection> {
    if is_acceptable(text) {
        Ok(())
    } else {
        Err(Rejection {
            invalid_characters: invalid_characters(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn japanese_sentences() {
        assert!(is_acceptable("今日はいい天気ですね。"));
        assert!(is_acceptable("カタカナとひらがな、漢字！"));
        assert!(is_acceptable("一行目\n二行目\n"));
        assert!(is_acceptable("「こんにちは」と言った😀"));
    }

    #[test]
    fn byte_order_mark_is_whitespace() {
        assert!(is_acceptable("\u{FEFF}こんにちは"));
        assert!(is_acceptable("\u{FEFF}"));
        assert!(!is_acceptable("\u{FEFF}hello"));
    }

    #[test]
    fn astral_emoji_alone() {
        assert!(is_acceptable("😀"));
        assert!(invalid_characters("😀").is_empty());
        assert!(is_acceptable("🚀🌸"));
    }

    #[test]
    fn foreign_scripts_rejected_without_diagnostic() {
        assert!(!is_acceptable("привет"));
        assert!(!is_acceptable("こんにちは مرحبا"));
        assert!(invalid_characters("привет").is_empty());

        let rejection = require_japanese("привет").unwrap_err();
        assert!(rejection.invalid_characters.is_empty());
    }

    #[test]
    fn ascii_punctuation_is_foreign() {
        assert!(!is_acceptable("こんにちは!"));
        assert!(invalid_characters("こんにちは!").is_empty());
    }

    #[test]
    fn latin_inside_allowed_span() {
        assert!(!is_acceptable("「a」"));
        assert_eq!(invalid_characters("「a」"), vec!['a']);
    }

    #[test]
    fn diagnostic_dedupes_in_order() {
        assert_eq!(invalid_characters("baba 1221"), vec!['b', 'a', '1', '2']);
        assert_eq!(invalid_characters("Aa"), vec!['A', 'a']);
    }

    #[test]
    fn inspect_combines() {
        let verdict = inspect("猫cat");
        assert!(!verdict.acceptable);
        assert_eq!(verdict.invalid_characters, vec!['c', 'a', 't']);

        let verdict = inspect("猫");
        assert!(verdict.acceptable);
        assert!(verdict.invalid_characters.is_empty());
    }

    #[test]
    fn require_japanese_passes_blank() {
        assert!(require_japanese("").is_ok());
        assert!(require_japanese(" \t\n").is_ok());
        assert!(require_japanese("桜").is_ok());
    }

    fn allowed_char() -> impl Strategy<Value = char> {
        prop_oneof![
            proptest::char::range('\u{3040}', '\u{309F}'),
            proptest::char::range('\u{30A0}', '\u{30FF}'),
            proptest::char::range('\u{4E00}', '\u{9FAF}'),
            proptest::char::range('\u{3400}', '\u{4DBF}'),
            proptest::char::range('\u{3000}', '\u{303F}'),
            proptest::char::range('\u{1F300}', '\u{1F9FF}'),
            proptest::char::range('\u{2600}', '\u{27BF}'),
            prop::sample::select(vec![' ', '\n', '\t']),
        ]
    }

    fn ascii_alnum() -> impl Strategy<Value = char> {
        prop_oneof![
            proptest::char::range('a', 'z'),
            proptest::char::range('A', 'Z'),
            proptest::char::range('0', '9'),
        ]
    }

    proptest! {
        #[test]
        fn allowed_text_always_passes(chars in prop::collection::vec(allowed_char(), 0..64)) {
            let text: String = chars.into_iter().collect();
            prop_assert!(is_acceptable(&text));
            prop_assert!(invalid_characters(&text).is_empty());
        }

        #[test]
        fn any_ascii_alnum_fails(
            prefix in prop::collection::vec(allowed_char(), 0..32),
            injected in prop::collection::vec(ascii_alnum(), 1..16),
            suffix in prop::collection::vec(allowed_char(), 0..32),
        ) {
            let text: String = prefix
                .into_iter()
                .chain(injected.iter().copied())
                .chain(suffix)
                .collect();
            prop_assert!(!is_acceptable(&text));

            let mut expected: Vec<char> = Vec::new();
            for c in injected {
                if !expected.contains(&c) {
                    expected.push(c);
                }
            }
            prop_assert_eq!(invalid_characters(&text), expected);
        }
    }
}
