//! Daisuki Text Gate
//!
//! Decides whether free-form text is "Japanese only" and explains rejections.
//!
//! # Character Classes
//!
//! A character is acceptable when it falls in one of these classes:
//! - Hiragana (U+3040–U+309F)
//! - Katakana (U+30A0–U+30FF)
//! - Kanji (U+4E00–U+9FAF, extension A U+3400–U+4DBF)
//! - Japanese and fullwidth punctuation (U+3000–U+303F, U+FF00–U+FFEF)
//! - Emoji (U+1F300–U+1F9FF, U+2600–U+26FF, U+2700–U+27BF)
//! - Whitespace and newlines
//!
//! ASCII letters and digits are forbidden outright and are checked before the
//! class scan. Everything else (Cyrillic, Arabic, Latin-1 symbols, ...) is
//! foreign and also fails the gate.
//!
//! # Diagnostics
//!
//! [`invalid_characters`] reports only the forbidden ASCII letters and digits.
//! Foreign characters make [`is_acceptable`] return false but are never listed.
//! Callers rendering a diagnostic must cope with an empty list for a rejected
//! text.
//!
//! Iteration is over `char` (Unicode scalar values), so astral-plane emoji are
//! never split.

mod class;
mod error;
mod gate;
mod relative;

pub use class::{classify, is_forbidden, is_space, CharClass};
pub use error::Rejection;
pub use gate::{inspect, invalid_characters, is_acceptable, require_japanese, Verdict};
pub use relative::{format_between, format_relative};
