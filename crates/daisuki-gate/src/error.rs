//! Error types for the text gate.

use thiserror::Error;

/// Text failed the Japanese-only gate.
///
/// `invalid_characters` holds the distinct forbidden ASCII letters and digits
/// in first-occurrence order. It is empty when the text was rejected only for
/// foreign characters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.invalid_characters))]
pub struct Rejection {
    pub invalid_characters: Vec<char>,
}

fn describe(invalid: &[char]) -> String {
    if invalid.is_empty() {
        return "Japanese only! Text contains non-Japanese characters".to_string();
    }
    let listed: Vec<String> = invalid.iter().map(|c| c.to_string()).collect();
    format!("Japanese only! Invalid characters: {}", listed.join(", "))
}
