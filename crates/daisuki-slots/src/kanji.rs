//! Kanji model - the capacity-limited resource users claim.

use crate::{KanjiId, CAPACITY_LIMIT};
use serde::{Deserialize, Serialize};

/// A kanji in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kanji {
    /// Catalog identifier
    pub id: KanjiId,

    /// The character itself; unique across the catalog
    pub glyph: char,

    /// Native (kun'yomi) reading
    pub reading_kun: Option<String>,

    /// Sino-Japanese (on'yomi) reading
    pub reading_on: Option<String>,

    /// English meaning
    pub meaning_en: Option<String>,

    /// Japanese meaning
    pub meaning_ja: Option<String>,

    /// Stroke count
    pub stroke_count: Option<u8>,

    /// JLPT level (5 = N5 ... 1 = N1)
    pub jlpt_level: Option<u8>,

    /// Number of finalized holders. Never exceeds [`CAPACITY_LIMIT`].
    #[serde(default)]
    pub capacity_used: u32,

    /// Creation timestamp (unix seconds)
    #[serde(default)]
    pub created_at: u64,
}

impl Kanji {
    /// Create a kanji with no metadata and no holders.
    pub fn new(id: KanjiId, glyph: char) -> Self {
        Self {
            id,
            glyph,
            reading_kun: None,
            reading_on: None,
            meaning_en: None,
            meaning_ja: None,
            stroke_count: None,
            jlpt_level: None,
            capacity_used: 0,
            created_at: 0,
        }
    }

    /// Builder: set readings.
    #[must_use]
    pub fn with_readings(mut self, kun: Option<&str>, on: Option<&str>) -> Self {
        self.reading_kun = kun.map(str::to_string);
        self.reading_on = on.map(str::to_string);
        self
    }

    /// Builder: set meanings.
    #[must_use]
    pub fn with_meaning(mut self, en: &str, ja: &str) -> Self {
        self.meaning_en = Some(en.to_string());
        self.meaning_ja = Some(ja.to_string());
        self
    }

    /// Builder: set stroke count and JLPT level.
    #[must_use]
    pub fn with_level(mut self, stroke_count: u8, jlpt_level: u8) -> Self {
        self.stroke_count = Some(stroke_count);
        self.jlpt_level = Some(jlpt_level);
        self
    }

    /// Builder: set current usage.
    #[must_use]
    pub fn with_capacity_used(mut self, used: u32) -> Self {
        self.capacity_used = used;
        self
    }

    /// Slots still free.
    pub fn remaining(&self) -> u32 {
        CAPACITY_LIMIT.saturating_sub(self.capacity_used)
    }

    /// No slots left.
    pub fn is_full(&self) -> bool {
        self.capacity_used >= CAPACITY_LIMIT
    }

    /// Reading to show next to the glyph: kun'yomi, falling back to on'yomi.
    pub fn display_reading(&self) -> Option<&str> {
        self.reading_kun.as_deref().or(self.reading_on.as_deref())
    }
}

/// Catalog search criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanjiFilter {
    /// Matches the glyph exactly, or a substring of either reading or the
    /// English meaning (case-insensitive).
    #[serde(default)]
    pub query: Option<String>,

    /// JLPT level; `None` or 0 means every level.
    #[serde(default)]
    pub jlpt_level: Option<u8>,

    /// Hide kanji with no free slots.
    #[serde(default)]
    pub available_only: bool,
}

impl KanjiFilter {
    /// Does `kanji` satisfy every criterion?
    pub fn matches(&self, kanji: &Kanji) -> bool {
        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let query = query.to_lowercase();
            let contains = |field: &Option<String>| {
                field
                    .as_deref()
                    .is_some_and(|v| v.to_lowercase().contains(&query))
            };
            let glyph_match = query.chars().eq(std::iter::once(kanji.glyph));
            if !glyph_match
                && !contains(&kanji.reading_kun)
                && !contains(&kanji.reading_on)
                && !contains(&kanji.meaning_en)
            {
                return false;
            }
        }

        if let Some(level) = self.jlpt_level.filter(|&l| l != 0) {
            if kanji.jlpt_level != Some(level) {
                return false;
            }
        }

        !(self.available_only && kanji.is_full())
    }

    /// Keep only the matching kanji, preserving order.
    pub fn apply(&self, kanjis: impl IntoIterator<Item = Kanji>) -> Vec<Kanji> {
        kanjis.into_iter().filter(|k| self.matches(k)).collect()
    }
}
