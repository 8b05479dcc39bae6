//! Built-in kanji catalog seeded into a fresh node.

use daisuki_slots::Kanji;

/// (glyph, kun, on, meaning_en, meaning_ja, strokes, jlpt)
type Entry = (
    char,
    Option<&'static str>,
    Option<&'static str>,
    &'static str,
    &'static str,
    u8,
    u8,
);

const ENTRIES: &[Entry] = &[
    ('愛', None, Some("アイ"), "love", "あい", 13, 3),
    ('夢', Some("ゆめ"), Some("ム"), "dream", "ゆめ", 13, 3),
    ('空', Some("そら"), Some("クウ"), "sky", "そら", 8, 4),
    ('海', Some("うみ"), Some("カイ"), "sea", "うみ", 9, 4),
    ('山', Some("やま"), Some("サン"), "mountain", "やま", 3, 5),
    ('川', Some("かわ"), Some("セン"), "river", "かわ", 3, 5),
    ('花', Some("はな"), Some("カ"), "flower", "はな", 7, 4),
    ('桜', Some("さくら"), Some("オウ"), "cherry blossom", "さくら", 10, 2),
    ('月', Some("つき"), Some("ゲツ"), "moon", "つき", 4, 5),
    ('星', Some("ほし"), Some("セイ"), "star", "ほし", 9, 3),
    ('風', Some("かぜ"), Some("フウ"), "wind", "かぜ", 9, 4),
    ('光', Some("ひかり"), Some("コウ"), "light", "ひかり", 6, 4),
    ('心', Some("こころ"), Some("シン"), "heart", "こころ", 4, 4),
    ('力', Some("ちから"), Some("リョク"), "power", "ちから", 2, 4),
    ('火', Some("ひ"), Some("カ"), "fire", "ひ", 4, 5),
    ('水', Some("みず"), Some("スイ"), "water", "みず", 4, 5),
    ('雪', Some("ゆき"), Some("セツ"), "snow", "ゆき", 11, 3),
    ('森', Some("もり"), Some("シン"), "forest", "もり", 12, 4),
    ('道', Some("みち"), Some("ドウ"), "way", "みち", 12, 4),
    ('龍', Some("たつ"), Some("リュウ"), "dragon", "りゅう", 16, 1),
    ('猫', Some("ねこ"), Some("ビョウ"), "cat", "ねこ", 11, 2),
    ('犬', Some("いぬ"), Some("ケン"), "dog", "いぬ", 4, 4),
    ('侍', Some("さむらい"), Some("ジ"), "samurai", "さむらい", 8, 1),
    ('和', Some("やわらぐ"), Some("ワ"), "harmony", "わ", 8, 3),
];

/// The seed catalog, ids starting at 1 in listed order.
pub fn default_catalog() -> Vec<Kanji> {
    ENTRIES
        .iter()
        .zip(1u32..)
        .map(|(&(glyph, kun, on, en, ja, strokes, jlpt), id)| {
            Kanji::new(id, glyph)
                .with_readings(kun, on)
                .with_meaning(en, ja)
                .with_level(strokes, jlpt)
        })
        .collect()
}
