//! Text normalization for scraped markup and lookup identifiers.

use std::sync::LazyLock;

use regex::Regex;

/// Every whitespace code point the origin pages have been seen to emit,
/// ASCII and Unicode alike.
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "[\u{0009}\u{000A}\u{000B}\u{000C}\u{000D}\u{0020}\u{0085}\u{00A0}\u{1680}\
         \u{2000}-\u{200A}\u{2028}\u{2029}\u{202F}\u{205F}\u{3000}]+",
    )
    .expect("whitespace class is a valid regex")
});

/// Collapse every run of whitespace to a single ASCII space and trim.
///
/// Applied to every text node before pattern matching.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RUN.replace_all(s, " ").trim_matches(' ').to_string()
}

/// Map Romanian diacritics to their base Latin letters.
///
/// Only for identifiers (URL segments, cache keys), never display text.
pub fn ascii_fold(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'ă' | 'â' => 'a',
            'Ă' | 'Â' => 'A',
            'î' => 'i',
            'Î' => 'I',
            // comma-below and legacy cedilla forms
            'ș' | 'ş' => 's',
            'Ș' | 'Ş' => 'S',
            'ț' | 'ţ' => 't',
            'Ț' | 'Ţ' => 'T',
            other => other,
        })
        .collect()
}

/// Leading run of ASCII digits of a raw train number (`"74A"` → `"74"`).
pub fn canonical_train_number(raw: &str) -> String {
    raw.chars().take_while(|c| c.is_ascii_digit()).collect()
}

/// Lookup identifier for a station: lower-cased, spaces to dashes, folded.
///
/// Example: `"Brașov Bartolomeu"` → `"brasov-bartolomeu"`
pub fn station_slug(name: &str) -> String {
    ascii_fold(&collapse_whitespace(name).to_lowercase().replace(' ', "-"))
}
