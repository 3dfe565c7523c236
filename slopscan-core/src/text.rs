//! Text normalization shared by content extraction and scoring

use regex::Regex;
use std::sync::LazyLock;

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\f\v\r]+").unwrap());

static SPACE_AROUND_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" ?\n ?").unwrap());

static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalize visible text.
///
/// Non-breaking spaces become ordinary spaces, runs of horizontal whitespace
/// collapse to one space, three or more consecutive newlines collapse to two,
/// and both ends are trimmed.
pub fn normalize_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\u{a0}', " ");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = SPACE_AROUND_NEWLINE.replace_all(&text, "\n");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Normalize text for trigram scoring (normalized and case-folded)
pub fn normalize_for_scoring(text: &str) -> String {
    normalize_text(text).to_lowercase()
}

/// Number of characters (code points) in a string
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
