//! Judgment types produced by the analysis pipeline
//!
//! A judgment is created once per successful analysis and never mutated;
//! a newer record for the same URL supersedes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{normalize_text, CACHE_SCHEMA_VERSION};

/// Three-way categorical output of the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Judge {
    Human,
    Unknown,
    #[serde(rename = "AI")]
    Ai,
}

impl Judge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Judge::Human => "Human",
            Judge::Unknown => "Unknown",
            Judge::Ai => "AI",
        }
    }
}

impl std::fmt::Display for Judge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the analyzed text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Title and snippet of the search result
    Snippet,
    /// Main text extracted from the fetched page
    Fetched,
}

/// Text sample derived from one analysis attempt. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionPayload {
    /// Normalized body text
    pub text: String,
    /// Normalized text of h1-h3 headings inside the selected block
    pub headings_text: String,
    /// Links inside the selected block pointing at another host
    pub external_link_count: usize,
    pub source: TextSource,
}

impl ExtractionPayload {
    pub fn empty(source: TextSource) -> Self {
        Self {
            text: String::new(),
            headings_text: String::new(),
            external_link_count: 0,
            source,
        }
    }

    /// Payload built from the search result itself
    pub fn from_snippet(title: &str, snippet: &str) -> Self {
        Self {
            text: normalize_text(&format!("{}\n{}", title, snippet)),
            headings_text: normalize_text(title),
            external_link_count: 0,
            source: TextSource::Snippet,
        }
    }

    /// Character count of the body text
    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A search result as discovered by the host page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

impl SearchResult {
    pub fn new(url: &str, title: &str, snippet: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            snippet: snippet.to_string(),
        }
    }
}

/// Persisted and returned outcome of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgmentRecord {
    /// Sigmoid probability in [0, 1]
    pub score: f64,
    pub judge: Judge,
    /// Score rendered with two decimals
    pub display_score: String,
    pub content_hash: String,
    pub cache_version: u32,
    /// Epoch milliseconds
    pub updated_at: i64,
    pub source: TextSource,
    /// Name of the model that produced the score
    #[serde(default)]
    pub model: String,
}

impl JudgmentRecord {
    /// Build a record stamped with the current schema version
    pub fn new(
        score: f64,
        judge: Judge,
        model: &str,
        text: &str,
        source: TextSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            score,
            judge,
            display_score: format!("{:.2}", score),
            content_hash: content_hash(text),
            cache_version: CACHE_SCHEMA_VERSION,
            updated_at: now.timestamp_millis(),
            source,
            model: model.to_string(),
        }
    }

    /// Age of the record in milliseconds at `now`
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis() - self.updated_at
    }
}

/// Short content fingerprint of the scored text
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_camel_case() {
        let now = Utc::now();
        let record = JudgmentRecord::new(0.8123, Judge::Ai, "base", "some text", TextSource::Fetched, now);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["judge"], "AI");
        assert_eq!(value["displayScore"], "0.81");
        assert_eq!(value["cacheVersion"], CACHE_SCHEMA_VERSION);
        assert_eq!(value["updatedAt"], now.timestamp_millis());
        assert_eq!(value["source"], "fetched");
        assert_eq!(value["contentHash"].as_str().unwrap().len(), 16);
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = JudgmentRecord::new(0.3, Judge::Human, "base", "x", TextSource::Snippet, Utc::now());
        let json = serde_json::to_string(&record).unwrap();
        let back: JudgmentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_snippet_payload() {
        let payload = ExtractionPayload::from_snippet("  A Title ", "Some  snippet\u{a0}text");
        assert_eq!(payload.text, "A Title\nSome snippet text");
        assert_eq!(payload.source, TextSource::Snippet);
        assert_eq!(payload.external_link_count, 0);
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }

    #[test]
    fn test_display_score_rounds() {
        let record = JudgmentRecord::new(0.5, Judge::Unknown, "m", "", TextSource::Snippet, Utc::now());
        assert_eq!(record.display_score, "0.50");
    }
}
