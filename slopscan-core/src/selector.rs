//! Script-density model routing
//!
//! Trigram statistics are language-sensitive, so text dominated by a
//! particular script is routed to a model trained on that language.

use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::ScoringModel;

/// Hiragana, katakana and CJK unified ideographs
const JAPANESE_RANGES: &[RangeInclusive<char>] =
    &['\u{3040}'..='\u{30ff}', '\u{4e00}'..='\u{9fff}'];

/// Counts characters from a set of Unicode ranges in a text prefix
#[derive(Debug, Clone)]
pub struct ScriptHeuristic {
    ranges: &'static [RangeInclusive<char>],
    /// Prefix length inspected, in characters
    pub sample_chars: usize,
    /// Count that matches regardless of density
    pub strong_count: usize,
    /// Count that matches when density is also reached
    pub min_count: usize,
    pub min_density: f64,
}

impl ScriptHeuristic {
    pub fn japanese() -> Self {
        Self {
            ranges: JAPANESE_RANGES,
            sample_chars: 2400,
            strong_count: 40,
            min_count: 8,
            min_density: 0.03,
        }
    }

    fn in_script(&self, c: char) -> bool {
        self.ranges.iter().any(|r| r.contains(&c))
    }

    pub fn matches(&self, text: &str) -> bool {
        let mut total = 0usize;
        let mut hits = 0usize;
        for c in text.chars().take(self.sample_chars) {
            total += 1;
            if self.in_script(c) {
                hits += 1;
            }
        }

        if total == 0 {
            return false;
        }
        if hits >= self.strong_count {
            return true;
        }
        hits >= self.min_count && hits as f64 / total as f64 >= self.min_density
    }
}

/// Heuristic check for Japanese prose
pub fn is_likely_japanese(text: &str) -> bool {
    ScriptHeuristic::japanese().matches(text)
}

/// Chooses between the default and a language-specific model
#[derive(Debug, Clone)]
pub struct ModelSelector {
    default: Arc<ScoringModel>,
    language: Option<Arc<ScoringModel>>,
    heuristic: ScriptHeuristic,
}

impl ModelSelector {
    pub fn new(default: ScoringModel) -> Self {
        Self {
            default: Arc::new(default),
            language: None,
            heuristic: ScriptHeuristic::japanese(),
        }
    }

    /// Route text matching `heuristic` to `model`
    pub fn with_language_model(mut self, model: ScoringModel, heuristic: ScriptHeuristic) -> Self {
        self.language = Some(Arc::new(model));
        self.heuristic = heuristic;
        self
    }

    /// Route Japanese text to `model`
    pub fn with_japanese_model(self, model: ScoringModel) -> Self {
        self.with_language_model(model, ScriptHeuristic::japanese())
    }

    pub fn default_model(&self) -> &ScoringModel {
        &self.default
    }

    pub fn language_model(&self) -> Option<&ScoringModel> {
        self.language.as_deref()
    }

    /// Whether `text` is routed to the language-specific model
    pub fn is_language_match(&self, text: &str) -> bool {
        self.heuristic.matches(text)
    }

    pub fn select(&self, text: &str) -> &ScoringModel {
        match &self.language {
            Some(model) if self.heuristic.matches(text) => model.as_ref(),
            _ => self.default.as_ref(),
        }
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(ScoringModel::fallback())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Thresholds;

    fn named(name: &str) -> ScoringModel {
        ScoringModel::new(name, 16, 1200, 0.0, vec![0.0; 16], Thresholds::default())
    }

    #[test]
    fn test_strong_count_matches() {
        let text = "あ".repeat(40);
        assert!(is_likely_japanese(&text));
    }

    #[test]
    fn test_density_rule() {
        // 10 kana in 200 chars = 5% density
        let text = format!("{}{}", "か".repeat(10), "x".repeat(190));
        assert!(is_likely_japanese(&text));

        // 10 kana in 1000 chars = 1% density
        let text = format!("{}{}", "か".repeat(10), "x".repeat(990));
        assert!(!is_likely_japanese(&text));

        // Dense but too few
        assert!(!is_likely_japanese("日本語です"));
    }

    #[test]
    fn test_only_prefix_is_sampled() {
        let text = format!("{}{}", "x".repeat(2400), "日".repeat(100));
        assert!(!is_likely_japanese(&text));
    }

    #[test]
    fn test_empty_text() {
        assert!(!is_likely_japanese(""));
    }

    #[test]
    fn test_select_without_language_model() {
        let selector = ModelSelector::new(named("default"));
        assert_eq!(selector.select(&"日本".repeat(50)).name, "default");
        assert!(selector.language_model().is_none());
    }

    #[test]
    fn test_select_routes_japanese() {
        let selector = ModelSelector::new(named("default")).with_japanese_model(named("ja"));
        assert_eq!(selector.select(&"日本語の文章です。".repeat(10)).name, "ja");
        assert_eq!(selector.select("Plain English prose about the weather.").name, "default");
    }
}
