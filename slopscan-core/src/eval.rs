//! Offline evaluation of the scoring pipeline against a labelled dataset
//!
//! Every row is routed through the same [`ModelSelector`] used online, so
//! the report reflects what users would see for the same text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{normalize_text, Judge, ModelSelector, ScoringModel, Thresholds};

/// One row of a `{text, label}` dataset
#[derive(Debug, Clone, Deserialize)]
pub struct LabeledRow {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub label: String,
}

impl LabeledRow {
    /// Ground truth, if the label is recognised
    pub fn truth(&self) -> Option<Judge> {
        match self.label.trim().to_ascii_lowercase().as_str() {
            "ai" => Some(Judge::Ai),
            "human" => Some(Judge::Human),
            _ => None,
        }
    }
}

/// Evaluation knobs
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// Overrides the default model's thresholds
    pub thresholds: Option<Thresholds>,
    /// Overrides the language model's thresholds
    pub language_thresholds: Option<Thresholds>,
    /// Stop after this many accepted rows (0 = unlimited)
    pub max_rows: usize,
}

#[derive(Debug, Default)]
struct Tally {
    total: usize,
    skipped: usize,
    strict_correct: usize,
    decided_rows: usize,
    decided_correct: usize,
    score_sum: f64,
    language_rows: usize,
    language_correct: usize,
    other_rows: usize,
    other_correct: usize,
    truth_counts: BTreeMap<&'static str, usize>,
    prediction_counts: BTreeMap<&'static str, usize>,
    confusion: BTreeMap<(Judge, Judge), usize>,
}

/// Accumulates predictions row by row
pub struct Evaluator<'a> {
    selector: &'a ModelSelector,
    options: EvalOptions,
    tally: Tally,
}

impl<'a> Evaluator<'a> {
    pub fn new(selector: &'a ModelSelector, options: EvalOptions) -> Self {
        Self {
            selector,
            options,
            tally: Tally::default(),
        }
    }

    /// Whether `max_rows` accepted rows have been seen
    pub fn is_full(&self) -> bool {
        self.options.max_rows > 0 && self.tally.total >= self.options.max_rows
    }

    fn thresholds_for(&self, model: &ScoringModel, language_routed: bool) -> Thresholds {
        let overridden = if language_routed {
            self.options.language_thresholds
        } else {
            self.options.thresholds
        };
        overridden.unwrap_or(model.thresholds)
    }

    /// Score one row. Returns the prediction, or `None` if the row was skipped.
    pub fn push(&mut self, row: &LabeledRow) -> Option<Judge> {
        if self.is_full() {
            return None;
        }

        let Some(truth) = row.truth() else {
            self.tally.skipped += 1;
            return None;
        };
        if normalize_text(&row.text).is_empty() {
            self.tally.skipped += 1;
            return None;
        }

        let is_language = self.selector.is_language_match(&row.text);
        let routed = is_language && self.selector.language_model().is_some();
        let model = self.selector.select(&row.text);
        let score = model.score(&row.text);
        let prediction = self.thresholds_for(model, routed).classify(score);
        let correct = prediction == truth;

        let t = &mut self.tally;
        t.total += 1;
        t.score_sum += score;
        if correct {
            t.strict_correct += 1;
        }
        if is_language {
            t.language_rows += 1;
            t.language_correct += usize::from(correct);
        } else {
            t.other_rows += 1;
            t.other_correct += usize::from(correct);
        }
        if prediction != Judge::Unknown {
            t.decided_rows += 1;
            t.decided_correct += usize::from(correct);
        }
        *t.truth_counts.entry(truth.as_str()).or_insert(0) += 1;
        *t.prediction_counts.entry(prediction.as_str()).or_insert(0) += 1;
        *t.confusion.entry((truth, prediction)).or_insert(0) += 1;

        Some(prediction)
    }

    pub fn report(&self) -> EvalReport {
        let t = &self.tally;
        let cell = |truth: Judge, pred: Judge| t.confusion.get(&(truth, pred)).copied().unwrap_or(0);

        let ai = ClassMetrics::from_counts(
            cell(Judge::Ai, Judge::Ai),
            cell(Judge::Human, Judge::Ai),
            cell(Judge::Ai, Judge::Human) + cell(Judge::Ai, Judge::Unknown),
        );
        let human = ClassMetrics::from_counts(
            cell(Judge::Human, Judge::Human),
            cell(Judge::Ai, Judge::Human),
            cell(Judge::Human, Judge::Ai) + cell(Judge::Human, Judge::Unknown),
        );

        let mut confusion_matrix = BTreeMap::new();
        for truth in [Judge::Ai, Judge::Human] {
            for pred in [Judge::Ai, Judge::Human, Judge::Unknown] {
                confusion_matrix.insert(format!("{}->{}", truth, pred), cell(truth, pred));
            }
        }

        let default_model = self.selector.default_model();
        let language_model = self.selector.language_model();

        EvalReport {
            thresholds: self.options.thresholds.unwrap_or(default_model.thresholds),
            language_thresholds: language_model
                .map(|m| self.options.language_thresholds.unwrap_or(m.thresholds)),
            processed_rows: t.total,
            skipped_rows: t.skipped,
            strict_accuracy: ratio(t.strict_correct, t.total),
            decided_accuracy: ratio(t.decided_correct, t.decided_rows),
            coverage: ratio(t.decided_rows, t.total),
            unknown_rate: ratio(
                t.prediction_counts.get("Unknown").copied().unwrap_or(0),
                t.total,
            ),
            avg_score: if t.total == 0 {
                0.0
            } else {
                round_to(t.score_sum / t.total as f64, 4)
            },
            language_segments: LanguageSegments {
                language_rows: t.language_rows,
                language_strict_accuracy: ratio(t.language_correct, t.language_rows),
                other_rows: t.other_rows,
                other_strict_accuracy: ratio(t.other_correct, t.other_rows),
            },
            ground_truth_counts: stringify_keys(&t.truth_counts),
            prediction_counts: stringify_keys(&t.prediction_counts),
            confusion_matrix,
            metrics: BTreeMap::from([("AI".to_string(), ai), ("Human".to_string(), human)]),
            model: ModelSummary::of(default_model),
            language_model: language_model.map(ModelSummary::of),
        }
    }
}

/// Summary written by the `evaluate` command
#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub thresholds: Thresholds,
    pub language_thresholds: Option<Thresholds>,
    pub processed_rows: usize,
    pub skipped_rows: usize,
    pub strict_accuracy: f64,
    pub decided_accuracy: f64,
    pub coverage: f64,
    pub unknown_rate: f64,
    pub avg_score: f64,
    pub language_segments: LanguageSegments,
    pub ground_truth_counts: BTreeMap<String, usize>,
    pub prediction_counts: BTreeMap<String, usize>,
    pub confusion_matrix: BTreeMap<String, usize>,
    pub metrics: BTreeMap<String, ClassMetrics>,
    pub model: ModelSummary,
    pub language_model: Option<ModelSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageSegments {
    pub language_rows: usize,
    pub language_strict_accuracy: f64,
    pub other_rows: usize,
    pub other_strict_accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ClassMetrics {
    pub fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = raw_ratio(tp, tp + fp);
        let recall = raw_ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision: round_to(precision, 6),
            recall: round_to(recall, 6),
            f1: round_to(f1, 6),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub dim: usize,
    pub max_chars: usize,
}

impl ModelSummary {
    fn of(model: &ScoringModel) -> Self {
        Self {
            name: model.name.clone(),
            dim: model.dim,
            max_chars: model.max_chars,
        }
    }
}

fn raw_ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    round_to(raw_ratio(num, den), 6)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn stringify_keys(map: &BTreeMap<&'static str, usize>) -> BTreeMap<String, usize> {
    map.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}
