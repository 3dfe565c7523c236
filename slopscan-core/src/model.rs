//! Hashed character-trigram scoring models
//!
//! A model is an immutable parameter set loaded once from a JSON
//! configuration. Malformed fields are corrected at load time so that a
//! usable model always exists:
//! - `dim` falls back to the weight vector length, and must end up positive
//! - `max_chars` is clamped to at least 200
//! - thresholds are clamped to [0, 1] and swapped when inverted
//! - weight vectors are padded with zeros or truncated to `dim`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    hash_trigram, normalize_for_scoring, Judge, DEFAULT_AI_MIN, DEFAULT_HUMAN_MAX,
    DEFAULT_MAX_CHARS, MIN_MAX_CHARS, NEUTRAL_SCORE,
};

/// Largest hash dimension a model may declare
pub const MAX_DIM: usize = 1 << 20;

/// Errors from model loading
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse model JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid model: {0}")]
    Invalid(String),

    #[error("Invalid thresholds: ai ({ai}) must be greater than human ({human})")]
    Thresholds { human: f64, ai: f64 },
}

/// How trigram bins turn into a logit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Naive Bayes: prior plus one delta per trigram occurrence
    #[default]
    NaiveBayesHash3,
    /// Logistic regression over bin frequencies
    LogisticHash3,
}

impl ModelKind {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("logistic_hash3") => ModelKind::LogisticHash3,
            _ => ModelKind::NaiveBayesHash3,
        }
    }
}

/// Decision boundaries partitioning [0, 1] into Human / Unknown / AI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub human_max: f64,
    pub ai_min: f64,
}

impl Thresholds {
    /// Clamp both bounds to [0, 1] and order them
    pub fn new(human_max: f64, ai_min: f64) -> Self {
        let human_max = clamp_unit(human_max);
        let ai_min = clamp_unit(ai_min);
        if human_max > ai_min {
            Self {
                human_max: ai_min,
                ai_min: human_max,
            }
        } else {
            Self { human_max, ai_min }
        }
    }

    /// Build from explicit overrides, rejecting a non-increasing pair
    pub fn strict(human_max: f64, ai_min: f64) -> Result<Self, ModelError> {
        let human = clamp_unit(human_max);
        let ai = clamp_unit(ai_min);
        if ai <= human {
            return Err(ModelError::Thresholds { human, ai });
        }
        Ok(Self {
            human_max: human,
            ai_min: ai,
        })
    }

    pub fn classify(&self, score: f64) -> Judge {
        if score < self.human_max {
            Judge::Human
        } else if score < self.ai_min {
            Judge::Unknown
        } else {
            Judge::Ai
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            human_max: DEFAULT_HUMAN_MAX,
            ai_min: DEFAULT_AI_MIN,
        }
    }
}

/// Map a score to a judge using the model's thresholds
pub fn classify(score: f64, model: &ScoringModel) -> Judge {
    model.thresholds.classify(score)
}

/// Immutable trigram scoring model
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringModel {
    pub name: String,
    pub kind: ModelKind,
    pub dim: usize,
    pub max_chars: usize,
    /// Prior logit (bias for logistic models)
    pub prior_logit: f64,
    /// Per-bin weights, always exactly `dim` long
    pub delta: Vec<f64>,
    pub thresholds: Thresholds,
}

impl ScoringModel {
    /// Build a naive Bayes model, correcting out-of-range parameters
    pub fn new(
        name: &str,
        dim: usize,
        max_chars: usize,
        prior_logit: f64,
        delta: Vec<f64>,
        thresholds: Thresholds,
    ) -> Self {
        let dim = dim.clamp(1, MAX_DIM);
        Self {
            name: name.to_string(),
            kind: ModelKind::NaiveBayesHash3,
            dim,
            max_chars: max_chars.max(MIN_MAX_CHARS),
            prior_logit: finite_or_zero(prior_logit),
            delta: fit_weights(delta, dim),
            thresholds,
        }
    }

    /// Hard-coded model used when no configuration is available.
    ///
    /// Every bin weighs zero, so every text scores 0.5 (Unknown).
    pub fn fallback() -> Self {
        Self::new(
            "fallback",
            1,
            DEFAULT_MAX_CHARS,
            0.0,
            vec![0.0],
            Thresholds::default(),
        )
    }

    /// Build a model from a parsed JSON configuration object
    pub fn from_value(value: &Value) -> Result<Self, ModelError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ModelError::Invalid("configuration is not an object".to_string()))?;

        let kind = ModelKind::parse(obj.get("type").and_then(Value::as_str));
        let (bias_key, weights_key) = match kind {
            ModelKind::NaiveBayesHash3 => ("prior_logit", "delta"),
            ModelKind::LogisticHash3 => ("bias", "weights"),
        };

        let weights: Vec<f64> = obj
            .get(weights_key)
            .and_then(Value::as_array)
            .map(|arr| arr.iter().map(|v| coerce_f64(v).unwrap_or(0.0)).collect())
            .unwrap_or_default();

        let dim = match obj.get("dim").and_then(coerce_f64) {
            Some(d) if d > MAX_DIM as f64 => {
                return Err(ModelError::Invalid(format!("dim {} exceeds {}", d, MAX_DIM)))
            }
            Some(d) if d >= 1.0 => d as usize,
            _ if weights.len() > MAX_DIM => {
                return Err(ModelError::Invalid(format!(
                    "{} weights exceed dim limit {}",
                    weights.len(),
                    MAX_DIM
                )))
            }
            _ if !weights.is_empty() => weights.len(),
            _ => return Err(ModelError::Invalid("dim must be > 0".to_string())),
        };

        let max_chars = obj
            .get("max_chars")
            .and_then(coerce_f64)
            .filter(|v| *v > 0.0)
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_CHARS);

        let thresholds = obj.get("thresholds");
        let human_max = thresholds
            .and_then(|t| t.get("human_max"))
            .and_then(coerce_f64)
            .unwrap_or(DEFAULT_HUMAN_MAX);
        let ai_min = thresholds
            .and_then(|t| t.get("ai_min"))
            .and_then(coerce_f64)
            .unwrap_or(DEFAULT_AI_MIN);

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("hash_model");

        let prior = obj.get(bias_key).and_then(coerce_f64).unwrap_or(0.0);

        if weights.len() != dim {
            debug!(
                "Model {} has {} weights for dim {}; fitting",
                name,
                weights.len(),
                dim
            );
        }

        let mut model = Self::new(
            name,
            dim,
            max_chars,
            prior,
            weights,
            Thresholds::new(human_max, ai_min),
        );
        model.kind = kind;
        Ok(model)
    }

    /// Parse a model from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Load a model file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Load a model file, falling back to the neutral model on any error
    pub fn load_or_fallback<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(model) => model,
            Err(e) => {
                warn!("Using fallback model, {} unusable: {}", path.display(), e);
                Self::fallback()
            }
        }
    }

    /// Replace the thresholds (order-corrected)
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Probability that `text` is machine-generated
    pub fn score(&self, text: &str) -> f64 {
        let normalized: Vec<char> = normalize_for_scoring(text).chars().collect();
        if normalized.len() < 3 {
            return NEUTRAL_SCORE;
        }

        let limit = normalized.len().min(self.max_chars);
        let windows = limit - 2;

        let logit = match self.kind {
            ModelKind::NaiveBayesHash3 => {
                let mut logit = self.prior_logit;
                for i in 0..windows {
                    logit += self.delta[hash_trigram(&normalized, i, self.dim)];
                }
                logit
            }
            ModelKind::LogisticHash3 => {
                // Ordered map keeps the summation order, and so the result, stable
                let mut counts: BTreeMap<usize, u32> = BTreeMap::new();
                for i in 0..windows {
                    *counts.entry(hash_trigram(&normalized, i, self.dim)).or_insert(0) += 1;
                }
                let total = windows.max(1) as f64;
                counts.iter().fold(self.prior_logit, |acc, (&bin, &count)| {
                    acc + self.delta[bin] * (count as f64 / total)
                })
            }
        };

        sigmoid(logit)
    }

    pub fn classify(&self, score: f64) -> Judge {
        self.thresholds.classify(score)
    }
}

/// Overflow-free logistic function
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn fit_weights(mut weights: Vec<f64>, dim: usize) -> Vec<f64> {
    weights.resize(dim, 0.0);
    for w in &mut weights {
        *w = finite_or_zero(*w);
    }
    weights
}

/// Numbers and numeric strings become f64
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
