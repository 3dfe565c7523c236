//! slopscan core - scoring primitives for machine-generated prose estimates
//!
//! This crate provides the pure, I/O-free building blocks:
//! - Text normalization shared by extraction and scoring
//! - Character-trigram feature hashing
//! - Hashed linear scoring models and script-based model selection
//! - Judgment records persisted by the result cache
//! - User settings coercion and offline dataset evaluation

pub mod text;
pub mod hasher;
pub mod model;
pub mod selector;
pub mod judgment;
pub mod settings;
pub mod eval;

pub use text::*;
pub use hasher::*;
pub use model::*;
pub use selector::*;
pub use judgment::*;
pub use settings::*;
pub use eval::*;

/// Score returned for input too short to carry any trigram
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Default upper bound of the Human band
pub const DEFAULT_HUMAN_MAX: f64 = 0.45;

/// Default lower bound of the AI band
pub const DEFAULT_AI_MIN: f64 = 0.55;

/// Default number of normalized characters scanned per text
pub const DEFAULT_MAX_CHARS: usize = 1200;

/// Lowest accepted `max_chars`
pub const MIN_MAX_CHARS: usize = 200;

/// Schema version stamped on every judgment record
pub const CACHE_SCHEMA_VERSION: u32 = 3;
