//! slopscan runtime
//!
//! Wires the scoring core, the fetch collaborator and the judgment cache
//! into one dispatcher that analyzes many discovered results at once:
//! - at most one analysis per URL in flight, shared by every caller
//! - a FIFO gate bounding simultaneous analyses
//! - snippet fallback whenever fetching or extraction comes up short

pub mod config;
pub mod dispatcher;
pub mod settings;

pub use config::*;
pub use dispatcher::*;
pub use settings::*;
