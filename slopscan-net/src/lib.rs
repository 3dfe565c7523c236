//! slopscan network layer
//!
//! Everything between a result URL and a text sample:
//! - HTTP client construction with timeouts and user-agent rotation
//! - The `HtmlFetcher` collaborator and its reqwest adapter
//! - Main-text extraction from fetched markup

pub mod client;
pub mod fetcher;
pub mod extract;

pub use client::*;
pub use fetcher::*;
pub use extract::*;
