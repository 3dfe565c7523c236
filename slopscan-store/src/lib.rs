//! slopscan storage
//!
//! - `KeyValueStore`: the narrow host storage interface
//! - `MemoryStore` / `JsonFileStore`: in-process and on-disk adapters
//! - `ResultCache`: TTL-bounded, schema-versioned judgment cache keyed by URL hash

pub mod store;
pub mod file;
pub mod cache;

pub use store::*;
pub use file::*;
pub use cache::*;
