//! Analysis record persistence.
//!
//! The analyzer hands each finished run to an [`AnalysisStore`] as a flat
//! [`AnalysisRecord`](vscope_models::AnalysisRecord). Listing, renaming and
//! deleting records belong to whatever sits behind the store.

pub mod error;
pub mod repo;

pub use error::{StoreError, StoreResult};
pub use repo::{AnalysisStore, InMemoryStore, JsonLinesStore};
