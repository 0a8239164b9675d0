//! The taskloop context store.
//!
//! A size-bounded cache mapping resource identifiers (workspace paths) to
//! content plus access statistics, with:
//! - an inverted token index kept in sync with the cache
//! - relevance-ranked search (structural path classes, then index lookup)
//! - retention-scored compaction that evicts down to a target utilisation
//!
//! The store is internally locked; share it behind an `Arc` and never wrap it
//! in another lock.

pub mod index;
pub mod ingest;
pub mod scoring;
pub mod store;
pub mod tokenize;

pub use index::SearchIndex;
pub use ingest::{IngestReport, ingest_dir, resource_id};
pub use store::{CachedResource, CompactionReport, ContextStore, SearchHit, StoreStats};
