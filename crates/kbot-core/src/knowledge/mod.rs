//! Flat-file knowledge base: consolidation, fingerprinted loading and caching.

pub mod cache;
pub mod consolidate;
pub mod store;

pub use cache::{KnowledgeCache, KnowledgeDocument};
pub use store::{FileKnowledgeStore, Fingerprint, KnowledgeStore};
