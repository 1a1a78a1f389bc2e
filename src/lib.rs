//! # mailindex
//!
//! A local full-text search index for cached mail messages.
//!
//! ## Features
//!
//! - Staged writes published atomically on commit
//! - Lock-free reads against immutable, copy-on-write snapshots
//! - BM25 ranking with deterministic pagination
//! - Crash-safe segmented storage with automatic compaction
//! - Pluggable storage backends (directory or in-memory)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mailindex::{IndexConfig, SearchEngine, StorageConfig, StorageFactory};
//! use mailindex::storage::file::FileStorageConfig;
//!
//! # fn main() -> mailindex::Result<()> {
//! let storage = StorageFactory::create(StorageConfig::File(FileStorageConfig::new(
//!     "/var/cache/mail/index",
//! )))?;
//! let engine = Arc::new(SearchEngine::new(storage, IndexConfig::default())?);
//!
//! engine.index("INBOX/42", &["Quarterly report", "Numbers attached."])?;
//! engine.commit()?;
//!
//! let page = engine.search("+quarterly report*", 0, 25)?;
//! for hit in &page.hits {
//!     println!("{} {:.3}", hit.doc_id, hit.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
mod engine;
mod error;
pub mod lexical;
pub mod storage;
pub mod store;

pub use analysis::{Analyzer, AnalyzerConfig, StandardAnalyzer};
pub use engine::config::{IndexConfig, IndexConfigBuilder};
pub use engine::{IndexStats, SearchEngine};
pub use error::{MailIndexError, Result};
pub use lexical::{Bm25Params, ReadSnapshot, SearchHit, SearchResults};
pub use storage::{Storage, StorageConfig, StorageFactory};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
