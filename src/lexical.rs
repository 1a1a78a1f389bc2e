//! Inverted index: postings, the immutable read snapshot, the write session
//! that stages changes against it, and the query engine that ranks matches.
//!
//! # Module Structure
//!
//! - `posting`: per-document term statistics and per-term posting lists
//! - `snapshot`: the committed, queryable [`ReadSnapshot`]
//! - `writer`: the uncommitted [`WriteSession`]
//! - `query`: free-text query parsing
//! - `scoring`: BM25 relevance
//! - `searcher`: matching, ranking and pagination over a snapshot

pub mod posting;
pub mod query;
pub mod scoring;
pub mod searcher;
pub mod snapshot;
pub mod writer;

pub use posting::{IndexedDocument, PostingList};
pub use query::{Occur, ParsedQuery, QueryClause, QueryParser, TermMatch};
pub use scoring::{Bm25, Bm25Params};
pub use searcher::{SearchHit, SearchResults, Searcher};
pub use snapshot::ReadSnapshot;
pub use writer::WriteSession;
