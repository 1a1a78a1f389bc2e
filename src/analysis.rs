//! Text analysis: turning message text into index terms.
//!
//! The same [`Analyzer`](analyzer::Analyzer) instance is used for documents
//! and for queries, which is what makes every indexed term findable by a
//! query for that term.

pub mod analyzer;

pub use analyzer::{Analyzer, AnalyzerConfig, StandardAnalyzer};
