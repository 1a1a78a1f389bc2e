//! Posting lists and indexed document statistics.

use std::collections::BTreeMap;

use imbl::OrdMap;

/// The analyzed form of one document: what the index needs to score it and
/// to unlink it again on update or removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDocument {
    /// Caller-assigned document id.
    pub id: String,

    /// Number of tokens across all fields (BM25 document length).
    pub length: u32,

    /// Term -> frequency in this document.
    pub terms: BTreeMap<String, u32>,
}

impl IndexedDocument {
    pub fn new(id: impl Into<String>, terms: BTreeMap<String, u32>, length: u32) -> Self {
        IndexedDocument {
            id: id.into(),
            length,
            terms,
        }
    }

    /// A document with no terms. It can be listed and checked for existence
    /// but no free-text query matches it.
    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, BTreeMap::new(), 0)
    }

    pub fn term_frequency(&self, term: &str) -> u32 {
        self.terms.get(term).copied().unwrap_or(0)
    }
}

/// The documents containing one term, keyed by doc id, with the term's
/// frequency in each.
///
/// Cloning is O(1) and the clone shares structure with the original until
/// either one changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingList {
    postings: OrdMap<String, u32>,
}

impl PostingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc_id: impl Into<String>, term_freq: u32) {
        self.postings.insert(doc_id.into(), term_freq);
    }

    /// Returns `true` if the document was present.
    pub fn remove(&mut self, doc_id: &str) -> bool {
        self.postings.remove(doc_id).is_some()
    }

    pub fn term_frequency(&self, doc_id: &str) -> Option<u32> {
        self.postings.get(doc_id).copied()
    }

    /// Document frequency of the term.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Postings in ascending doc id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.postings.iter().map(|(id, tf)| (id.as_str(), *tf))
    }
}
