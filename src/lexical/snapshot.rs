//! The committed, immutable view of the index.
//!
//! A [`ReadSnapshot`] is never mutated once published. The document map, the
//! term dictionary and every posting list are persistent B-trees: cloning a
//! snapshot is O(1) and [`ReadSnapshot::apply`] path-copies only the nodes
//! the changed documents reach. A commit therefore costs
//! O(changed terms × log n) regardless of index size, and readers still
//! holding the previous snapshot keep an unchanged view.

use std::sync::Arc;

use imbl::OrdMap;

use crate::lexical::posting::{IndexedDocument, PostingList};

/// Queryable view of the index as of one commit.
#[derive(Debug, Clone, Default)]
pub struct ReadSnapshot {
    generation: u64,
    documents: OrdMap<String, Arc<IndexedDocument>>,
    terms: OrdMap<String, PostingList>,
    total_length: u64,
}

impl ReadSnapshot {
    /// The snapshot of an index with no documents.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of commits that produced this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub fn doc_count(&self) -> usize {
        self.documents.len()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.documents.contains_key(doc_id)
    }

    /// All document ids, ascending.
    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn document(&self, doc_id: &str) -> Option<&IndexedDocument> {
        self.documents.get(doc_id).map(Arc::as_ref)
    }

    /// All documents, ascending by id.
    pub fn documents(&self) -> impl Iterator<Item = &Arc<IndexedDocument>> {
        self.documents.values()
    }

    pub fn postings(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term)
    }

    /// Terms starting with `prefix`, in lexicographic order.
    pub fn terms_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a PostingList)> + 'a {
        self.terms
            .range(prefix.to_string()..)
            .take_while(move |(term, _)| term.starts_with(prefix))
            .map(|(term, list)| (term.as_str(), list))
    }

    /// Mean document length in tokens, 0.0 for an empty index.
    pub fn average_length(&self) -> f32 {
        if self.documents.is_empty() {
            0.0
        } else {
            (self.total_length as f64 / self.documents.len() as f64) as f32
        }
    }

    /// Build the snapshot that results from applying `removals` and then
    /// `upserts` to this one. `self` is left untouched.
    pub fn apply<'a>(
        &self,
        removals: impl IntoIterator<Item = &'a str>,
        upserts: impl IntoIterator<Item = &'a Arc<IndexedDocument>>,
        generation: u64,
    ) -> ReadSnapshot {
        let mut next = self.clone();
        next.apply_mut(removals, upserts);
        next.generation = generation;
        next
    }

    /// In-place variant of [`apply`](Self::apply), used while replaying
    /// segments into a snapshot nobody else can see yet.
    pub(crate) fn apply_mut<'a>(
        &mut self,
        removals: impl IntoIterator<Item = &'a str>,
        upserts: impl IntoIterator<Item = &'a Arc<IndexedDocument>>,
    ) {
        for doc_id in removals {
            self.unlink(doc_id);
        }
        for doc in upserts {
            self.unlink(&doc.id);
            self.link(Arc::clone(doc));
        }
    }

    fn link(&mut self, doc: Arc<IndexedDocument>) {
        self.total_length += u64::from(doc.length);
        for (term, tf) in &doc.terms {
            let mut list = self.terms.get(term).cloned().unwrap_or_default();
            list.insert(doc.id.clone(), *tf);
            self.terms.insert(term.clone(), list);
        }
        self.documents.insert(doc.id.clone(), doc);
    }

    fn unlink(&mut self, doc_id: &str) {
        let Some(old) = self.documents.remove(doc_id) else {
            return;
        };
        self.total_length = self.total_length.saturating_sub(u64::from(old.length));
        for term in old.terms.keys() {
            let Some(mut list) = self.terms.get(term).cloned() else {
                continue;
            };
            list.remove(doc_id);
            if list.is_empty() {
                self.terms.remove(term);
            } else {
                self.terms.insert(term.clone(), list);
            }
        }
    }
}
