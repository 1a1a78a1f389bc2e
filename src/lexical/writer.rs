//! The write session: staged, not yet committed, index changes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::lexical::posting::IndexedDocument;

/// Upserts and removals staged since the last commit.
///
/// A doc id is never in both sets: the most recent operation on an id
/// replaces any earlier staged one. Nothing here is persisted; a process
/// exiting before commit loses the session and the producer re-submits.
#[derive(Debug, Default)]
pub struct WriteSession {
    upserts: BTreeMap<String, Arc<IndexedDocument>>,
    removals: BTreeSet<String>,
}

impl WriteSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `doc` to replace whatever the index holds for its id.
    ///
    /// Staging the same id twice keeps only the latest version.
    pub fn stage_upsert(&mut self, doc: IndexedDocument) {
        self.removals.remove(&doc.id);
        self.upserts.insert(doc.id.clone(), Arc::new(doc));
    }

    /// Stage removal of `doc_id`.
    ///
    /// Cancels any staged upsert for the id. A removal is only recorded when
    /// `committed` says the id exists in the current snapshot; removing an
    /// unknown id is a no-op.
    pub fn stage_removal(&mut self, doc_id: &str, committed: bool) {
        self.upserts.remove(doc_id);
        if committed {
            self.removals.insert(doc_id.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.len()
    }

    pub fn removal_count(&self) -> usize {
        self.removals.len()
    }

    pub fn is_staged_upsert(&self, doc_id: &str) -> bool {
        self.upserts.contains_key(doc_id)
    }

    pub fn is_staged_removal(&self, doc_id: &str) -> bool {
        self.removals.contains(doc_id)
    }

    /// Staged documents, ascending by id.
    pub fn upserts(&self) -> impl Iterator<Item = &Arc<IndexedDocument>> {
        self.upserts.values()
    }

    /// Staged removal ids, ascending.
    pub fn removals(&self) -> impl Iterator<Item = &str> {
        self.removals.iter().map(String::as_str)
    }

    /// Drop every staged change. Called once a commit is durable.
    pub fn clear(&mut self) {
        self.upserts.clear();
        self.removals.clear();
    }
}
