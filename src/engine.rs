pub mod config;

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::analysis::{Analyzer, StandardAnalyzer};
use crate::error::{MailIndexError, Result};
use crate::lexical::posting::IndexedDocument;
use crate::lexical::query::QueryParser;
use crate::lexical::searcher::{SearchResults, Searcher};
use crate::lexical::snapshot::ReadSnapshot;
use crate::lexical::writer::WriteSession;
use crate::storage::Storage;
use crate::storage::file::{FileStorage, FileStorageConfig};
use crate::store::DocumentStore;

use self::config::IndexConfig;

/// Counters describing an open index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Documents in the current snapshot.
    pub doc_count: usize,
    /// Distinct terms in the current snapshot.
    pub term_count: usize,
    /// Number of commits the current snapshot reflects.
    pub generation: u64,
    /// Live segment files.
    pub segment_count: usize,
    pub pending_upserts: usize,
    pub pending_removals: usize,
}

#[derive(Debug)]
struct WriterState {
    session: WriteSession,
    store: DocumentStore,
}

/// Full-text index over a mutable set of mail messages.
///
/// Writes (`index`, `remove`) are staged in a write session and become
/// visible to `search`, `list` and `exists` only after `commit`. Reads run
/// against the snapshot published by the last commit and never wait for
/// staging; commit excludes readers only for the instant it swaps the
/// snapshot pointer.
///
/// The engine is `Send + Sync`; share it between an indexing thread and query
/// threads with an `Arc`.
///
/// # Example
///
/// ```no_run
/// use mailindex::SearchEngine;
///
/// # fn main() -> mailindex::Result<()> {
/// let engine = SearchEngine::open("/tmp/mail-index")?;
/// engine.index("INBOX/1", &["Lunch on Friday?", "alice@example.com"])?;
/// engine.commit()?;
///
/// let page = engine.search("lunch", 0, 20)?;
/// assert_eq!(page.ids(), vec!["INBOX/1"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SearchEngine {
    config: IndexConfig,
    analyzer: Arc<dyn Analyzer>,
    parser: QueryParser,
    writer: Mutex<WriterState>,
    snapshot: RwLock<Arc<ReadSnapshot>>,
}

impl SearchEngine {
    /// Open (or create) a file-backed index in the directory at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let storage = FileStorage::new(FileStorageConfig::new(path.as_ref()))
            .map_err(MailIndexError::into_store_unavailable)?;
        Self::new(Arc::new(storage), IndexConfig::default())
    }

    /// Open an index over any storage backend.
    ///
    /// Takes exclusive ownership of the store and recovers the state of its
    /// last complete commit.
    pub fn new(storage: Arc<dyn Storage>, config: IndexConfig) -> Result<Self> {
        config.validate()?;

        let (store, snapshot) = DocumentStore::open(storage, config.max_segments)?;
        let analyzer: Arc<dyn Analyzer> =
            Arc::new(StandardAnalyzer::with_config(config.analyzer.clone()));

        Ok(SearchEngine {
            parser: QueryParser::new(Arc::clone(&analyzer)),
            analyzer,
            config,
            writer: Mutex::new(WriterState {
                session: WriteSession::new(),
                store,
            }),
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Stage `fields` as the new content of `doc_id`.
    ///
    /// Replaces any earlier content for the id once committed. `fields` may
    /// be empty, in which case the document exists but no query matches it.
    pub fn index<S: AsRef<str>>(&self, doc_id: &str, fields: &[S]) -> Result<()> {
        check_doc_id(doc_id)?;

        let texts: Vec<&str> = fields.iter().map(AsRef::as_ref).collect();
        let (terms, length) = self.analyzer.term_frequencies(&texts);
        let doc = IndexedDocument::new(doc_id, terms, length);

        self.writer.lock().session.stage_upsert(doc);
        Ok(())
    }

    /// Stage removal of `doc_id`. Removing an unknown id is a no-op, and the
    /// empty id is always unknown since [`index`](Self::index) rejects it.
    pub fn remove(&self, doc_id: &str) -> Result<()> {
        let mut writer = self.writer.lock();
        let committed = self.snapshot.read().contains(doc_id);
        writer.session.stage_removal(doc_id, committed);
        Ok(())
    }

    /// Durably apply every staged change and publish the resulting snapshot.
    ///
    /// On [`MailIndexError::CommitFailure`] the staged changes stay pending
    /// and the previous snapshot stays published, so the call can be retried.
    pub fn commit(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        if writer.session.is_empty() {
            log::debug!("commit: nothing staged");
            return Ok(());
        }

        let base = Arc::clone(&*self.snapshot.read());
        let WriterState { session, store } = &mut *writer;
        let next = store.commit(&base, session)?;
        session.clear();

        *self.snapshot.write() = Arc::new(next);
        Ok(())
    }

    /// Ranked matches `[offset, offset + max)` for `query`.
    ///
    /// Query text that yields no usable term matches nothing.
    pub fn search(&self, query: &str, offset: usize, max: usize) -> Result<SearchResults> {
        let snapshot = self.snapshot();
        let parsed = self.parser.parse(query);
        let searcher = Searcher::new(
            &snapshot,
            self.config.bm25,
            self.config.max_prefix_expansions,
        );
        Ok(searcher.search(&parsed, offset, max))
    }

    /// Every committed doc id, ascending.
    pub fn list(&self) -> Vec<String> {
        self.snapshot().doc_ids().map(str::to_string).collect()
    }

    /// Whether `doc_id` is in the committed snapshot.
    pub fn exists(&self, doc_id: &str) -> bool {
        self.snapshot.read().contains(doc_id)
    }

    /// The current snapshot. It stays valid, and unchanged, across later
    /// commits.
    pub fn snapshot(&self) -> Arc<ReadSnapshot> {
        Arc::clone(&*self.snapshot.read())
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.writer.lock().session.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let writer = self.writer.lock();
        let snapshot = self.snapshot();
        IndexStats {
            doc_count: snapshot.doc_count(),
            term_count: snapshot.term_count(),
            generation: snapshot.generation(),
            segment_count: writer.store.segment_count(),
            pending_upserts: writer.session.upsert_count(),
            pending_removals: writer.session.removal_count(),
        }
    }

    /// Rewrite the committed state as a single segment.
    ///
    /// Staged changes are left pending.
    pub fn optimize(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        if writer.store.segment_count() <= 1 {
            return Ok(());
        }
        let snapshot = self.snapshot();
        writer.store.compact(&snapshot)
    }
}

fn check_doc_id(doc_id: &str) -> Result<()> {
    if doc_id.is_empty() {
        return Err(MailIndexError::invalid_argument("document id must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryStorage, MemoryStorageConfig};

    fn engine() -> SearchEngine {
        let storage = Arc::new(MemoryStorage::new(MemoryStorageConfig::default()));
        SearchEngine::new(storage, IndexConfig::default()).unwrap()
    }

    #[test]
    fn test_writes_invisible_until_commit() {
        let engine = engine();
        engine.index("m1", &["Hello world"]).unwrap();
        assert!(!engine.exists("m1"));
        assert!(engine.search("hello", 0, 10).unwrap().is_empty());
        assert!(engine.has_pending_changes());

        engine.commit().unwrap();
        assert!(engine.exists("m1"));
        assert_eq!(engine.search("hello", 0, 10).unwrap().ids(), vec!["m1"]);
        assert!(!engine.has_pending_changes());
    }

    #[test]
    fn test_empty_id_rejected_by_index_only() {
        let engine = engine();
        let err = engine.index("", &["x"]).unwrap_err();
        assert!(matches!(err, MailIndexError::InvalidArgument(_)));
        engine.remove("").unwrap();
        assert!(!engine.has_pending_changes());
        assert!(!engine.exists(""));
    }

    #[test]
    fn test_empty_commit_is_noop() {
        let engine = engine();
        engine.commit().unwrap();
        engine.commit().unwrap();
        assert_eq!(engine.stats().generation, 0);
        assert_eq!(engine.stats().segment_count, 0);
    }

    #[test]
    fn test_document_without_fields() {
        let engine = engine();
        engine.index::<&str>("m1", &[]).unwrap();
        engine.commit().unwrap();
        assert!(engine.exists("m1"));
        assert_eq!(engine.list(), vec!["m1"]);
        assert!(engine.search("m1", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_update_replaces_content() {
        let engine = engine();
        engine.index("m1", &["draft agenda"]).unwrap();
        engine.commit().unwrap();
        engine.index("m1", &["final agenda"]).unwrap();
        engine.commit().unwrap();

        assert!(engine.search("draft", 0, 10).unwrap().is_empty());
        assert_eq!(engine.search("final", 0, 10).unwrap().ids(), vec!["m1"]);
        assert_eq!(engine.stats().doc_count, 1);
    }

    #[test]
    fn test_held_snapshot_is_stable() {
        let engine = engine();
        engine.index("m1", &["alpha"]).unwrap();
        engine.commit().unwrap();

        let held = engine.snapshot();
        engine.remove("m1").unwrap();
        engine.index("m2", &["alpha"]).unwrap();
        engine.commit().unwrap();

        assert_eq!(held.doc_ids().collect::<Vec<_>>(), vec!["m1"]);
        assert_eq!(engine.list(), vec!["m2"]);
    }

    #[test]
    fn test_stats_and_optimize() {
        let storage = Arc::new(MemoryStorage::new(MemoryStorageConfig::default()));
        let engine = SearchEngine::new(storage, IndexConfig::builder().max_segments(10).build())
            .unwrap();
        for i in 0..3 {
            engine.index(&format!("m{i}"), &["report"]).unwrap();
            engine.commit().unwrap();
        }
        engine.remove("m0").unwrap();

        let stats = engine.stats();
        assert_eq!(stats.doc_count, 3);
        assert_eq!(stats.generation, 3);
        assert_eq!(stats.segment_count, 3);
        assert_eq!(stats.pending_removals, 1);

        engine.optimize().unwrap();
        let stats = engine.stats();
        assert_eq!(stats.segment_count, 1);
        assert_eq!(stats.pending_removals, 1);
        assert_eq!(stats.doc_count, 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let storage = Arc::new(MemoryStorage::new(MemoryStorageConfig::default()));
        let config = IndexConfig::builder().max_prefix_expansions(0).build();
        assert!(matches!(
            SearchEngine::new(storage, config),
            Err(MailIndexError::InvalidArgument(_))
        ));
    }
}
