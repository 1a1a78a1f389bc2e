use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::TempDir;

use mailindex::storage::file::FileStorageConfig;
use mailindex::storage::memory::{MemoryStorage, MemoryStorageConfig};
use mailindex::storage::{Storage, StorageInput, StorageLock, StorageOutput};
use mailindex::{IndexConfig, MailIndexError, SearchEngine, StorageConfig, StorageFactory};

/// Storage wrapper that injects write and rename failures on demand.
#[derive(Debug)]
struct FailingStorage {
    inner: MemoryStorage,
    fail_writes: AtomicBool,
    fail_renames: AtomicBool,
    fail_after_renames: AtomicBool,
}

impl FailingStorage {
    fn new(inner: MemoryStorage) -> Self {
        FailingStorage {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_renames: AtomicBool::new(false),
            fail_after_renames: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    fn set_failing_renames(&self, failing: bool) {
        self.fail_renames.store(failing, Ordering::SeqCst);
    }

    /// Renames still happen, but report an error afterwards, like a failed
    /// directory sync.
    fn set_failing_after_renames(&self, failing: bool) {
        self.fail_after_renames.store(failing, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool) -> mailindex::Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(MailIndexError::storage("injected failure"));
        }
        Ok(())
    }
}

impl Storage for FailingStorage {
    fn open_input(&self, name: &str) -> mailindex::Result<Box<dyn StorageInput>> {
        self.inner.open_input(name)
    }

    fn create_output(&self, name: &str) -> mailindex::Result<Box<dyn StorageOutput>> {
        self.check(&self.fail_writes)?;
        self.inner.create_output(name)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.inner.file_exists(name)
    }

    fn delete_file(&self, name: &str) -> mailindex::Result<()> {
        self.inner.delete_file(name)
    }

    fn rename_file(&self, from: &str, to: &str) -> mailindex::Result<()> {
        self.check(&self.fail_writes)?;
        self.check(&self.fail_renames)?;
        self.inner.rename_file(from, to)?;
        self.check(&self.fail_after_renames)
    }

    fn list_files(&self) -> mailindex::Result<Vec<String>> {
        self.inner.list_files()
    }

    fn try_lock(&self) -> mailindex::Result<Box<dyn StorageLock>> {
        self.inner.try_lock()
    }
}

fn file_engine(dir: &TempDir) -> mailindex::Result<SearchEngine> {
    let storage = StorageFactory::create(StorageConfig::File(FileStorageConfig::new(dir.path())))?;
    SearchEngine::new(storage, IndexConfig::default())
}

#[test]
fn test_reopen_recovers_committed_state() -> mailindex::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = file_engine(&temp_dir)?;
        engine.index("m1", &["Quarterly report", "finance team"])?;
        engine.index("m2", &["Lunch on Friday"])?;
        engine.commit()?;
        engine.remove("m2")?;
        engine.index("m3", &["Quarterly planning"])?;
        engine.commit()?;

        // Staged but never committed: lost on close.
        engine.index("m4", &["draft"])?;
    }

    let engine = file_engine(&temp_dir)?;
    assert_eq!(engine.list(), vec!["m1", "m3"]);
    assert!(!engine.exists("m4"));
    assert_eq!(engine.stats().generation, 2);

    let mut ids = engine.search("quarterly", 0, 10)?.ids();
    ids.sort();
    assert_eq!(ids, vec!["m1", "m3"]);
    assert!(engine.search("lunch", 0, 10)?.is_empty());

    Ok(())
}

#[test]
fn test_open_path_convenience() -> mailindex::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("user").join("index");
    {
        let engine = SearchEngine::open(&path)?;
        engine.index("m1", &["hello"])?;
        engine.commit()?;
    }
    let engine = SearchEngine::open(&path)?;
    assert!(engine.exists("m1"));
    Ok(())
}

#[test]
fn test_second_instance_is_unavailable() -> mailindex::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let first = file_engine(&temp_dir)?;

    let err = file_engine(&temp_dir).unwrap_err();
    assert!(matches!(err, MailIndexError::StoreUnavailable(_)));

    drop(first);
    file_engine(&temp_dir)?;
    Ok(())
}

#[test]
fn test_inaccessible_path_is_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("not-a-dir");
    std::fs::write(&file_path, b"x").unwrap();

    let err = SearchEngine::open(&file_path).unwrap_err();
    assert!(matches!(err, MailIndexError::StoreUnavailable(_)));
}

#[test]
fn test_corrupt_segment_is_unavailable() -> mailindex::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = file_engine(&temp_dir)?;
        engine.index("m1", &["hello"])?;
        engine.commit()?;
    }

    let segment = temp_dir.path().join("segment_000000.seg");
    let mut data = std::fs::read(&segment).unwrap();
    let mid = data.len() / 2;
    data[mid] ^= 0xFF;
    std::fs::write(&segment, data).unwrap();

    let err = file_engine(&temp_dir).unwrap_err();
    assert!(matches!(err, MailIndexError::StoreUnavailable(_)));
    Ok(())
}

#[test]
fn test_crash_before_manifest_rename_is_invisible() -> mailindex::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = file_engine(&temp_dir)?;
        engine.index("m1", &["hello"])?;
        engine.commit()?;
    }

    // A segment and manifest that were written but never renamed into place.
    std::fs::copy(
        temp_dir.path().join("segment_000000.seg"),
        temp_dir.path().join("segment_000001.seg"),
    )
    .unwrap();
    let mut tmp = std::fs::File::create(temp_dir.path().join("segments.json.tmp")).unwrap();
    tmp.write_all(b"partial").unwrap();
    drop(tmp);

    let engine = file_engine(&temp_dir)?;
    assert_eq!(engine.list(), vec!["m1"]);
    assert!(!temp_dir.path().join("segment_000001.seg").exists());
    assert!(!temp_dir.path().join("segments.json.tmp").exists());

    // The next commit reuses the orphan's id safely.
    engine.index("m2", &["world"])?;
    engine.commit()?;
    drop(engine);
    let engine = file_engine(&temp_dir)?;
    assert_eq!(engine.list(), vec!["m1", "m2"]);
    Ok(())
}

#[test]
fn test_commit_failure_keeps_snapshot_and_session() -> mailindex::Result<()> {
    let storage = Arc::new(FailingStorage::new(MemoryStorage::new(
        MemoryStorageConfig::default(),
    )));
    let engine = SearchEngine::new(storage.clone(), IndexConfig::default())?;
    engine.index("m1", &["hello"])?;
    engine.commit()?;

    engine.index("m2", &["hello again"])?;
    engine.remove("m1")?;
    storage.set_failing(true);

    let err = engine.commit().unwrap_err();
    assert!(matches!(err, MailIndexError::CommitFailure(_)));

    // Last good snapshot is still published and the changes are still staged.
    assert_eq!(engine.list(), vec!["m1"]);
    assert_eq!(engine.search("hello", 0, 10)?.ids(), vec!["m1"]);
    assert!(engine.has_pending_changes());
    assert_eq!(engine.stats().generation, 1);

    storage.set_failing(false);
    engine.commit()?;
    assert_eq!(engine.list(), vec!["m2"]);
    assert_eq!(engine.stats().generation, 2);
    assert!(!engine.has_pending_changes());
    Ok(())
}

#[test]
fn test_failed_manifest_write_leaves_no_segment() -> mailindex::Result<()> {
    let inner = MemoryStorage::new(MemoryStorageConfig::default());
    let storage = Arc::new(FailingStorage::new(inner.clone()));
    let engine = SearchEngine::new(storage.clone(), IndexConfig::default())?;
    engine.index("m1", &["hello"])?;
    engine.commit()?;

    engine.index("m2", &["world"])?;
    storage.set_failing_renames(true);
    assert!(matches!(
        engine.commit(),
        Err(MailIndexError::CommitFailure(_))
    ));
    storage.set_failing_renames(false);
    drop(engine);

    let files = inner.list_files()?;
    assert_eq!(files, vec!["segment_000000.seg", "segments.json"]);

    let engine = SearchEngine::new(storage, IndexConfig::default())?;
    assert_eq!(engine.list(), vec!["m1"]);
    Ok(())
}

#[test]
fn test_error_after_manifest_rename_keeps_segments() -> mailindex::Result<()> {
    let inner = MemoryStorage::new(MemoryStorageConfig::default());
    let storage = Arc::new(FailingStorage::new(inner.clone()));
    let config = IndexConfig::builder().max_segments(2).build();
    let engine = SearchEngine::new(storage.clone(), config.clone())?;
    engine.index("m1", &["hello"])?;
    engine.commit()?;

    storage.set_failing_after_renames(true);

    // Delta segment: the manifest naming it is already in place.
    engine.index("m2", &["world"])?;
    engine.commit()?;
    assert_eq!(engine.list(), vec!["m1", "m2"]);
    assert!(!engine.has_pending_changes());
    assert_eq!(
        inner.list_files()?,
        vec!["segment_000000.seg", "segment_000001.seg", "segments.json"]
    );

    // Compaction: the full segment survives and the replaced ones go.
    engine.index("m3", &["again"])?;
    engine.commit()?;
    assert_eq!(engine.stats().segment_count, 1);
    assert_eq!(inner.list_files()?, vec!["segment_000002.seg", "segments.json"]);

    storage.set_failing_after_renames(false);
    drop(engine);

    let engine = SearchEngine::new(storage, config)?;
    assert_eq!(engine.list(), vec!["m1", "m2", "m3"]);
    assert_eq!(engine.stats().generation, 3);
    assert_eq!(engine.search("world", 0, 10)?.ids(), vec!["m2"]);
    Ok(())
}

#[test]
fn test_compaction_across_reopen() -> mailindex::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config = IndexConfig::builder().max_segments(3).build();
    let open = || -> mailindex::Result<SearchEngine> {
        let storage =
            StorageFactory::create(StorageConfig::File(FileStorageConfig::new(temp_dir.path())))?;
        SearchEngine::new(storage, config.clone())
    };

    {
        let engine = open()?;
        for i in 0..10 {
            engine.index(&format!("m{i}"), &[format!("message number {i}")])?;
            if i % 3 == 0 {
                engine.remove(&format!("m{}", i / 2))?;
            }
            engine.commit()?;
            assert!(engine.stats().segment_count <= 3);
        }
    }

    let segment_files = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".seg"))
        .count();

    let engine = open()?;
    assert_eq!(segment_files, engine.stats().segment_count);
    assert_eq!(engine.stats().generation, 10);
    let expected_before = engine.list();

    engine.optimize()?;
    assert_eq!(engine.stats().segment_count, 1);
    drop(engine);

    let engine = open()?;
    assert_eq!(engine.list(), expected_before);
    assert_eq!(engine.search("message", 0, 100)?.total_hits, expected_before.len());
    Ok(())
}
