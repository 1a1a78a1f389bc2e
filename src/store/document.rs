//! The durable document store.
//!
//! The store owns a directory (any [`Storage`]) laid out as:
//!
//! ```text
//! LOCK                 exclusive ownership marker
//! segments.json        manifest: generation and the ordered list of live segments
//! segment_NNNNNN.seg   one file per segment (see `store::segment`)
//! ```
//!
//! A commit writes a new segment, then atomically replaces the manifest
//! through a temporary file. The manifest rename is the commit point: a crash
//! before it leaves the previous manifest and therefore the previous state,
//! and the unreferenced segment is removed on the next open.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MailIndexError, Result};
use crate::lexical::posting::IndexedDocument;
use crate::lexical::snapshot::ReadSnapshot;
use crate::lexical::writer::WriteSession;
use crate::storage::structured::{StructReader, StructWriter};
use crate::storage::{Storage, StorageLock};
use crate::store::segment::{SegmentMeta, SegmentReader, SegmentWriter, parse_segment_file_name};

const MANIFEST_FILE: &str = "segments.json";
const MANIFEST_TMP_FILE: &str = "segments.json.tmp";
const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreManifest {
    version: u32,
    generation: u64,
    segments: Vec<SegmentMeta>,
    next_segment_id: u32,
}

impl Default for StoreManifest {
    fn default() -> Self {
        StoreManifest {
            version: MANIFEST_VERSION,
            generation: 0,
            segments: Vec::new(),
            next_segment_id: 0,
        }
    }
}

/// Segmented, crash-safe persistence for committed index state.
#[derive(Debug)]
pub struct DocumentStore {
    storage: Arc<dyn Storage>,
    manifest: StoreManifest,
    max_segments: usize,
    _lock: Box<dyn StorageLock>,
}

impl DocumentStore {
    /// Take ownership of the store in `storage` and rebuild its committed
    /// snapshot.
    ///
    /// Any failure (lock held, unreadable or corrupt files) is reported as
    /// [`MailIndexError::StoreUnavailable`].
    pub fn open(storage: Arc<dyn Storage>, max_segments: usize) -> Result<(Self, ReadSnapshot)> {
        Self::open_inner(storage, max_segments).map_err(MailIndexError::into_store_unavailable)
    }

    fn open_inner(storage: Arc<dyn Storage>, max_segments: usize) -> Result<(Self, ReadSnapshot)> {
        let lock = storage.try_lock()?;

        let manifest = if storage.file_exists(MANIFEST_FILE) {
            read_manifest(storage.as_ref())?
        } else {
            StoreManifest::default()
        };

        let mut snapshot = ReadSnapshot::empty();
        for meta in &manifest.segments {
            let data = SegmentReader::new(Arc::clone(&storage), meta.clone()).read()?;
            if data.full {
                snapshot = ReadSnapshot::empty();
            }
            snapshot.apply_mut(data.removals.iter().map(String::as_str), &data.documents);
        }
        snapshot.set_generation(manifest.generation);

        let store = DocumentStore {
            storage,
            manifest,
            max_segments: max_segments.max(1),
            _lock: lock,
        };
        store.remove_orphans()?;

        log::info!(
            "opened document store: {} documents, generation {}, {} segments",
            snapshot.doc_count(),
            snapshot.generation(),
            store.segment_count()
        );
        Ok((store, snapshot))
    }

    /// Generation of the last durable commit.
    pub fn generation(&self) -> u64 {
        self.manifest.generation
    }

    pub fn segment_count(&self) -> usize {
        self.manifest.segments.len()
    }

    /// Make `session` durable on top of `base` and return the resulting
    /// snapshot.
    ///
    /// On error nothing becomes visible: the manifest still names the
    /// previous state, `base` stays valid and the caller keeps the session.
    /// Errors are reported as [`MailIndexError::CommitFailure`].
    pub fn commit(&mut self, base: &ReadSnapshot, session: &WriteSession) -> Result<ReadSnapshot> {
        let generation = self.manifest.generation + 1;
        let next = base.apply(session.removals(), session.upserts(), generation);

        let compact = self.manifest.segments.len() >= self.max_segments;
        let result = if compact {
            self.write_full(&next)
        } else {
            self.write_delta(generation, session)
        };
        result.map_err(|e| {
            log::warn!("commit of generation {generation} failed: {e}");
            e.into_commit_failure()
        })?;

        log::debug!(
            "committed generation {generation}: {} upserts, {} removals",
            session.upsert_count(),
            session.removal_count()
        );
        Ok(next)
    }

    /// Replace every segment with one full segment holding `snapshot`.
    ///
    /// `snapshot` must be the state of the last commit.
    pub fn compact(&mut self, snapshot: &ReadSnapshot) -> Result<()> {
        self.write_full(snapshot)
            .map_err(MailIndexError::into_commit_failure)
    }

    fn write_delta(&mut self, generation: u64, session: &WriteSession) -> Result<()> {
        let removals: Vec<&str> = session.removals().collect();
        let documents: Vec<&IndexedDocument> = session.upserts().map(Arc::as_ref).collect();
        let id = self.manifest.next_segment_id;
        let meta = SegmentWriter::new(Arc::clone(&self.storage))
            .write_segment(id, generation, false, &removals, &documents)?;

        let mut manifest = self.manifest.clone();
        manifest.generation = generation;
        manifest.segments.push(meta);
        manifest.next_segment_id = id + 1;
        self.publish(manifest)?;
        Ok(())
    }

    fn write_full(&mut self, snapshot: &ReadSnapshot) -> Result<()> {
        let documents: Vec<&IndexedDocument> = snapshot.documents().map(Arc::as_ref).collect();
        let id = self.manifest.next_segment_id;
        let meta = SegmentWriter::new(Arc::clone(&self.storage)).write_segment(
            id,
            snapshot.generation(),
            true,
            &[],
            &documents,
        )?;

        let mut manifest = self.manifest.clone();
        manifest.generation = snapshot.generation();
        manifest.segments = vec![meta];
        manifest.next_segment_id = id + 1;
        let replaced = self.publish(manifest)?;

        log::info!(
            "compacted {} segments into segment {id} ({} documents)",
            replaced.segments.len(),
            documents.len()
        );
        for old in &replaced.segments {
            self.delete_quietly(&old.file_name());
        }
        Ok(())
    }

    /// Atomically install `manifest`, returning the one it replaced.
    ///
    /// If the manifest never reaches its final name, the segment it would
    /// have named is deleted again. Once the rename has taken effect the
    /// manifest is installed even if the storage reported an error, since
    /// the on-disk store already refers to the new segment.
    fn publish(&mut self, manifest: StoreManifest) -> Result<StoreManifest> {
        if let Err(e) = write_manifest_tmp(self.storage.as_ref(), &manifest) {
            self.discard(&manifest);
            return Err(e);
        }
        if let Err(e) = self.storage.rename_file(MANIFEST_TMP_FILE, MANIFEST_FILE) {
            if self.storage.file_exists(MANIFEST_TMP_FILE) {
                self.discard(&manifest);
                return Err(e);
            }
            log::warn!(
                "manifest for generation {} is in place but the rename reported: {e}",
                manifest.generation
            );
        }
        Ok(std::mem::replace(&mut self.manifest, manifest))
    }

    /// Remove the files written for a manifest that was never installed.
    fn discard(&self, manifest: &StoreManifest) {
        if let Some(meta) = manifest.segments.last() {
            self.delete_quietly(&meta.file_name());
        }
        self.delete_quietly(MANIFEST_TMP_FILE);
    }

    /// Delete segment files the manifest does not name and leftover
    /// temporary files.
    fn remove_orphans(&self) -> Result<()> {
        let live: BTreeSet<u32> = self.manifest.segments.iter().map(|s| s.id).collect();
        for name in self.storage.list_files()? {
            let orphan = match parse_segment_file_name(&name) {
                Some(id) => !live.contains(&id),
                None => name.ends_with(".tmp"),
            };
            if orphan {
                log::warn!("removing orphaned file {name}");
                self.storage.delete_file(&name)?;
            }
        }
        Ok(())
    }

    fn delete_quietly(&self, name: &str) {
        if let Err(e) = self.storage.delete_file(name) {
            log::warn!("failed to delete {name}: {e}");
        }
    }
}

fn read_manifest(storage: &dyn Storage) -> Result<StoreManifest> {
    let input = storage.open_input(MANIFEST_FILE)?;
    let mut reader = StructReader::new(input)?;
    let json = reader.read_bytes()?;
    let manifest: StoreManifest = serde_json::from_slice(&json)
        .map_err(|e| MailIndexError::corrupt(format!("failed to deserialize manifest: {e}")))?;
    if manifest.version != MANIFEST_VERSION {
        return Err(MailIndexError::corrupt(format!(
            "unsupported manifest version {}",
            manifest.version
        )));
    }
    Ok(manifest)
}

fn write_manifest_tmp(storage: &dyn Storage, manifest: &StoreManifest) -> Result<()> {
    let json = serde_json::to_vec(manifest)?;
    let mut writer = StructWriter::new(storage.create_output(MANIFEST_TMP_FILE)?);
    writer.write_bytes(&json)?;
    writer.close()
}
