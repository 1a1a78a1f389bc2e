//! In-memory storage, used for tests and throwaway indexes.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{MailIndexError, Result};
use crate::storage::{Storage, StorageInput, StorageLock, StorageOutput};

/// Configuration for [`MemoryStorage`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStorageConfig {
    /// Initial capacity hint for output buffers.
    #[serde(default)]
    pub initial_buffer_size: usize,
}

type FileMap = Arc<Mutex<BTreeMap<String, Arc<Vec<u8>>>>>;

/// Storage backed by a shared in-process map.
///
/// Clones share the same files and the same lock, so a clone behaves like a
/// second handle on the same directory.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    config: MemoryStorageConfig,
    files: FileMap,
    locked: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new(config: MemoryStorageConfig) -> Self {
        MemoryStorage {
            config,
            files: Arc::new(Mutex::new(BTreeMap::new())),
            locked: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let data = self.files.lock().get(name).cloned().ok_or_else(|| {
            MailIndexError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {name}"),
            ))
        })?;
        Ok(Box::new(MemoryInput {
            cursor: Cursor::new(data),
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        self.files
            .lock()
            .insert(name.to_string(), Arc::new(Vec::new()));
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buffer: Vec::with_capacity(self.config.initial_buffer_size),
            files: Arc::clone(&self.files),
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files.lock().remove(name);
        Ok(())
    }

    fn rename_file(&self, from: &str, to: &str) -> Result<()> {
        let mut files = self.files.lock();
        let data = files.remove(from).ok_or_else(|| {
            MailIndexError::storage(format!("cannot rename missing file {from}"))
        })?;
        files.insert(to.to_string(), data);
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files.lock().keys().cloned().collect())
    }

    fn try_lock(&self) -> Result<Box<dyn StorageLock>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(MailIndexError::store_unavailable(
                "memory store is locked by another instance",
            ));
        }
        Ok(Box::new(MemoryLock {
            locked: Arc::clone(&self.locked),
        }))
    }
}

#[derive(Debug)]
struct MemoryInput {
    cursor: Cursor<Arc<Vec<u8>>>,
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pos = self.cursor.position() as usize;
        let data = self.cursor.get_ref();
        let remaining = data.len().saturating_sub(pos);
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        self.cursor.set_position((pos + n) as u64);
        Ok(n)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.cursor.get_ref().len() as u64)
    }
}

/// Buffers writes and publishes them to the file map on sync.
#[derive(Debug)]
struct MemoryOutput {
    name: String,
    buffer: Vec<u8>,
    files: FileMap,
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.files
            .lock()
            .insert(self.name.clone(), Arc::new(self.buffer.clone()));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush_and_sync()
    }
}

#[derive(Debug)]
struct MemoryLock {
    locked: Arc<AtomicBool>,
}

impl StorageLock for MemoryLock {}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        self.locked.store(false, Ordering::Release);
    }
}
