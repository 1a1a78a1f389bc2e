//! Storage backends for the persisted document store.
//!
//! The index only ever talks to a [`Storage`] trait object, so the same code
//! runs against a directory on disk ([`file::FileStorage`]) or an in-process
//! map ([`memory::MemoryStorage`]) used by tests.

pub mod file;
pub mod memory;
pub mod structured;

use std::fmt::Debug;
use std::io::{Read, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use self::file::{FileStorage, FileStorageConfig};
use self::memory::{MemoryStorage, MemoryStorageConfig};

/// A readable file handle.
pub trait StorageInput: Read + Send + Debug {
    /// Total size of the file in bytes.
    fn size(&self) -> Result<u64>;
}

/// A writable file handle.
///
/// Data is only guaranteed durable once [`StorageOutput::flush_and_sync`]
/// (or [`StorageOutput::close`]) returns.
pub trait StorageOutput: Write + Send + Debug {
    /// Flush buffered data and sync it to the backing medium.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Flush, sync and release the handle.
    fn close(&mut self) -> Result<()>;
}

/// Held while a process owns a store. Dropping it releases ownership.
pub trait StorageLock: Send + Sync + Debug {}

/// Flat namespace of named files.
pub trait Storage: Send + Sync + Debug {
    /// Open an existing file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create (or truncate) a file for writing.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    fn file_exists(&self, name: &str) -> bool;

    fn delete_file(&self, name: &str) -> Result<()>;

    /// Atomically replace `to` with `from`.
    fn rename_file(&self, from: &str, to: &str) -> Result<()>;

    fn list_files(&self) -> Result<Vec<String>>;

    /// Take exclusive ownership of the store.
    ///
    /// Fails with [`MailIndexError::StoreUnavailable`](crate::MailIndexError::StoreUnavailable)
    /// when another owner already holds it.
    fn try_lock(&self) -> Result<Box<dyn StorageLock>>;
}

/// Storage backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageConfig {
    File(FileStorageConfig),
    Memory(MemoryStorageConfig),
}

/// Creates storage backends from a [`StorageConfig`].
pub struct StorageFactory;

impl StorageFactory {
    pub fn create(config: StorageConfig) -> Result<Arc<dyn Storage>> {
        match config {
            StorageConfig::File(file_config) => Ok(Arc::new(FileStorage::new(file_config)?)),
            StorageConfig::Memory(memory_config) => Ok(Arc::new(MemoryStorage::new(memory_config))),
        }
    }
}
