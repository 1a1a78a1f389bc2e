//! Directory-backed storage.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::{MailIndexError, Result};
use crate::storage::{Storage, StorageInput, StorageLock, StorageOutput};

const LOCK_FILE: &str = "LOCK";

/// Configuration for [`FileStorage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStorageConfig {
    /// Directory holding the index files. Created if missing.
    pub path: PathBuf,

    /// Whether to fsync files and the directory on commit.
    #[serde(default = "default_sync")]
    pub sync: bool,
}

fn default_sync() -> bool {
    true
}

impl FileStorageConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileStorageConfig {
            path: path.as_ref().to_path_buf(),
            sync: true,
        }
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

/// Storage rooted at a local directory.
#[derive(Debug)]
pub struct FileStorage {
    config: FileStorageConfig,
}

impl FileStorage {
    pub fn new(config: FileStorageConfig) -> Result<Self> {
        fs::create_dir_all(&config.path).map_err(|e| {
            MailIndexError::store_unavailable(format!(
                "cannot create index directory {}: {e}",
                config.path.display()
            ))
        })?;
        if !config.path.is_dir() {
            return Err(MailIndexError::store_unavailable(format!(
                "{} is not a directory",
                config.path.display()
            )));
        }
        Ok(FileStorage { config })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn file_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(MailIndexError::invalid_argument(format!(
                "invalid file name: {name:?}"
            )));
        }
        Ok(self.config.path.join(name))
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> Result<()> {
        if self.config.sync {
            File::open(&self.config.path)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> Result<()> {
        Ok(())
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let path = self.file_path(name)?;
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(Box::new(FileInput {
            reader: io::BufReader::new(file),
            size,
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let path = self.file_path(name)?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Box::new(FileOutput {
            writer: Some(BufWriter::new(file)),
            sync: self.config.sync,
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        let path = self.file_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn rename_file(&self, from: &str, to: &str) -> Result<()> {
        let from_path = self.file_path(from)?;
        let to_path = self.file_path(to)?;
        fs::rename(&from_path, &to_path)?;
        self.sync_directory()
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.config.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && let Some(name) = entry.file_name().to_str()
            {
                files.push(name.to_string());
            }
        }
        files.sort();
        Ok(files)
    }

    fn try_lock(&self) -> Result<Box<dyn StorageLock>> {
        let path = self.file_path(LOCK_FILE)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.try_lock_exclusive().map_err(|e| {
            MailIndexError::store_unavailable(format!(
                "index at {} is locked by another instance: {e}",
                self.config.path.display()
            ))
        })?;
        Ok(Box::new(FileLock { file }))
    }
}

#[derive(Debug)]
struct FileInput {
    reader: io::BufReader<File>,
    size: u64,
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}

#[derive(Debug)]
struct FileOutput {
    writer: Option<BufWriter<File>>,
    sync: bool,
}

impl FileOutput {
    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::other("output already closed"))
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        let sync = self.sync;
        let writer = self.writer()?;
        writer.flush()?;
        if sync {
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.writer.is_some() {
            self.flush_and_sync()?;
            self.writer = None;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct FileLock {
    file: File,
}

impl StorageLock for FileLock {}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("failed to release index lock: {e}");
        }
    }
}
