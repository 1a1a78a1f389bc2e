//! Checksummed binary record files.
//!
//! Layout of every file written by [`StructWriter`]:
//!
//! ```text
//! [u32: MAGIC][u32: FORMAT_VERSION]
//! [record]*                 // u32 / u64 / length-prefixed bytes, little endian
//! [u32: CRC32 of everything above]
//! ```
//!
//! [`StructReader`] loads the whole file and verifies magic, version and
//! checksum before handing out any record, so a torn or truncated write is
//! reported as [`MailIndexError::Corrupt`] instead of being half-parsed.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;

use crate::error::{MailIndexError, Result};
use crate::storage::{StorageInput, StorageOutput};

/// "MIDX" in little endian.
pub const MAGIC: u32 = 0x5844_494D;
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;
const TRAILER_LEN: usize = 4;

/// Writes typed records and seals the file with a checksum on [`close`](Self::close).
#[derive(Debug)]
pub struct StructWriter {
    output: Box<dyn StorageOutput>,
    hasher: Hasher,
    header_written: bool,
}

impl StructWriter {
    pub fn new(output: Box<dyn StorageOutput>) -> Self {
        StructWriter {
            output,
            hasher: Hasher::new(),
            header_written: false,
        }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.header_written {
            self.header_written = true;
            let mut header = Vec::with_capacity(HEADER_LEN);
            header.write_u32::<LittleEndian>(MAGIC)?;
            header.write_u32::<LittleEndian>(FORMAT_VERSION)?;
            self.put(&header)?;
        }
        self.hasher.update(bytes);
        self.output.write_all(bytes)?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.put(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.put(&value.to_le_bytes())
    }

    /// Write a length-prefixed byte string.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let len: u32 = bytes.len().try_into().map_err(|_| {
            MailIndexError::storage(format!("record of {} bytes is too large", bytes.len()))
        })?;
        self.write_u32(len)?;
        self.put(bytes)
    }

    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    /// Append the checksum trailer, then flush and sync the file.
    pub fn close(mut self) -> Result<()> {
        if !self.header_written {
            self.put(&[])?;
        }
        let checksum = self.hasher.clone().finalize();
        self.output.write_u32::<LittleEndian>(checksum)?;
        self.output.close()
    }
}

/// Reads records from a file produced by [`StructWriter`].
#[derive(Debug)]
pub struct StructReader {
    cursor: Cursor<Vec<u8>>,
    end: u64,
}

impl StructReader {
    pub fn new(mut input: Box<dyn StorageInput>) -> Result<Self> {
        let expected = input.size()?;
        let mut data = Vec::with_capacity(expected as usize);
        input.read_to_end(&mut data)?;

        if data.len() < HEADER_LEN + TRAILER_LEN {
            return Err(MailIndexError::corrupt(format!(
                "file too short ({} bytes)",
                data.len()
            )));
        }

        let body_len = data.len() - TRAILER_LEN;
        let mut trailer = &data[body_len..];
        let stored = trailer.read_u32::<LittleEndian>()?;
        let mut hasher = Hasher::new();
        hasher.update(&data[..body_len]);
        let actual = hasher.finalize();
        if stored != actual {
            return Err(MailIndexError::corrupt(format!(
                "checksum mismatch (stored {stored:#010x}, computed {actual:#010x})"
            )));
        }

        let mut cursor = Cursor::new(data);
        let magic = cursor.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(MailIndexError::corrupt(format!("bad magic {magic:#010x}")));
        }
        let version = cursor.read_u32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(MailIndexError::corrupt(format!(
                "unsupported format version {version}"
            )));
        }

        Ok(StructReader {
            cursor,
            end: body_len as u64,
        })
    }

    fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.cursor.position())
    }

    fn ensure(&self, len: u64) -> Result<()> {
        if self.remaining() < len {
            return Err(MailIndexError::corrupt(format!(
                "unexpected end of record: need {len} bytes, {} left",
                self.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.cursor.read_u32::<LittleEndian>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        Ok(self.cursor.read_u64::<LittleEndian>()?)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()? as u64;
        self.ensure(len)?;
        let mut buf = vec![0u8; len as usize];
        self.cursor.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_string(&mut self) -> Result<String> {
        String::from_utf8(self.read_bytes()?)
            .map_err(|e| MailIndexError::corrupt(format!("invalid UTF-8 in record: {e}")))
    }

    /// Whether every record has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use crate::storage::memory::{MemoryStorage, MemoryStorageConfig};

    fn storage() -> MemoryStorage {
        MemoryStorage::new(MemoryStorageConfig::default())
    }

    #[test]
    fn test_records_survive_reopen() {
        let storage = storage();
        let mut writer = StructWriter::new(storage.create_output("f").unwrap());
        writer.write_u32(7).unwrap();
        writer.write_u64(1 << 40).unwrap();
        writer.write_str("héllo").unwrap();
        writer.close().unwrap();

        let mut reader = StructReader::new(storage.open_input("f").unwrap()).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 7);
        assert_eq!(reader.read_u64().unwrap(), 1 << 40);
        assert_eq!(reader.read_string().unwrap(), "héllo");
        assert!(reader.is_exhausted());
        assert!(matches!(reader.read_u32(), Err(MailIndexError::Corrupt(_))));
    }

    #[test]
    fn test_detects_flipped_byte() {
        let storage = storage();
        let mut writer = StructWriter::new(storage.create_output("f").unwrap());
        writer.write_str("payload").unwrap();
        writer.close().unwrap();

        let mut data = Vec::new();
        storage
            .open_input("f")
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        data[HEADER_LEN + 5] ^= 0xFF;
        let mut out = storage.create_output("f").unwrap();
        out.write_all(&data).unwrap();
        out.close().unwrap();

        let err = StructReader::new(storage.open_input("f").unwrap()).unwrap_err();
        assert!(matches!(err, MailIndexError::Corrupt(_)));
    }

    #[test]
    fn test_detects_truncation() {
        let storage = storage();
        let mut out = storage.create_output("f").unwrap();
        out.write_all(&MAGIC.to_le_bytes()).unwrap();
        out.close().unwrap();

        let err = StructReader::new(storage.open_input("f").unwrap()).unwrap_err();
        assert!(matches!(err, MailIndexError::Corrupt(_)));
    }

    #[test]
    fn test_empty_file_is_valid() {
        let storage = storage();
        StructWriter::new(storage.create_output("f").unwrap())
            .close()
            .unwrap();
        let reader = StructReader::new(storage.open_input("f").unwrap()).unwrap();
        assert!(reader.is_exhausted());
    }
}
