//! Segment files.
//!
//! A segment records one commit: the ids it removed and the analyzed
//! documents it upserted. A *full* segment instead holds every document of a
//! snapshot and makes all earlier segments redundant.
//!
//! Record layout inside the [`StructWriter`] envelope:
//!
//! ```text
//! [u64: generation][u32: full (0|1)]
//! [u32: removal_count] [str: doc_id] * removal_count
//! [u32: doc_count]
//!   ([str: doc_id][u32: length][u32: term_count] ([str: term][u32: tf]) * term_count) * doc_count
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MailIndexError, Result};
use crate::lexical::posting::IndexedDocument;
use crate::storage::Storage;
use crate::storage::structured::{StructReader, StructWriter};

const SEGMENT_PREFIX: &str = "segment_";
const SEGMENT_SUFFIX: &str = ".seg";

/// Manifest entry describing one segment file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub id: u32,
    /// Generation of the commit that wrote the segment.
    pub generation: u64,
    pub doc_count: usize,
    pub removal_count: usize,
    /// Whether the segment holds a complete snapshot.
    pub full: bool,
}

impl SegmentMeta {
    pub fn file_name(&self) -> String {
        segment_file_name(self.id)
    }
}

pub fn segment_file_name(id: u32) -> String {
    format!("{SEGMENT_PREFIX}{id:06}{SEGMENT_SUFFIX}")
}

/// Segment id encoded in `name`, if it names a segment file.
pub fn parse_segment_file_name(name: &str) -> Option<u32> {
    name.strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?
        .parse()
        .ok()
}

/// Decoded contents of a segment.
#[derive(Debug, Default)]
pub struct SegmentData {
    pub generation: u64,
    pub full: bool,
    pub removals: Vec<String>,
    pub documents: Vec<Arc<IndexedDocument>>,
}

fn count_u32(count: usize, what: &str) -> Result<u32> {
    count
        .try_into()
        .map_err(|_| MailIndexError::storage(format!("{what} count {count} exceeds u32::MAX")))
}

/// Writer for segment files.
#[derive(Debug)]
pub struct SegmentWriter {
    storage: Arc<dyn Storage>,
}

impl SegmentWriter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Write and sync segment `id`. Documents are stored in the given order.
    pub fn write_segment(
        &self,
        id: u32,
        generation: u64,
        full: bool,
        removals: &[&str],
        documents: &[&IndexedDocument],
    ) -> Result<SegmentMeta> {
        let meta = SegmentMeta {
            id,
            generation,
            doc_count: documents.len(),
            removal_count: removals.len(),
            full,
        };

        let output = self.storage.create_output(&meta.file_name())?;
        let mut writer = StructWriter::new(output);

        writer.write_u64(generation)?;
        writer.write_u32(u32::from(full))?;

        writer.write_u32(count_u32(removals.len(), "removal")?)?;
        for doc_id in removals {
            writer.write_str(doc_id)?;
        }

        writer.write_u32(count_u32(documents.len(), "document")?)?;
        for doc in documents {
            writer.write_str(&doc.id)?;
            writer.write_u32(doc.length)?;
            writer.write_u32(count_u32(doc.terms.len(), "term")?)?;
            for (term, tf) in &doc.terms {
                writer.write_str(term)?;
                writer.write_u32(*tf)?;
            }
        }

        writer.close()?;
        Ok(meta)
    }
}

/// Reader for one segment file.
#[derive(Debug)]
pub struct SegmentReader {
    storage: Arc<dyn Storage>,
    meta: SegmentMeta,
}

impl SegmentReader {
    pub fn new(storage: Arc<dyn Storage>, meta: SegmentMeta) -> Self {
        Self { storage, meta }
    }

    /// Load the segment and check it against its manifest entry.
    pub fn read(&self) -> Result<SegmentData> {
        let name = self.meta.file_name();
        let input = self.storage.open_input(&name)?;
        let mut reader = StructReader::new(input)?;

        let generation = reader.read_u64()?;
        let full = match reader.read_u32()? {
            0 => false,
            1 => true,
            other => {
                return Err(MailIndexError::corrupt(format!(
                    "{name}: invalid segment kind {other}"
                )));
            }
        };

        let removal_count = reader.read_u32()? as usize;
        let mut removals = Vec::with_capacity(removal_count.min(1024));
        for _ in 0..removal_count {
            removals.push(reader.read_string()?);
        }

        let doc_count = reader.read_u32()? as usize;
        let mut documents = Vec::with_capacity(doc_count.min(1024));
        for _ in 0..doc_count {
            let id = reader.read_string()?;
            if id.is_empty() {
                return Err(MailIndexError::corrupt(format!("{name}: empty document id")));
            }
            let length = reader.read_u32()?;
            let term_count = reader.read_u32()?;
            let mut terms = BTreeMap::new();
            for _ in 0..term_count {
                let term = reader.read_string()?;
                let tf = reader.read_u32()?;
                terms.insert(term, tf);
            }
            documents.push(Arc::new(IndexedDocument::new(id, terms, length)));
        }

        if !reader.is_exhausted() {
            return Err(MailIndexError::corrupt(format!("{name}: trailing data")));
        }
        if generation != self.meta.generation
            || full != self.meta.full
            || documents.len() != self.meta.doc_count
            || removals.len() != self.meta.removal_count
        {
            return Err(MailIndexError::corrupt(format!(
                "{name}: contents do not match the manifest entry"
            )));
        }

        Ok(SegmentData {
            generation,
            full,
            removals,
            documents,
        })
    }
}
