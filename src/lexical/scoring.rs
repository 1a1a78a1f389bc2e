//! BM25 relevance scoring.

use serde::{Deserialize, Serialize};

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f32,
    /// Length normalization, 0.0 (none) to 1.0 (full).
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params { k1: 1.2, b: 0.75 }
    }
}

/// BM25 scorer bound to the statistics of one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Bm25 {
    params: Bm25Params,
    doc_count: f32,
    avg_length: f32,
}

impl Bm25 {
    pub fn new(params: Bm25Params, doc_count: usize, avg_length: f32) -> Self {
        Bm25 {
            params,
            doc_count: doc_count as f32,
            avg_length: if avg_length > 0.0 { avg_length } else { 1.0 },
        }
    }

    /// Inverse document frequency of a term found in `doc_freq` documents.
    ///
    /// Uses the `ln(1 + ...)` form, which stays positive even for terms in
    /// every document, so each matched term always adds to a score.
    pub fn idf(&self, doc_freq: usize) -> f32 {
        let df = doc_freq as f32;
        ((self.doc_count - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Contribution of one term with frequency `tf` to a document of
    /// `doc_length` tokens.
    pub fn score(&self, tf: u32, doc_length: u32, idf: f32) -> f32 {
        if tf == 0 {
            return 0.0;
        }
        let tf = tf as f32;
        let Bm25Params { k1, b } = self.params;
        let norm = 1.0 - b + b * (doc_length as f32 / self.avg_length);
        idf * (tf * (k1 + 1.0)) / (tf + k1 * norm)
    }
}
