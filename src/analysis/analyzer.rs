//! Analyzer trait and the standard word analyzer.

use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Splits text into normalized terms.
pub trait Analyzer: Send + Sync + std::fmt::Debug {
    /// Produce the terms of `text`, in order, including repeats.
    fn analyze(&self, text: &str) -> Vec<String>;

    /// Name of this analyzer (for logging).
    fn name(&self) -> &'static str;

    /// Term frequencies over all `fields`, plus the total token count.
    fn term_frequencies(&self, fields: &[&str]) -> (BTreeMap<String, u32>, u32) {
        let mut counts: AHashMap<String, u32> = AHashMap::new();
        let mut length = 0u32;
        for field in fields {
            for term in self.analyze(field) {
                length = length.saturating_add(1);
                *counts.entry(term).or_insert(0) += 1;
            }
        }
        (counts.into_iter().collect(), length)
    }
}

/// Settings for [`StandardAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Lowercase every term.
    pub lowercase: bool,

    /// Apply Unicode NFKC normalization before splitting.
    pub normalize: bool,

    /// Terms shorter than this (in chars) are dropped.
    pub min_token_length: usize,

    /// Terms longer than this (in chars) are dropped. Long runs are usually
    /// base64 blobs or URLs that nobody searches for.
    pub max_token_length: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            lowercase: true,
            normalize: true,
            min_token_length: 1,
            max_token_length: 64,
        }
    }
}

/// Unicode word-boundary analyzer (UAX #29) with optional NFKC folding
/// and lowercasing.
#[derive(Debug, Clone, Default)]
pub struct StandardAnalyzer {
    config: AnalyzerConfig,
}

impl StandardAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AnalyzerConfig) -> Self {
        StandardAnalyzer { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<String> {
        let normalized: String;
        let text = if self.config.normalize {
            normalized = text.nfkc().collect();
            normalized.as_str()
        } else {
            text
        };

        text.unicode_words()
            .map(|word| {
                if self.config.lowercase {
                    word.to_lowercase()
                } else {
                    word.to_string()
                }
            })
            .filter(|term| {
                let len = term.chars().count();
                len >= self.config.min_token_length && len <= self.config.max_token_length
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}
