use serde::{Deserialize, Serialize};

use crate::analysis::AnalyzerConfig;
use crate::error::{MailIndexError, Result};
use crate::lexical::scoring::Bm25Params;

/// Default upper bound on live segments before a commit compacts.
pub const DEFAULT_MAX_SEGMENTS: usize = 8;

/// Default cap on dictionary terms one `prefix*` query word expands to.
pub const DEFAULT_MAX_PREFIX_EXPANSIONS: usize = 128;

/// Configuration for a [`SearchEngine`](crate::SearchEngine).
///
/// The analyzer settings are not stored with the index; reopening an index
/// with different settings leaves previously indexed terms as they were.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Tokenization applied to both documents and queries.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub bm25: Bm25Params,
    /// Live segments allowed before the next commit compacts them into one.
    #[serde(default = "default_max_segments")]
    pub max_segments: usize,
    #[serde(default = "default_max_prefix_expansions")]
    pub max_prefix_expansions: usize,
}

fn default_max_segments() -> usize {
    DEFAULT_MAX_SEGMENTS
}

fn default_max_prefix_expansions() -> usize {
    DEFAULT_MAX_PREFIX_EXPANSIONS
}

impl IndexConfig {
    pub fn new() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            bm25: Bm25Params::default(),
            max_segments: DEFAULT_MAX_SEGMENTS,
            max_prefix_expansions: DEFAULT_MAX_PREFIX_EXPANSIONS,
        }
    }

    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_segments == 0 {
            return Err(MailIndexError::invalid_argument(
                "max_segments must be at least 1",
            ));
        }
        if self.max_prefix_expansions == 0 {
            return Err(MailIndexError::invalid_argument(
                "max_prefix_expansions must be at least 1",
            ));
        }
        let AnalyzerConfig {
            min_token_length,
            max_token_length,
            ..
        } = self.analyzer;
        if min_token_length == 0 || min_token_length > max_token_length {
            return Err(MailIndexError::invalid_argument(format!(
                "invalid token length range {min_token_length}..={max_token_length}"
            )));
        }
        let Bm25Params { k1, b } = self.bm25;
        if !(k1.is_finite() && k1 >= 0.0) || !(0.0..=1.0).contains(&b) {
            return Err(MailIndexError::invalid_argument(format!(
                "invalid BM25 parameters k1={k1}, b={b}"
            )));
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct IndexConfigBuilder {
    config: IndexConfig,
}

impl IndexConfigBuilder {
    pub fn analyzer(mut self, analyzer: AnalyzerConfig) -> Self {
        self.config.analyzer = analyzer;
        self
    }

    pub fn bm25(mut self, params: Bm25Params) -> Self {
        self.config.bm25 = params;
        self
    }

    pub fn max_segments(mut self, max_segments: usize) -> Self {
        self.config.max_segments = max_segments;
        self
    }

    pub fn max_prefix_expansions(mut self, max: usize) -> Self {
        self.config.max_prefix_expansions = max;
        self
    }

    pub fn build(self) -> IndexConfig {
        self.config
    }
}
