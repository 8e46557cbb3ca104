use std::path::PathBuf;

use crate::constants::persistence::DEFAULT_BATCH_SIZE;
use crate::constants::resolver::DEFAULT_GEOCODE_CACHE_CAPACITY;
use crate::types::{FieldName, TableName};

/// One step of the place resolution chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaceStrategy {
    /// Follow the page's link graph to a single target title, then geocode it.
    LinkGraph,
    /// Geocode the text itself.
    Literal,
    /// Follow the redirect index, then geocode the target.
    Redirect,
    /// Re-run the chain on the text before the first comma.
    CommaPrefix,
    /// Re-run the chain with ` (City)` appended.
    CitySuffix,
}

impl PlaceStrategy {
    /// Chain order used by [`ResolverConfig::default`].
    pub const DEFAULT_ORDER: [PlaceStrategy; 5] = [
        PlaceStrategy::LinkGraph,
        PlaceStrategy::Literal,
        PlaceStrategy::Redirect,
        PlaceStrategy::CommaPrefix,
        PlaceStrategy::CitySuffix,
    ];
}

/// Entity resolver configuration.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Capacity of the memoized geocode lookup (0 disables memoization).
    pub cache_capacity: usize,
    /// Strategies tried in order for each place string; first success wins.
    pub place_strategies: Vec<PlaceStrategy>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_GEOCODE_CACHE_CAPACITY,
            place_strategies: PlaceStrategy::DEFAULT_ORDER.to_vec(),
        }
    }
}

impl ResolverConfig {
    /// Override the geocode cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Replace the place strategy chain.
    pub fn with_place_strategies(mut self, strategies: impl Into<Vec<PlaceStrategy>>) -> Self {
        self.place_strategies = strategies.into();
        self
    }
}

/// Large-value offload settings for a batch writer.
#[derive(Clone, Debug)]
pub struct UnloadingConfig {
    /// Fields longer than this are written to side files (characters for text,
    /// bytes for byte values).
    pub threshold: usize,
    /// Directory receiving side files. Created when the writer is built.
    pub dir: PathBuf,
    /// Path prefix used in the `file:` reference stored in place of the value.
    pub serving_path: String,
}

impl UnloadingConfig {
    /// Offload values longer than `threshold` into `dir`, referenced under `serving_path`.
    pub fn new(threshold: usize, dir: impl Into<PathBuf>, serving_path: impl Into<String>) -> Self {
        Self {
            threshold,
            dir: dir.into(),
            serving_path: serving_path.into(),
        }
    }
}

/// Per-table batch writer configuration.
#[derive(Clone, Debug)]
pub struct BatchWriterConfig {
    /// Destination table.
    pub table: TableName,
    /// Column used for the secondary index and as the side-file record id.
    pub index_key: Option<FieldName>,
    /// Columns covered by the full-text index.
    pub text_indexed_fields: Vec<FieldName>,
    /// A flush runs once more than this many records are buffered.
    pub batch_size: usize,
    /// Optional large-value offload.
    pub unloading: Option<UnloadingConfig>,
}

impl BatchWriterConfig {
    /// Defaults for `table`: no index key, no text index, no offload.
    pub fn new(table: impl Into<TableName>) -> Self {
        Self {
            table: table.into(),
            index_key: None,
            text_indexed_fields: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            unloading: None,
        }
    }

    /// Set the index key column.
    pub fn with_index_key(mut self, key: impl Into<FieldName>) -> Self {
        self.index_key = Some(key.into());
        self
    }

    /// Set the columns covered by the full-text index.
    pub fn with_text_indexed_fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FieldName>,
    {
        self.text_indexed_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the flush threshold.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable large-value offload.
    pub fn with_unloading(mut self, unloading: UnloadingConfig) -> Self {
        self.unloading = Some(unloading);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_defaults_follow_documented_chain() {
        let config = ResolverConfig::default();
        assert_eq!(config.cache_capacity, 1000);
        assert_eq!(config.place_strategies, PlaceStrategy::DEFAULT_ORDER.to_vec());
        let trimmed = config.with_place_strategies([PlaceStrategy::Literal]);
        assert_eq!(trimmed.place_strategies, vec![PlaceStrategy::Literal]);
    }

    #[test]
    fn batch_writer_builder_sets_fields() {
        let config = BatchWriterConfig::new("events")
            .with_index_key("event_id")
            .with_text_indexed_fields(["summary", "location"])
            .with_batch_size(5);
        assert_eq!(config.table, "events");
        assert_eq!(config.index_key.as_deref(), Some("event_id"));
        assert_eq!(config.text_indexed_fields, vec!["summary", "location"]);
        assert_eq!(config.batch_size, 5);
        assert!(config.unloading.is_none());
        assert_eq!(BatchWriterConfig::new("t").batch_size, DEFAULT_BATCH_SIZE);
    }
}
