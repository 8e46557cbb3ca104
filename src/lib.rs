#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Bounded least-recently-used cache.
pub mod cache;
/// Event category classifier.
pub mod category;
/// Resolver and batch writer configuration types.
pub mod config;
/// Centralized constants used across the codec, resolver, indexer and persistence.
pub mod constants;
/// Input events, resolved places and output record types.
pub mod data;
/// Date ranges, the date parser seam and month bucketing.
pub mod dates;
/// Hybrid spatial key codec.
pub mod geohash;
/// Event indexing into output records.
pub mod indexer;
/// Per-page link graphs.
pub mod link_graph;
/// Lookup tables and their typed wrappers.
pub mod lookup;
/// Batch writers and table stores.
pub mod persistence;
/// Place and person resolution.
pub mod resolver;
/// Shared type aliases.
pub mod types;
/// Text helpers.
pub mod utils;

mod errors;

pub use cache::{BoundedCache, CacheStats};
pub use category::{Category, classify};
pub use config::{BatchWriterConfig, PlaceStrategy, ResolverConfig, UnloadingConfig};
pub use data::{
    EventRecord, GeoEntity, InfoboxEvent, MonthRegionRecord, PageYearRecord, RawEvent,
    ResolvedPlace,
};
pub use dates::{DateRange, DateRangeParser, StructuredDateParser, year_months};
pub use errors::IndexerError;
pub use geohash::{BoundingBox, decode_hybrid, encode_hybrid};
pub use indexer::{EventIndexer, IndexSinks, IndexingReport, PageContext};
pub use link_graph::{LinkGraph, LinkTarget};
pub use lookup::{
    GeodataStore, InMemoryLookup, KeyValueLookup, LinkGraphStore, PageEventsStore, PageIndex,
    RedirectIndex, SqliteLookup, encode_link_graph, encode_page_events,
};
pub use persistence::{
    BatchWriter, ColumnType, FieldValue, Record, RecordSink, SqliteTableStore, TableSchema,
    TableStore,
};
pub use resolver::{DisambiguationDict, EntityResolver, is_unresolved};
pub use types::{
    AnchorText, EventId, FieldName, MonthRegionKey, PageTitle, SpatialKey, TableName, YearMonth,
};
