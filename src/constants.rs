/// Constants used by the hybrid spatial key codec.
pub mod geohash {
    /// Base-32 alphabet for the leading character (`a`, `i`, `l`, `o` excluded).
    pub const BASE32_ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";
    /// Bit masks for the five bits of the leading character, most significant first.
    pub const BASE32_BITS: [u8; 5] = [16, 8, 4, 2, 1];
    /// Latitude range covered by an empty key.
    pub const LAT_RANGE: (f64, f64) = (-90.0, 90.0);
    /// Longitude range covered by an empty key.
    pub const LON_RANGE: (f64, f64) = (-180.0, 180.0);
}

/// Constants used by place and person resolution.
pub mod resolver {
    /// Default capacity of the memoized geodata lookup.
    pub const DEFAULT_GEOCODE_CACHE_CAPACITY: usize = 1000;
    /// Free-text place value meaning "no place known" (compared case-insensitively).
    pub const UNKNOWN_PLACE: &str = "unknown";
    /// Separator between alternative places or people.
    pub const ALTERNATIVES_SEPARATOR: char = '|';
    /// Trailing marker flagging an uncertain place.
    pub const GUESS_MARKER: char = '?';
    /// Suffix appended to a place name when retrying as a city.
    pub const CITY_SUFFIX: &str = " (City)";
    /// Suffix marking a person name with no canonical page.
    pub const UNRESOLVED_MARKER: &str = " (?)";
    /// Link targets with these prefixes never identify a place or person.
    pub const NON_ENTITY_PREFIXES: [&str; 2] = ["Category:", "List of"];
}

/// Constants used by the event indexer.
pub mod indexer {
    /// `when` values that mean "no date" (compared case-insensitively).
    pub const DATE_SENTINELS: [&str; 4] = ["unknown", "n/a", "yyyy", "none"];
    /// Zero-padding width for the per-page event index inside an event id.
    pub const EVENT_INDEX_WIDTH: usize = 3;
    /// Separator used when joining multi-valued record fields.
    pub const FIELD_JOIN: &str = "|";
    /// Output table holding one row per event.
    pub const EVENTS_TABLE: &str = "events";
    /// Output table keyed by year, month, and region character.
    pub const MONTH_REGION_TABLE: &str = "month_region";
    /// Output table keyed by participant page and year.
    pub const PAGE_YEAR_TABLE: &str = "page_year";
}

/// Constants used by lookup tables.
pub mod lookup {
    /// Table name reported for the redirect index.
    pub const REDIRECTS_TABLE: &str = "redirects";
    /// Table name reported for the geodata index.
    pub const GEODATA_TABLE: &str = "geodata";
    /// Table name reported for compressed per-page link graphs.
    pub const PAGE_LINKS_TABLE: &str = "page_links";
    /// Table name reported for per-page event lists.
    pub const PAGE_EVENTS_TABLE: &str = "page_events";
    /// SQLite table backing a file-based key/value lookup.
    pub const SQLITE_KV_TABLE: &str = "kv";
}

/// Constants used by batch persistence.
pub mod persistence {
    /// Default number of buffered records that triggers a flush once exceeded.
    pub const DEFAULT_BATCH_SIZE: usize = 10_000;
    /// Maximum length of inferred text columns.
    pub const TEXT_COLUMN_LENGTH: usize = 100;
    /// Name of the full-text search table built over a base table.
    pub const TEXT_SEARCH_TABLE: &str = "text_search";
    /// Minimum prefix length indexed by the full-text search table.
    pub const TEXT_SEARCH_PREFIX: usize = 4;
    /// Extension of offloaded large-value side files.
    pub const SIDE_FILE_EXTENSION: &str = "dat";
    /// URL scheme used in offloaded value references.
    pub const SIDE_FILE_SCHEME: &str = "file:";
}
