/// Canonical encyclopedia page title (spaces, not underscores).
/// Example: `Ada Lovelace`
pub type PageTitle = String;
/// Hybrid geohash: one base-32 character followed by base-4 quadtree digits.
/// Examples: `u`, `s05`, `u09tv`
pub type SpatialKey = String;
/// Stable per-page event identifier.
/// Example: `Ada_Lovelace_004`
pub type EventId = String;
/// Raw anchor text found inline in a page.
/// Examples: `Paris`, `the capital`
pub type AnchorText = String;
/// Logical table name used by lookups and batch writers.
/// Examples: `events`, `month_region`, `redirects`
pub type TableName = String;
/// Column name inside a persisted record.
/// Examples: `event_id`, `summary`
pub type FieldName = String;
/// Composite month/region index key.
/// Examples: `1843-7-u`, `1843--u`
pub type MonthRegionKey = String;
/// Year paired with an optional month, `None` meaning the whole year.
/// Examples: `(1843, Some(7))`, `(1844, None)`
pub type YearMonth = (i32, Option<u32>);
