use serde::{Deserialize, Serialize};

use crate::types::{EventId, MonthRegionKey, PageTitle, SpatialKey};
use crate::utils::display_title;

/// A resolved, geocoded place.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeoEntity {
    /// Canonical page title of the place (may use underscores as stored).
    pub page_title: PageTitle,
    /// Hybrid geohash of the place.
    #[serde(alias = "geohash4")]
    pub spatial_key: SpatialKey,
}

impl GeoEntity {
    /// Build an entity from a title and key.
    pub fn new(page_title: impl Into<PageTitle>, spatial_key: impl Into<SpatialKey>) -> Self {
        Self {
            page_title: page_title.into(),
            spatial_key: spatial_key.into(),
        }
    }

    /// Page title with underscores replaced by spaces.
    pub fn display_title(&self) -> PageTitle {
        display_title(&self.page_title)
    }
}

/// One place resolution, flagged when the source text marked it uncertain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPlace {
    /// Resolved place.
    pub entity: GeoEntity,
    /// The source text ended with `?`.
    pub is_guess: bool,
}

/// Event as extracted from article text. All fields are free text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    /// Date expression, e.g. `1843-07` or `1815/1852`.
    pub when: String,
    /// Most specific place mentioned.
    #[serde(rename = "where")]
    pub where_: String,
    /// Enclosing city.
    pub city: String,
    /// One-sentence summary.
    pub what: String,
    /// Pipe-delimited participants.
    pub who: String,
    /// Article section the event was found in.
    pub section: String,
}

/// Infobox-derived event whose places are already geocoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoboxEvent {
    /// Precomputed event id.
    pub event_id: EventId,
    /// Page whose infobox the event came from.
    pub page_title: PageTitle,
    /// Date expression; blank means the infobox had no usable date.
    pub date: String,
    /// Infobox field the event came from, e.g. `birth` or `death`.
    pub event_type: String,
    /// Geocoded places of the event.
    #[serde(default, alias = "place")]
    pub places: Vec<GeoEntity>,
    /// Canonical titles of other people involved.
    #[serde(default)]
    pub people: Vec<PageTitle>,
}

/// Persisted row of the `events` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// `{page title with underscores}_{index:03}`.
    pub event_id: EventId,
    /// Source page.
    pub page_title: PageTitle,
    /// Section of the source page.
    pub page_section: String,
    /// Original date expression.
    pub when: String,
    /// Event summary.
    pub summary: String,
    /// `where`, plus `, {city}` when `where` does not mention the city.
    pub location: String,
    /// First day, `YYYY-MM-DD`.
    pub start_date: String,
    /// Last day, `YYYY-MM-DD`.
    pub end_date: String,
    /// Category label.
    pub category: String,
    /// Pipe-joined resolved names; unresolved names keep their ` (?)` marker.
    pub people: String,
    /// Pipe-joined titles resolved from `where`.
    pub where_page_title: String,
    /// Any `where` resolution was a guess.
    pub where_is_guess: bool,
    /// Pipe-joined titles resolved from `city`.
    pub city_page_title: String,
    /// Any `city` resolution was a guess.
    pub city_is_guess: bool,
    /// Pipe-joined distinct spatial keys.
    pub geohash: String,
}

/// Persisted row of the `month_region` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRegionRecord {
    /// `{year}-{month or blank}-{region char}`.
    pub month_region: MonthRegionKey,
    /// Indexed event.
    pub event_id: EventId,
    /// Full spatial key of the place.
    pub spatial_key: SpatialKey,
    /// First day of the event.
    pub start_date: String,
    /// Last day of the event.
    pub end_date: String,
}

/// Persisted row of the `page_year` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageYearRecord {
    /// Participant page.
    pub page_title: PageTitle,
    /// Calendar year (negative for BCE).
    pub year: i32,
    /// Indexed event.
    pub event_id: EventId,
}
