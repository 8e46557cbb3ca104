//! Turns extracted page events into geocoded, time-indexed output records.
//!
//! Each surviving event produces one [`EventRecord`], one [`MonthRegionRecord`]
//! per month bucket and spatial key, and one [`PageYearRecord`] per year and
//! participant page. Events that cannot be dated or located are counted in the
//! [`IndexingReport`] and skipped; lookup or sink failures abort the page.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::category::classify;
use crate::constants::indexer::DATE_SENTINELS;
use crate::constants::resolver::ALTERNATIVES_SEPARATOR;
use crate::data::{
    EventRecord, InfoboxEvent, MonthRegionRecord, PageYearRecord, RawEvent, ResolvedPlace,
};
use crate::dates::{DateRange, DateRangeParser, year_months};
use crate::errors::IndexerError;
use crate::geohash::region_char;
use crate::link_graph::LinkGraph;
use crate::lookup::{LinkGraphStore, PageEventsStore};
use crate::persistence::{Record, RecordSink};
use crate::resolver::{EntityResolver, is_unresolved};
use crate::types::{EventId, PageTitle, SpatialKey};
use crate::utils::{
    dedup_in_order, display_title, event_id, join_fields, normalize_inline_whitespace,
};

/// Output sinks for the three record kinds.
pub struct IndexSinks<'a> {
    /// Receives [`EventRecord`]s.
    pub events: &'a mut dyn RecordSink,
    /// Receives [`MonthRegionRecord`]s.
    pub month_region: &'a mut dyn RecordSink,
    /// Receives [`PageYearRecord`]s.
    pub page_year: &'a mut dyn RecordSink,
}

/// Counters and per-event problems collected while indexing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexingReport {
    /// Events seen, including skipped ones.
    pub total_events: u64,
    /// Events dropped because `when` was a placeholder such as `unknown`.
    pub skipped_sentinel: u64,
    /// Events that resolved to at least one location.
    pub events_with_location: u64,
    /// Events dropped because their date could not be used.
    pub errored_events: u64,
    /// Rows sent to the events sink.
    pub event_records: u64,
    /// Rows sent to the month/region sink.
    pub month_region_records: u64,
    /// Rows sent to the page/year sink.
    pub page_year_records: u64,
    /// `(when, error)` for every unparseable date.
    pub date_errors: Vec<(String, String)>,
    /// `where: ...` / `city: ...` texts of events with no location.
    pub no_location: Vec<String>,
    /// Emitted events per category label.
    pub categories: BTreeMap<String, u64>,
}

impl IndexingReport {
    /// Fold `other` into this report.
    pub fn merge(&mut self, other: IndexingReport) {
        self.total_events += other.total_events;
        self.skipped_sentinel += other.skipped_sentinel;
        self.events_with_location += other.events_with_location;
        self.errored_events += other.errored_events;
        self.event_records += other.event_records;
        self.month_region_records += other.month_region_records;
        self.page_year_records += other.page_year_records;
        self.date_errors.extend(other.date_errors);
        self.no_location.extend(other.no_location);
        for (category, count) in other.categories {
            *self.categories.entry(category).or_default() += count;
        }
    }
}

/// Per-page state shared by every event of the page.
#[derive(Clone, Debug)]
pub struct PageContext {
    /// Source page title.
    pub title: PageTitle,
    /// The page's link graph.
    pub links: LinkGraph,
    /// The page title resolved as a place, used when an event has no location.
    pub location: Vec<ResolvedPlace>,
}

/// Where an event happened and who took part.
struct Placement<'a> {
    where_places: &'a [ResolvedPlace],
    city_places: &'a [ResolvedPlace],
    people: &'a [String],
}

/// Indexes events of pages into output sinks.
pub struct EventIndexer {
    resolver: EntityResolver,
    link_graphs: LinkGraphStore,
    date_parser: Box<dyn DateRangeParser>,
}

impl EventIndexer {
    /// Build an indexer over a resolver, the link graph table and a date parser.
    pub fn new(
        resolver: EntityResolver,
        link_graphs: LinkGraphStore,
        date_parser: Box<dyn DateRangeParser>,
    ) -> Self {
        Self {
            resolver,
            link_graphs,
            date_parser,
        }
    }

    /// The resolver used for places and people.
    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    /// Load the page's link graph and resolve the page title as a place.
    ///
    /// Fails with `MissingLinkGraph` when the page has no stored link graph.
    pub fn page_context(&self, page_title: &str) -> Result<PageContext, IndexerError> {
        let links = self.link_graphs.load(page_title)?;
        let location = self.resolver.resolve_place(page_title, &links)?;
        Ok(PageContext {
            title: page_title.to_string(),
            links,
            location,
        })
    }

    /// Index every event of a page, numbering them by position.
    pub fn process_page(
        &self,
        page_title: &str,
        events: &[RawEvent],
        sinks: &mut IndexSinks<'_>,
        report: &mut IndexingReport,
    ) -> Result<(), IndexerError> {
        let page = self.page_context(page_title)?;
        for (index, event) in events.iter().enumerate() {
            self.process_event(event, &page, index, sinks, report)?;
        }
        debug!(page = page_title, events = events.len(), "indexed page");
        Ok(())
    }

    /// Index a page whose events live in `events_store`.
    ///
    /// Returns `Ok(false)` when the store has no event list for the page.
    pub fn process_stored_page(
        &self,
        page_title: &str,
        events_store: &PageEventsStore,
        sinks: &mut IndexSinks<'_>,
        report: &mut IndexingReport,
    ) -> Result<bool, IndexerError> {
        let Some(events) = events_store.events(page_title)? else {
            debug!(page = page_title, "no stored events");
            return Ok(false);
        };
        self.process_page(page_title, &events, sinks, report)?;
        Ok(true)
    }

    /// Index one event. Returns `Ok(true)` when records were emitted.
    pub fn process_event(
        &self,
        event: &RawEvent,
        page: &PageContext,
        index: usize,
        sinks: &mut IndexSinks<'_>,
        report: &mut IndexingReport,
    ) -> Result<bool, IndexerError> {
        report.total_events += 1;
        let when = event.when.trim();
        if DATE_SENTINELS
            .iter()
            .any(|sentinel| when.eq_ignore_ascii_case(sentinel))
        {
            report.skipped_sentinel += 1;
            return Ok(false);
        }

        let event_id = event_id(&page.title, index);
        let category = classify(&event.what);
        let range = match self.date_parser.parse(&event.when) {
            Ok(range) => range,
            Err(err) => {
                warn!(
                    event_id = %event_id,
                    when = %event.when,
                    error = %err,
                    "unparseable event date"
                );
                report.errored_events += 1;
                report.date_errors.push((event.when.clone(), err.to_string()));
                return Ok(false);
            }
        };

        let mut people = Vec::new();
        for name in event.who.split(ALTERNATIVES_SEPARATOR) {
            let name = normalize_inline_whitespace(name);
            if !name.is_empty() {
                people.push(self.resolver.resolve_person(&name, &page.links)?);
            }
        }
        let people = dedup_in_order(people);

        let mut where_places = self.resolver.resolve_place(&event.where_, &page.links)?;
        let city_places = self.resolver.resolve_place(&event.city, &page.links)?;
        if where_places.is_empty() && city_places.is_empty() {
            if page.location.is_empty() {
                debug!(
                    event_id = %event_id,
                    place = %event.where_,
                    city = %event.city,
                    "dropping event without location"
                );
                report.no_location.push(format!("where: {}", event.where_));
                report.no_location.push(format!("city: {}", event.city));
                return Ok(false);
            }
            where_places = page.location.clone();
        }
        report.events_with_location += 1;

        let placement = Placement {
            where_places: &where_places,
            city_places: &city_places,
            people: &people,
        };
        let geolocations = if where_places.is_empty() {
            &city_places
        } else {
            &where_places
        };
        let spatial_keys = distinct_spatial_keys(geolocations);
        emit_fanout(&event_id, &page.title, &range, &spatial_keys, &placement, sinks, report)?;

        let record = EventRecord {
            event_id,
            page_title: page.title.clone(),
            page_section: event.section.clone(),
            when: event.when.clone(),
            summary: event.what.clone(),
            location: location_label(&event.where_, &event.city),
            start_date: range.start.to_string(),
            end_date: range.end.to_string(),
            category: category.as_str().to_string(),
            people: join_fields(&people),
            where_page_title: join_fields(&distinct_titles(&where_places)),
            where_is_guess: where_places.iter().any(|place| place.is_guess),
            city_page_title: join_fields(&distinct_titles(&city_places)),
            city_is_guess: city_places.iter().any(|place| place.is_guess),
            geohash: join_fields(&spatial_keys),
        };
        emit(sinks.events, &record)?;
        report.event_records += 1;
        count_category(report, category.as_str());
        Ok(true)
    }

    /// Index an infobox event whose places are already geocoded.
    ///
    /// Events with a blank date are counted as errored and skipped. A date that
    /// is present but unparseable is returned as an error.
    pub fn process_infobox_event(
        &self,
        event: &InfoboxEvent,
        sinks: &mut IndexSinks<'_>,
        report: &mut IndexingReport,
    ) -> Result<bool, IndexerError> {
        report.total_events += 1;
        if event.date.trim().is_empty() {
            report.errored_events += 1;
            debug!(event_id = %event.event_id, "infobox event without date");
            return Ok(false);
        }
        let range = self.date_parser.parse(&event.date)?;

        let places: Vec<ResolvedPlace> = event
            .places
            .iter()
            .map(|entity| ResolvedPlace {
                entity: entity.clone(),
                is_guess: false,
            })
            .collect();
        let people = dedup_in_order(event.people.iter().cloned());
        let placement = Placement {
            where_places: &places,
            city_places: &[],
            people: &people,
        };
        let spatial_keys = distinct_spatial_keys(&places);
        emit_fanout(
            &event.event_id,
            &event.page_title,
            &range,
            &spatial_keys,
            &placement,
            sinks,
            report,
        )?;

        let place_titles = join_fields(&distinct_titles(&places));
        let record = EventRecord {
            event_id: event.event_id.clone(),
            page_title: event.page_title.clone(),
            page_section: String::new(),
            when: event.date.clone(),
            summary: event.event_type.clone(),
            location: place_titles.clone(),
            start_date: range.start.to_string(),
            end_date: range.end.to_string(),
            category: event.event_type.clone(),
            people: join_fields(&people),
            where_page_title: place_titles,
            where_is_guess: false,
            city_page_title: String::new(),
            city_is_guess: false,
            geohash: join_fields(&spatial_keys),
        };
        emit(sinks.events, &record)?;
        report.event_records += 1;
        count_category(report, &event.event_type);
        Ok(true)
    }
}

/// Emit month/region and page/year records for one event.
fn emit_fanout(
    event_id: &EventId,
    page_title: &str,
    range: &DateRange,
    spatial_keys: &[SpatialKey],
    placement: &Placement<'_>,
    sinks: &mut IndexSinks<'_>,
    report: &mut IndexingReport,
) -> Result<(), IndexerError> {
    let start_date = range.start.to_string();
    let end_date = range.end.to_string();
    for (year, month) in year_months(range) {
        let month = month.map(|m| m.to_string()).unwrap_or_default();
        for key in spatial_keys {
            let Some(region) = region_char(key) else {
                continue;
            };
            let record = MonthRegionRecord {
                month_region: format!("{year}-{month}-{region}"),
                event_id: event_id.clone(),
                spatial_key: key.clone(),
                start_date: start_date.clone(),
                end_date: end_date.clone(),
            };
            emit(sinks.month_region, &record)?;
            report.month_region_records += 1;
        }
    }

    let participants = participants(page_title, placement);
    for year in range.years() {
        for participant in &participants {
            let record = PageYearRecord {
                page_title: participant.clone(),
                year,
                event_id: event_id.clone(),
            };
            emit(sinks.page_year, &record)?;
            report.page_year_records += 1;
        }
    }
    Ok(())
}

/// `where` when it already mentions the city, otherwise `"{where}, {city}"`.
fn location_label(place: &str, city: &str) -> String {
    if place.contains(city) {
        place.to_string()
    } else {
        format!("{place}, {city}")
    }
}

fn distinct_titles(places: &[ResolvedPlace]) -> Vec<PageTitle> {
    dedup_in_order(
        places
            .iter()
            .map(|place| place.entity.display_title()),
    )
}

fn distinct_spatial_keys(places: &[ResolvedPlace]) -> Vec<SpatialKey> {
    dedup_in_order(
        places
            .iter()
            .map(|place| place.entity.spatial_key.clone())
            .filter(|key| !key.is_empty()),
    )
}

/// Place titles, the source page and resolved people, without unresolved names.
fn participants(page_title: &str, placement: &Placement<'_>) -> Vec<PageTitle> {
    let places = placement
        .where_places
        .iter()
        .chain(placement.city_places)
        .map(|place| place.entity.display_title());
    dedup_in_order(
        places
            .chain(std::iter::once(page_title.to_string()))
            .chain(placement.people.iter().map(|name| display_title(name)))
            .filter(|name| !name.is_empty() && !is_unresolved(name)),
    )
}

fn count_category(report: &mut IndexingReport, label: &str) {
    *report.categories.entry(label.to_string()).or_default() += 1;
}

fn emit<T: Serialize>(sink: &mut dyn RecordSink, record: &T) -> Result<(), IndexerError> {
    sink.add_record(Record::from_serialize(record)?)
}
