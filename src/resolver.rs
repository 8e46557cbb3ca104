//! Place and person resolution against the lookup tables.
//!
//! Place strings are free text written by an extraction step: they may hold
//! several alternatives separated by `|`, end with `?` when the extractor was
//! unsure, or carry extra qualifiers such as `Springfield, Illinois`. The
//! resolver turns them into geocoded entities by trying an ordered list of
//! [`PlaceStrategy`] steps. Finding nothing is a normal outcome and yields an
//! empty result; only lookup-table failures are errors.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cache::{BoundedCache, CacheStats};
use crate::config::{PlaceStrategy, ResolverConfig};
use crate::constants::resolver::{
    ALTERNATIVES_SEPARATOR, CITY_SUFFIX, GUESS_MARKER, NON_ENTITY_PREFIXES, UNKNOWN_PLACE,
    UNRESOLVED_MARKER,
};
use crate::data::{GeoEntity, ResolvedPlace};
use crate::errors::IndexerError;
use crate::link_graph::LinkGraph;
use crate::lookup::{GeodataStore, PageIndex, RedirectIndex};
use crate::types::PageTitle;

/// Ambiguous name to candidate titles.
///
/// Held by the resolver and exposed through [`EntityResolver::disambiguation`];
/// no resolution step consults it yet.
pub type DisambiguationDict = HashMap<String, Vec<PageTitle>>;

/// Resolves place and person mentions to canonical pages.
pub struct EntityResolver {
    pages: PageIndex,
    redirects: RedirectIndex,
    geodata: GeodataStore,
    disambiguation: DisambiguationDict,
    strategies: Vec<PlaceStrategy>,
    geocode_cache: Mutex<BoundedCache<PageTitle, Option<GeoEntity>>>,
}

impl EntityResolver {
    /// Build a resolver over the given lookup tables.
    pub fn new(
        pages: PageIndex,
        redirects: RedirectIndex,
        geodata: GeodataStore,
        disambiguation: DisambiguationDict,
        config: ResolverConfig,
    ) -> Self {
        Self {
            pages,
            redirects,
            geodata,
            disambiguation,
            strategies: config.place_strategies,
            geocode_cache: Mutex::new(BoundedCache::new(config.cache_capacity)),
        }
    }

    /// Resolve a place string to zero or more geocoded entities.
    ///
    /// `A|B` resolves each alternative independently and returns every one that
    /// resolved. A trailing `?` marks the results as guesses.
    pub fn resolve_place(
        &self,
        text: &str,
        links: &LinkGraph,
    ) -> Result<Vec<ResolvedPlace>, IndexerError> {
        if is_blank_place(text) {
            return Ok(Vec::new());
        }
        if text.contains(ALTERNATIVES_SEPARATOR) {
            let mut resolved = Vec::new();
            for alternative in text.split(ALTERNATIVES_SEPARATOR) {
                resolved.extend(self.resolve_place(alternative, links)?);
            }
            return Ok(resolved);
        }

        let text = text.trim();
        let is_guess = text.ends_with(GUESS_MARKER);
        let text = text.trim_matches(GUESS_MARKER).trim();
        if is_blank_place(text) {
            return Ok(Vec::new());
        }

        for strategy in &self.strategies {
            let mut found = self.apply_strategy(*strategy, text, links)?;
            if !found.is_empty() {
                for place in &mut found {
                    place.is_guess |= is_guess;
                }
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }

    fn apply_strategy(
        &self,
        strategy: PlaceStrategy,
        text: &str,
        links: &LinkGraph,
    ) -> Result<Vec<ResolvedPlace>, IndexerError> {
        let entity = match strategy {
            PlaceStrategy::LinkGraph => match linked_title(text, links) {
                Some(target) => self.geocode(target)?,
                None => None,
            },
            PlaceStrategy::Literal => self.geocode(text)?,
            PlaceStrategy::Redirect => match self.redirects.target(text)? {
                Some(target) => self.geocode(&target)?,
                None => None,
            },
            PlaceStrategy::CommaPrefix => {
                return match text.split_once(',') {
                    Some((head, _)) => self.resolve_place(head, links),
                    None => Ok(Vec::new()),
                };
            }
            PlaceStrategy::CitySuffix => {
                if text.ends_with(CITY_SUFFIX.trim_start()) {
                    return Ok(Vec::new());
                }
                return self.resolve_place(&format!("{text}{CITY_SUFFIX}"), links);
            }
        };
        Ok(entity
            .map(|entity| ResolvedPlace {
                entity,
                is_guess: false,
            })
            .into_iter()
            .collect())
    }

    /// Canonical page title for a person, or the name tagged ` (?)`.
    pub fn resolve_person(&self, name: &str, links: &LinkGraph) -> Result<String, IndexerError> {
        Ok(self
            .resolve_page_title(name, links)?
            .unwrap_or_else(|| format!("{name}{UNRESOLVED_MARKER}")))
    }

    /// Canonical page title for `name`.
    ///
    /// Tries the link graph target first (ambiguous anchors are skipped), then
    /// the name itself, then its redirect target. Each candidate must exist in
    /// the page index.
    pub fn resolve_page_title(
        &self,
        name: &str,
        links: &LinkGraph,
    ) -> Result<Option<PageTitle>, IndexerError> {
        if let Some(target) = linked_title(name, links)
            && let Some(title) = self.canonical_title(target)?
        {
            return Ok(Some(title));
        }
        self.canonical_title(name)
    }

    fn canonical_title(&self, name: &str) -> Result<Option<PageTitle>, IndexerError> {
        if self.pages.contains(name)? {
            return Ok(Some(name.to_string()));
        }
        if let Some(target) = self.redirects.target(name)?
            && self.pages.contains(&target)?
        {
            return Ok(Some(target));
        }
        Ok(None)
    }

    /// Memoized geodata lookup. Absent entries are cached too.
    pub fn geocode(&self, title: &str) -> Result<Option<GeoEntity>, IndexerError> {
        self.cache()
            .get_or_try_insert_with(title.to_string(), |key| self.geodata.get(key))
    }

    /// Injected disambiguation dictionary.
    pub fn disambiguation(&self) -> &DisambiguationDict {
        &self.disambiguation
    }

    /// Place strategies in the order they are tried.
    pub fn place_strategies(&self) -> &[PlaceStrategy] {
        &self.strategies
    }

    /// Geocode cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    /// Drop every memoized geocode.
    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    fn cache(&self) -> MutexGuard<'_, BoundedCache<PageTitle, Option<GeoEntity>>> {
        // The cache holds plain values, so a poisoned lock is still usable.
        self.geocode_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// True when a person name carries the unresolved marker.
pub fn is_unresolved(name: &str) -> bool {
    name.ends_with(UNRESOLVED_MARKER.trim_start())
}

fn is_blank_place(text: &str) -> bool {
    text.is_empty() || text.eq_ignore_ascii_case(UNKNOWN_PLACE)
}

/// Single link target of `text` that names a different, real entity page.
fn linked_title<'a>(text: &str, links: &'a LinkGraph) -> Option<&'a str> {
    let target = links.get(text)?.resolved()?;
    let is_entity = !NON_ENTITY_PREFIXES
        .iter()
        .any(|prefix| target.starts_with(prefix));
    (target != text && is_entity).then_some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link_graph::LinkTarget;
    use crate::lookup::{InMemoryLookup, KeyValueLookup};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn geo(title: &str, key: &str) -> (String, String) {
        (
            title.to_string(),
            format!(r#"{{"page_title": "{title}", "geohash4": "{key}"}}"#),
        )
    }

    fn resolver_with(config: ResolverConfig) -> EntityResolver {
        let pages: InMemoryLookup = [
            ("Ada Lovelace", "1"),
            ("Charles Babbage", "1"),
            ("Paris", "1"),
            ("London", "1"),
        ]
        .into_iter()
        .collect();
        let redirects: InMemoryLookup = [
            ("Lutetia", "Paris"),
            ("Babbage", "Charles Babbage"),
            ("Nowhere Man", "Missing Page"),
        ]
        .into_iter()
        .collect();
        let geodata: InMemoryLookup = [
            geo("Paris", "u0933"),
            geo("London", "u1011"),
            geo("Cambridge (City)", "u1230"),
            geo("New_York_City", "d3210"),
        ]
        .into_iter()
        .collect();
        EntityResolver::new(
            PageIndex::new(Arc::new(pages)),
            RedirectIndex::new(Arc::new(redirects)),
            GeodataStore::new(Arc::new(geodata)),
            DisambiguationDict::new(),
            config,
        )
    }

    fn resolver() -> EntityResolver {
        resolver_with(ResolverConfig::default())
    }

    fn links() -> LinkGraph {
        [
            ("the capital", LinkTarget::Resolved("Paris".to_string())),
            ("NYC", LinkTarget::Resolved("New_York_City".to_string())),
            ("Lists", LinkTarget::Resolved("List of cities".to_string())),
            ("Ada", LinkTarget::Resolved("Ada Lovelace".to_string())),
            (
                "Charles",
                LinkTarget::Ambiguous(
                    ["Charles Babbage".to_string(), "Charles Dickens".to_string()]
                        .into_iter()
                        .collect(),
                ),
            ),
        ]
        .into_iter()
        .map(|(anchor, target)| (anchor.to_string(), target))
        .collect()
    }

    fn titles(places: &[ResolvedPlace]) -> Vec<&str> {
        places.iter().map(|p| p.entity.page_title.as_str()).collect()
    }

    #[test]
    fn alternatives_resolve_independently() {
        let places = resolver().resolve_place("Paris|London", &links()).unwrap();
        assert_eq!(titles(&places), vec!["Paris", "London"]);

        let one = resolver().resolve_place("Atlantis|London", &links()).unwrap();
        assert_eq!(titles(&one), vec!["London"]);
    }

    #[test]
    fn unknown_and_unresolvable_places_yield_nothing() {
        let resolver = resolver();
        assert!(resolver.resolve_place("Unknown", &links()).unwrap().is_empty());
        assert!(resolver.resolve_place("", &links()).unwrap().is_empty());
        assert!(resolver.resolve_place(" ? ", &links()).unwrap().is_empty());
        assert!(resolver.resolve_place("Springfield", &links()).unwrap().is_empty());
    }

    #[test]
    fn trailing_question_mark_marks_guess() {
        let places = resolver().resolve_place("London?", &links()).unwrap();
        assert_eq!(titles(&places), vec!["London"]);
        assert!(places[0].is_guess);
        assert!(!resolver().resolve_place("London", &links()).unwrap()[0].is_guess);
    }

    #[test]
    fn link_graph_redirect_and_suffix_strategies() {
        let resolver = resolver();
        let links = links();
        assert_eq!(
            titles(&resolver.resolve_place("the capital", &links).unwrap()),
            vec!["Paris"]
        );
        assert_eq!(
            resolver.resolve_place("NYC", &links).unwrap()[0].entity.spatial_key,
            "d3210"
        );
        assert_eq!(
            titles(&resolver.resolve_place("Lutetia", &links).unwrap()),
            vec!["Paris"]
        );
        assert_eq!(
            titles(&resolver.resolve_place("Cambridge", &links).unwrap()),
            vec!["Cambridge (City)"]
        );
        assert!(resolver.resolve_place("Lists", &links).unwrap().is_empty());
    }

    #[test]
    fn comma_retry_keeps_outer_guess_flag() {
        let places = resolver()
            .resolve_place("London, England?", &links())
            .unwrap();
        assert_eq!(titles(&places), vec!["London"]);
        assert!(places[0].is_guess);
    }

    #[test]
    fn strategy_list_controls_fallbacks() {
        let literal_only =
            resolver_with(ResolverConfig::default().with_place_strategies([PlaceStrategy::Literal]));
        assert!(literal_only.resolve_place("Lutetia", &links()).unwrap().is_empty());
        assert!(literal_only.resolve_place("Cambridge", &links()).unwrap().is_empty());
        assert_eq!(literal_only.place_strategies(), &[PlaceStrategy::Literal]);
    }

    #[test]
    fn person_resolution_uses_links_then_index_then_redirects() {
        let resolver = resolver();
        let links = links();
        assert_eq!(resolver.resolve_person("Ada", &links).unwrap(), "Ada Lovelace");
        assert_eq!(
            resolver.resolve_person("Charles Babbage", &links).unwrap(),
            "Charles Babbage"
        );
        assert_eq!(
            resolver.resolve_person("Babbage", &links).unwrap(),
            "Charles Babbage"
        );
        // Ambiguous anchors fall through to literal lookup, which fails here.
        let unresolved = resolver.resolve_person("Charles", &links).unwrap();
        assert_eq!(unresolved, "Charles (?)");
        assert!(is_unresolved(&unresolved));
        // A redirect to a page missing from the index does not count.
        assert_eq!(
            resolver.resolve_page_title("Nowhere Man", &links).unwrap(),
            None
        );
    }

    struct CountingLookup {
        inner: InMemoryLookup,
        calls: AtomicUsize,
    }

    impl KeyValueLookup for CountingLookup {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, IndexerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }
    }

    #[test]
    fn geocode_lookups_are_memoized_including_misses() {
        let geodata = Arc::new(CountingLookup {
            inner: [geo("Paris", "u0933")].into_iter().collect(),
            calls: AtomicUsize::new(0),
        });
        let resolver = EntityResolver::new(
            PageIndex::new(Arc::new(InMemoryLookup::new())),
            RedirectIndex::new(Arc::new(InMemoryLookup::new())),
            GeodataStore::new(geodata.clone()),
            DisambiguationDict::new(),
            ResolverConfig::default(),
        );

        for _ in 0..3 {
            assert!(resolver.geocode("Paris").unwrap().is_some());
            assert!(resolver.geocode("Atlantis").unwrap().is_none());
        }
        assert_eq!(geodata.calls.load(Ordering::SeqCst), 2);
        let stats = resolver.cache_stats();
        assert_eq!((stats.hits, stats.misses), (4, 2));

        resolver.clear_cache();
        resolver.geocode("Paris").unwrap();
        assert_eq!(geodata.calls.load(Ordering::SeqCst), 3);
    }

    struct FailingLookup;

    impl KeyValueLookup for FailingLookup {
        fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>, IndexerError> {
            Err(IndexerError::LookupUnavailable {
                table: "geodata".to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    #[test]
    fn lookup_failures_propagate() {
        let resolver = EntityResolver::new(
            PageIndex::new(Arc::new(InMemoryLookup::new())),
            RedirectIndex::new(Arc::new(InMemoryLookup::new())),
            GeodataStore::new(Arc::new(FailingLookup)),
            DisambiguationDict::new(),
            ResolverConfig::default(),
        );
        assert!(matches!(
            resolver.resolve_place("Paris", &LinkGraph::new()),
            Err(IndexerError::LookupUnavailable { .. })
        ));
        assert!(resolver.disambiguation().is_empty());
    }
}
