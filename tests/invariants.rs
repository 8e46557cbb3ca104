use chrono::NaiveDate;

use event_atlas::{
    BoundedCache, Category, DateRange, DateRangeParser, IndexerError, StructuredDateParser,
    classify, decode_hybrid, encode_hybrid, year_months,
};

const CITIES: [(f64, f64); 6] = [
    (48.8566, 2.3522),
    (51.5074, -0.1278),
    (-33.8688, 151.2093),
    (40.7128, -74.0060),
    (-22.9068, -43.1729),
    (35.6762, 139.6503),
];

fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
        NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
    )
    .unwrap()
}

#[test]
fn spatial_keys_contain_and_nest_around_their_points() {
    for (lat, lon) in CITIES {
        let mut previous: Option<String> = None;
        for precision in 0..=10 {
            let key = encode_hybrid(lat, lon, precision).unwrap();
            assert_eq!(key.len(), precision + 1);
            let bbox = decode_hybrid(&key).unwrap();
            assert!(bbox.contains(lat, lon), "{key} misses ({lat}, {lon})");

            let (center_lat, center_lon) = bbox.center();
            assert_eq!(encode_hybrid(center_lat, center_lon, precision).unwrap(), key);

            if let Some(prefix) = previous {
                assert!(key.starts_with(&prefix));
            }
            previous = Some(key);
        }
    }
}

#[test]
fn malformed_spatial_keys_are_rejected() {
    assert!(matches!(
        decode_hybrid("!invalid"),
        Err(IndexerError::InvalidSpatialKey { .. })
    ));
    assert!(decode_hybrid("s03").is_ok());
}

#[test]
fn classifier_examples() {
    assert_eq!(classify("She won the Nobel Prize"), Category::Award);
    assert_eq!(classify("Born in Paris"), Category::Birth);
    assert_eq!(classify("the annual festival"), Category::Other);
    assert_eq!(classify("the annual festival").to_string(), "other");
}

#[test]
fn month_buckets_collapse_full_years() {
    assert_eq!(
        year_months(&range((2000, 1, 1), (2000, 12, 31))),
        vec![(2000, None)]
    );
    assert_eq!(
        year_months(&range((2000, 1, 1), (2000, 2, 15))),
        vec![(2000, Some(1)), (2000, Some(2))]
    );
    assert_eq!(
        year_months(&range((1999, 11, 3), (2001, 1, 2))),
        vec![
            (1999, Some(11)),
            (1999, Some(12)),
            (2000, None),
            (2001, Some(1)),
        ]
    );
}

#[test]
fn parsed_dates_feed_month_buckets() {
    let parser = StructuredDateParser;
    let whole_year = parser.parse("1843").unwrap();
    assert_eq!(whole_year.years(), 1843..=1843);
    assert_eq!(year_months(&whole_year), vec![(1843, None)]);

    let span = parser.parse("1843-11/1844-01").unwrap();
    assert_eq!(span.years(), 1843..=1844);
    assert_eq!(year_months(&span).len(), 3);
    assert!(parser.parse("1844/1843").is_err());
}

#[test]
fn bounded_cache_evicts_least_recently_used() {
    let mut cache = BoundedCache::new(2);
    cache.insert("Paris", 1);
    cache.insert("London", 2);
    assert_eq!(cache.get(&"Paris"), Some(1));
    cache.insert("Rome", 3);

    assert!(cache.contains(&"Paris"));
    assert!(!cache.contains(&"London"));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stats().evictions, 1);
}
