//! Hybrid spatial key codec.
//!
//! A key is one base-32 geohash character (5 bits, longitude first) followed by
//! base-4 quadtree digits. Each digit halves the remaining cell along both axes,
//! so a key prefix always denotes a rectangle that contains every longer key
//! starting with it.
//!
//! The leading character splits on `coordinate > mid` while quadtree digits split
//! on `coordinate >= mid`. Previously encoded keys depend on this exact
//! behaviour, so both tests are kept as they are.

use serde::{Deserialize, Serialize};

use crate::constants::geohash::{BASE32_ALPHABET, BASE32_BITS, LAT_RANGE, LON_RANGE};
use crate::errors::IndexerError;
use crate::types::SpatialKey;

/// Rectangle decoded from a spatial key.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge.
    pub min_lat: f64,
    /// Western edge.
    pub min_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
}

impl BoundingBox {
    /// True when `(lat, lon)` lies inside the box, edges included.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }

    /// Center point as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Mutable bisection state shared by the encoder and the decoder.
struct Cell {
    lat: (f64, f64),
    lon: (f64, f64),
}

impl Cell {
    fn world() -> Self {
        Self {
            lat: LAT_RANGE,
            lon: LON_RANGE,
        }
    }

    fn into_bounding_box(self) -> BoundingBox {
        BoundingBox {
            min_lat: self.lat.0,
            min_lon: self.lon.0,
            max_lat: self.lat.1,
            max_lon: self.lon.1,
        }
    }
}

fn midpoint(range: (f64, f64)) -> f64 {
    (range.0 + range.1) / 2.0
}

fn keep_half(range: &mut (f64, f64), upper: bool) {
    let mid = midpoint(*range);
    if upper {
        range.0 = mid;
    } else {
        range.1 = mid;
    }
}

/// Encode a coordinate as a hybrid key with `precision` quadtree digits.
pub fn encode_hybrid(lat: f64, lon: f64, precision: usize) -> Result<SpatialKey, IndexerError> {
    if !lat.is_finite()
        || !lon.is_finite()
        || !(LAT_RANGE.0..=LAT_RANGE.1).contains(&lat)
        || !(LON_RANGE.0..=LON_RANGE.1).contains(&lon)
    {
        return Err(IndexerError::InvalidCoordinate { lat, lon });
    }

    let mut cell = Cell::world();
    let mut ch = 0usize;
    for (bit, mask) in BASE32_BITS.iter().enumerate() {
        if bit % 2 == 0 {
            let upper = lon > midpoint(cell.lon);
            if upper {
                ch |= *mask as usize;
            }
            keep_half(&mut cell.lon, upper);
        } else {
            let upper = lat > midpoint(cell.lat);
            if upper {
                ch |= *mask as usize;
            }
            keep_half(&mut cell.lat, upper);
        }
    }

    let mut key = String::with_capacity(1 + precision);
    key.push(BASE32_ALPHABET[ch] as char);
    for _ in 0..precision {
        let north = lat >= midpoint(cell.lat);
        let east = lon >= midpoint(cell.lon);
        keep_half(&mut cell.lat, north);
        keep_half(&mut cell.lon, east);
        let quadrant = 2 * u8::from(north) + u8::from(east);
        key.push((b'0' + quadrant) as char);
    }
    Ok(key)
}

/// Decode a hybrid key (case-insensitive) into its bounding box.
pub fn decode_hybrid(key: &str) -> Result<BoundingBox, IndexerError> {
    let mut chars = key.chars();
    let first = chars
        .next()
        .ok_or_else(|| invalid_key(key, "key is empty".to_string()))?
        .to_ascii_lowercase();
    let ch = BASE32_ALPHABET
        .iter()
        .position(|symbol| *symbol as char == first)
        .ok_or_else(|| invalid_key(key, format!("invalid base32 character '{first}'")))?;

    let mut cell = Cell::world();
    for (bit, mask) in BASE32_BITS.iter().enumerate() {
        let upper = ch & (*mask as usize) != 0;
        if bit % 2 == 0 {
            keep_half(&mut cell.lon, upper);
        } else {
            keep_half(&mut cell.lat, upper);
        }
    }

    for digit in chars {
        let quadrant = match digit {
            '0'..='3' => digit as u8 - b'0',
            other => return Err(invalid_key(key, format!("invalid base4 character '{other}'"))),
        };
        // 0: SW, 1: SE, 2: NW, 3: NE
        keep_half(&mut cell.lat, quadrant & 2 != 0);
        keep_half(&mut cell.lon, quadrant & 1 != 0);
    }
    Ok(cell.into_bounding_box())
}

/// First character of a key, used as the coarse region in month/region keys.
pub fn region_char(key: &str) -> Option<char> {
    key.chars().next()
}

fn invalid_key(key: &str, reason: String) -> IndexerError {
    IndexerError::InvalidSpatialKey {
        key: key.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_POINTS: [(f64, f64); 9] = [
        (48.8566, 2.3522),
        (51.5074, -0.1278),
        (-33.8688, 151.2093),
        (40.7128, -74.0060),
        (-22.9068, -43.1729),
        (0.0, 0.0),
        (89.9, 179.9),
        (-89.9, -179.9),
        (35.6762, 139.6503),
    ];

    #[test]
    fn decoded_box_contains_encoded_point() {
        for (lat, lon) in SAMPLE_POINTS {
            for precision in [0, 1, 4, 8, 12] {
                let key = encode_hybrid(lat, lon, precision).unwrap();
                assert_eq!(key.len(), 1 + precision);
                let bbox = decode_hybrid(&key).unwrap();
                assert!(bbox.contains(lat, lon), "{key} does not contain ({lat}, {lon})");
            }
        }
    }

    #[test]
    fn reencoding_box_center_reproduces_key() {
        for (lat, lon) in SAMPLE_POINTS {
            for precision in [0, 3, 8] {
                let key = encode_hybrid(lat, lon, precision).unwrap();
                let (center_lat, center_lon) = decode_hybrid(&key).unwrap().center();
                assert_eq!(encode_hybrid(center_lat, center_lon, precision).unwrap(), key);
            }
        }
    }

    #[test]
    fn longer_keys_nest_inside_their_prefixes() {
        let key = encode_hybrid(48.8566, 2.3522, 10).unwrap();
        let mut previous = decode_hybrid(&key[..1]).unwrap();
        for end in 2..=key.len() {
            let inner = decode_hybrid(&key[..end]).unwrap();
            assert!(inner.min_lat >= previous.min_lat && inner.max_lat <= previous.max_lat);
            assert!(inner.min_lon >= previous.min_lon && inner.max_lon <= previous.max_lon);
            previous = inner;
        }
    }

    #[test]
    fn leading_character_matches_standard_geohash() {
        assert_eq!(&encode_hybrid(48.8566, 2.3522, 0).unwrap(), "u");
        assert_eq!(&encode_hybrid(40.7128, -74.0060, 0).unwrap(), "d");
        assert_eq!(&encode_hybrid(-33.8688, 151.2093, 0).unwrap(), "r");
    }

    #[test]
    fn boundary_tests_differ_between_leading_char_and_digits() {
        // On the prime meridian and equator the leading character falls to the
        // lower halves (strict test) while quadtree digits take the upper halves.
        let key = encode_hybrid(0.0, 0.0, 2).unwrap();
        assert_eq!(key, "733");
        let bbox = decode_hybrid("7").unwrap();
        assert_eq!(bbox.max_lat, 0.0);
        assert_eq!(bbox.max_lon, 0.0);
    }

    #[test]
    fn decode_accepts_known_key_and_upper_case() {
        let bbox = decode_hybrid("s03").unwrap();
        assert_eq!(bbox, decode_hybrid("S03").unwrap());
        // `s` is lat 0..45, lon 0..45; `0` keeps the south-west quarter, `3` its north-east.
        assert_eq!(bbox.min_lat, 11.25);
        assert_eq!(bbox.max_lat, 22.5);
        assert_eq!(bbox.min_lon, 11.25);
        assert_eq!(bbox.max_lon, 22.5);
    }

    #[test]
    fn decode_rejects_digits_outside_quadtree_range() {
        match decode_hybrid("s05") {
            Err(IndexerError::InvalidSpatialKey { reason, .. }) => {
                assert!(reason.contains("base4"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_invalid_characters() {
        match decode_hybrid("!invalid") {
            Err(IndexerError::InvalidSpatialKey { reason, .. }) => {
                assert!(reason.contains("base32"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        for key in ["a", "u4", "u0x", ""] {
            assert!(decode_hybrid(key).is_err(), "{key} should be rejected");
        }
    }

    #[test]
    fn encode_rejects_out_of_range_coordinates() {
        assert!(encode_hybrid(91.0, 0.0, 2).is_err());
        assert!(encode_hybrid(0.0, -180.5, 2).is_err());
        assert!(encode_hybrid(f64::NAN, 0.0, 2).is_err());
        assert!(encode_hybrid(90.0, 180.0, 2).is_ok());
    }

    #[test]
    fn region_char_is_leading_symbol() {
        assert_eq!(region_char("u09"), Some('u'));
        assert_eq!(region_char(""), None);
    }
}
