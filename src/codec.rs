//! Conversion between [`ViewportState`] and the `#?map=<zoom>/<lat>/<lon>` fragment.
//!
//! Zoom is written with two decimals. Latitude and longitude get
//! `max(0, ceil(log2(zoom)))` decimals, so the text never carries more
//! precision than is visible at that zoom.

use crate::{LatLon, ViewportState};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Prefix of every encoded fragment, including the fragment marker.
pub const FRAGMENT_PREFIX: &str = "#?";

/// Query key holding `<zoom>/<lat>/<lon>`.
pub const MAP_KEY: &str = "map";

/// Digits written for the zoom level.
pub const ZOOM_DIGITS: usize = 2;

/// Upper bound on coordinate digits (the fixed-point formatter of shared links caps here).
pub const MAX_PRECISION: usize = 100;

/// Numeric literals accepted in a map segment, besides the empty string.
static NUMBER_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?<dec>[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)|(?<inf>[+-]?Infinity)|0[xX](?<hex>[0-9a-fA-F]+)|0[oO](?<oct>[0-7]+)|0[bB](?<bin>[01]+))$",
    )
    .ok()
});

/// Reasons a fragment cannot be turned into a viewport.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("expected at least 3 map segments, found {found}")]
    TooFewSegments { found: usize },
    #[error("map segment {index} ({segment:?}) is not a number")]
    NotANumber { index: usize, segment: String },
}

/// Number of decimals used for coordinates at the given zoom.
///
/// Zoom values `<= 1` (and NaN) give 0.
pub fn precision_for_zoom(zoom: f64) -> usize {
    let digits = zoom.log2().ceil();
    if digits.is_nan() || digits <= 0.0 {
        0
    } else {
        (digits as usize).min(MAX_PRECISION)
    }
}

/// Encodes a viewport as `#?map=<zoom>/<lat>/<lon>`.
pub fn encode(state: &ViewportState) -> String {
    let precision = precision_for_zoom(state.zoom);
    format!(
        "{FRAGMENT_PREFIX}{MAP_KEY}={}/{}/{}",
        to_fixed(state.zoom, ZOOM_DIGITS),
        to_fixed(state.center.lat, precision),
        to_fixed(state.center.lon, precision),
    )
}

/// Decodes fragment text with the leading `#` already stripped.
///
/// The text is read as `key=value` pairs joined by `&` (`+` is a space,
/// values are percent-decoded, the last repeated key wins). The `map`
/// value must have at least three `/`-separated numbers; segments past
/// the third are ignored but still have to be numeric. Latitude is
/// clamped to [`crate::MAX_LATITUDE`].
pub fn decode(fragment: &str) -> Result<ViewportState, DecodeError> {
    let query = fragment.strip_prefix('?').unwrap_or(fragment);
    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    let value = params.get(MAP_KEY).map(String::as_str).unwrap_or("");

    let segments: Vec<&str> = value.split('/').collect();
    if segments.len() < 3 {
        return Err(DecodeError::TooFewSegments {
            found: segments.len(),
        });
    }

    let mut args = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        let number = parse_number(segment);
        if number.is_nan() {
            return Err(DecodeError::NotANumber {
                index,
                segment: (*segment).to_string(),
            });
        }
        args.push(number);
    }

    Ok(ViewportState::new(args[0], LatLon::new(args[1], args[2])))
}

/// Parses a segment the way shared links have always been read:
/// whitespace is trimmed, an empty segment is zero, `Infinity` and
/// `0x`/`0o`/`0b` literals are numbers. Anything else is NaN.
fn parse_number(segment: &str) -> f64 {
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    numeric_literal(trimmed).unwrap_or(f64::NAN)
}

fn numeric_literal(text: &str) -> Option<f64> {
    let caps = NUMBER_PATTERN.as_ref()?.captures(text)?;

    if let Some(dec) = caps.name("dec") {
        return dec.as_str().parse().ok();
    }
    if let Some(inf) = caps.name("inf") {
        let negative = inf.as_str().starts_with('-');
        return Some(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let (digits, radix) = [("hex", 16), ("oct", 8), ("bin", 2)]
        .into_iter()
        .find_map(|(name, radix)| caps.name(name).map(|m| (m.as_str(), radix)))?;

    Some(
        digits
            .chars()
            .filter_map(|c| c.to_digit(radix))
            .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d)),
    )
}

/// Fixed-point rendering compatible with links produced by browsers:
/// exact ties round away from zero and negative zero has no sign.
fn to_fixed(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    // Collapses -0.0 into 0.0.
    let value = if value == 0.0 { 0.0 } else { value };

    if is_tie(value, digits) {
        round_tie_away_from_zero(value, digits)
    } else {
        format!("{value:.digits$}")
    }
}

/// True when `value` lies exactly halfway between two `digits`-decimal numbers.
///
/// That happens iff `value * 2^(digits + 1)` is an odd integer; the
/// multiplication by a power of two is exact.
fn is_tie(value: f64, digits: usize) -> bool {
    let scaled = value.abs() * 2f64.powi(digits as i32 + 1);
    scaled.is_finite() && scaled.fract() == 0.0 && scaled % 2.0 == 1.0
}

fn round_tie_away_from_zero(value: f64, digits: usize) -> String {
    // A tie has exactly `digits + 1` decimals, the last one being 5.
    let exact = format!("{:.*}", digits + 1, value.abs());
    let mut chars: Vec<char> = exact.chars().collect();
    chars.pop();
    if chars.last() == Some(&'.') {
        chars.pop();
    }

    let mut carry = true;
    for c in chars.iter_mut().rev() {
        match *c {
            '.' => continue,
            '9' => *c = '0',
            d => {
                *c = char::from(d as u8 + 1);
                carry = false;
                break;
            }
        }
    }
    if carry {
        chars.insert(0, '1');
    }

    let magnitude: String = chars.into_iter().collect();
    if value < 0.0 {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_LATITUDE;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn state(zoom: f64, lat: f64, lon: f64) -> ViewportState {
        ViewportState::new(zoom, LatLon::new(lat, lon))
    }

    #[test]
    fn precision_follows_log2_of_zoom() {
        assert_eq!(precision_for_zoom(1.0), 0);
        assert_eq!(precision_for_zoom(2.0), 1);
        assert_eq!(precision_for_zoom(3.0), 2);
        assert_eq!(precision_for_zoom(16.0), 4);
        assert_eq!(precision_for_zoom(16.5), 5);
        assert_eq!(precision_for_zoom(0.5), 0);
    }

    #[test]
    fn precision_floors_degenerate_zoom_at_zero() {
        assert_eq!(precision_for_zoom(0.0), 0);
        assert_eq!(precision_for_zoom(-3.0), 0);
        assert_eq!(precision_for_zoom(f64::NAN), 0);
        assert_eq!(precision_for_zoom(f64::INFINITY), MAX_PRECISION);
    }

    #[test]
    fn encodes_low_zoom_without_decimals() {
        assert_eq!(
            encode(&state(1.0, 45.123456, -122.654321)),
            "#?map=1.00/45/-123"
        );
    }

    #[test]
    fn encodes_high_zoom_with_four_decimals() {
        assert_eq!(
            encode(&state(16.0, 45.123456, -122.654321)),
            "#?map=16.00/45.1235/-122.6543"
        );
    }

    #[test]
    fn fixed_point_rounds_ties_away_from_zero() {
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(-2.5, 0), "-3");
        assert_eq!(to_fixed(0.125, 2), "0.13");
        assert_eq!(to_fixed(9.5, 0), "10");
        assert_eq!(to_fixed(-99.5, 0), "-100");
        assert_eq!(to_fixed(1.005, 2), "1.00");
    }

    #[test]
    fn fixed_point_drops_sign_of_zero() {
        assert_eq!(to_fixed(-0.0, 2), "0.00");
        assert_eq!(to_fixed(-0.4, 0), "-0");
    }

    #[test]
    fn fixed_point_spells_out_non_finite_values() {
        assert_eq!(to_fixed(f64::INFINITY, 2), "Infinity");
        assert_eq!(to_fixed(f64::NEG_INFINITY, 0), "-Infinity");
        assert_eq!(to_fixed(f64::NAN, 1), "NaN");
    }

    #[test]
    fn decodes_fragment_with_query_marker() {
        let decoded = decode("?map=16.00/45.1235/-122.6543").unwrap();
        assert_eq!(decoded, state(16.0, 45.1235, -122.6543));
    }

    #[test]
    fn decodes_without_query_marker() {
        assert_eq!(decode("map=5/10/20").unwrap(), state(5.0, 10.0, 20.0));
    }

    #[test]
    fn clamps_latitude_on_decode() {
        let decoded = decode("map=5/200/10").unwrap();
        assert_eq!(decoded.center.lat, MAX_LATITUDE);
        assert_eq!(decoded.center.lon, 10.0);

        let decoded = decode("map=5/-200/10").unwrap();
        assert_eq!(decoded.center.lat, -MAX_LATITUDE);
    }

    #[test]
    fn rejects_missing_or_short_map() {
        assert_eq!(
            decode("?id=n1").unwrap_err(),
            DecodeError::TooFewSegments { found: 1 }
        );
        assert_eq!(
            decode("?map=5/10").unwrap_err(),
            DecodeError::TooFewSegments { found: 2 }
        );
        assert_eq!(decode("").unwrap_err(), DecodeError::TooFewSegments { found: 1 });
    }

    #[test]
    fn rejects_non_numeric_segments() {
        assert_eq!(
            decode("?map=notanumber").unwrap_err(),
            DecodeError::TooFewSegments { found: 1 }
        );
        assert_eq!(
            decode("?map=5/north/20").unwrap_err(),
            DecodeError::NotANumber {
                index: 1,
                segment: "north".to_string()
            }
        );
        assert!(decode("?map=5/10/inf").is_err());
        assert!(decode("?map=5/10/NaN").is_err());
    }

    #[test]
    fn tolerates_trailing_segments_but_checks_them() {
        assert_eq!(decode("?map=5/10/20/99").unwrap(), state(5.0, 10.0, 20.0));
        assert_eq!(
            decode("?map=5/10/20/x").unwrap_err(),
            DecodeError::NotANumber {
                index: 3,
                segment: "x".to_string()
            }
        );
    }

    #[test]
    fn reads_segments_like_shared_links_do() {
        assert_eq!(decode("?map=5//20").unwrap(), state(5.0, 0.0, 20.0));
        assert_eq!(decode("?map=+5/ 10 /.5").unwrap(), state(5.0, 10.0, 0.5));
        assert_eq!(decode("?map=0x10/0b11/0o7").unwrap(), state(16.0, 3.0, 7.0));
        assert_eq!(
            decode("?map=1e1/1E-1/-Infinity").unwrap(),
            state(10.0, 0.1, f64::NEG_INFINITY)
        );
    }

    #[test]
    fn percent_decodes_and_last_key_wins() {
        assert_eq!(decode("?map=5%2F10%2F20").unwrap(), state(5.0, 10.0, 20.0));
        assert_eq!(
            decode("?map=1/2/3&id=w42&map=4/5/6").unwrap(),
            state(4.0, 5.0, 6.0)
        );
        assert_eq!(decode("?map=+4/5/6").unwrap(), state(4.0, 5.0, 6.0));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode_up_to_precision(
            zoom in 0.5f64..22.0,
            lat in -89.9f64..89.9,
            lon in -180.0f64..180.0,
        ) {
            let original = state(zoom, lat, lon);
            let decoded = decode(&encode(&original)[1..]).unwrap();
            let tolerance = 0.5 * 10f64.powi(-(precision_for_zoom(zoom) as i32)) + 1e-9;

            prop_assert!((decoded.zoom - zoom).abs() <= 0.005 + 1e-9);
            prop_assert!((decoded.center.lat - lat).abs() <= tolerance);
            prop_assert!((decoded.center.lon - lon).abs() <= tolerance);
        }
    }
}
