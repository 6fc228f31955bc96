//! Fixed-point encoding of geographic degrees.
//!
//! `value = round_half_even((deg + offset) * 10^decimal_places)`, with
//! offset 90 for latitude and 180 for longitude, so every valid coordinate
//! maps to a non-negative integer before it is encrypted.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{GeofenceError, ProtocolConfig, Result};

/// 2^53; every integer up to here is exact in an `f64`.
const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    pub fn limit(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }

    fn offset(self, cfg: &ProtocolConfig) -> f64 {
        match self {
            Axis::Latitude => cfg.lat_offset,
            Axis::Longitude => cfg.lng_offset,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Latitude => f.write_str("latitude"),
            Axis::Longitude => f.write_str("longitude"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        GeoPoint { lat, lng }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lng)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedCoordinate(u64);

impl NormalizedCoordinate {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<NormalizedCoordinate> for rug::Integer {
    fn from(v: NormalizedCoordinate) -> Self {
        rug::Integer::from(v.0)
    }
}

/// `value * 10^decimal_places`, ties to even.
pub fn to_fixed(value: f64, decimal_places: u32) -> f64 {
    (value * 10f64.powi(decimal_places as i32)).round_ties_even()
}

pub fn normalize(axis: Axis, deg: f64, cfg: &ProtocolConfig) -> Result<NormalizedCoordinate> {
    let limit = axis.limit();
    let out_of_range = || GeofenceError::CoordinateOutOfRange {
        axis,
        degrees: deg,
        limit,
    };
    if !deg.is_finite() || deg.abs() > limit {
        return Err(out_of_range());
    }
    let fixed = to_fixed(deg + axis.offset(cfg), cfg.decimal_places);
    if fixed < 0.0 {
        return Err(out_of_range());
    }
    // past 2^53 neighbouring encodings collapse onto the same f64
    if fixed > MAX_EXACT {
        return Err(GeofenceError::InvalidConfig(format!(
            "{axis} offset {} with {} decimal places exceeds the exact fixed-point range",
            axis.offset(cfg),
            cfg.decimal_places
        )));
    }
    Ok(NormalizedCoordinate(fixed as u64))
}

pub fn normalize_lat(deg: f64, cfg: &ProtocolConfig) -> Result<NormalizedCoordinate> {
    normalize(Axis::Latitude, deg, cfg)
}

pub fn normalize_lng(deg: f64, cfg: &ProtocolConfig) -> Result<NormalizedCoordinate> {
    normalize(Axis::Longitude, deg, cfg)
}

pub fn normalize_point(
    p: GeoPoint,
    cfg: &ProtocolConfig,
) -> Result<(NormalizedCoordinate, NormalizedCoordinate)> {
    Ok((normalize_lat(p.lat, cfg)?, normalize_lng(p.lng, cfg)?))
}

/// Inverse transform: `value / 10^decimal_places - offset`.
pub fn denormalize(axis: Axis, v: NormalizedCoordinate, cfg: &ProtocolConfig) -> f64 {
    v.0 as f64 / cfg.scale() - axis.offset(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_map_range_to_non_negative() {
        let cfg = ProtocolConfig::default();
        assert_eq!(normalize_lat(-90.0, &cfg).unwrap().get(), 0);
        assert_eq!(normalize_lat(0.0, &cfg).unwrap().get(), 90_000);
        assert_eq!(normalize_lat(90.0, &cfg).unwrap().get(), 180_000);
        assert_eq!(normalize_lng(-180.0, &cfg).unwrap().get(), 0);
        assert_eq!(normalize_lng(180.0, &cfg).unwrap().get(), 360_000);
        assert_eq!(normalize_lat(39.222653, &cfg).unwrap().get(), 129_223);
        assert_eq!(normalize_lng(-105.343049, &cfg).unwrap().get(), 74_657);
    }

    #[test]
    fn inverse_is_within_half_a_unit() {
        let cfg = ProtocolConfig::default();
        let mut d = -90.0;
        while d <= 90.0 {
            let v = normalize_lat(d, &cfg).unwrap();
            assert!((denormalize(Axis::Latitude, v, &cfg) - d).abs() <= 0.0005 + 1e-9, "lat {d}");
            d += 0.0137;
        }
        let mut d = -180.0;
        while d <= 180.0 {
            let v = normalize_lng(d, &cfg).unwrap();
            assert!((denormalize(Axis::Longitude, v, &cfg) - d).abs() <= 0.0005 + 1e-9, "lng {d}");
            d += 0.0291;
        }
    }

    #[test]
    fn ties_round_to_even() {
        assert_eq!(to_fixed(2.5, 0), 2.0);
        assert_eq!(to_fixed(3.5, 0), 4.0);
        assert_eq!(to_fixed(0.125, 2), 12.0);
        assert_eq!(to_fixed(0.375, 2), 38.0);
        assert_eq!(to_fixed(-2.5, 0), -2.0);
    }

    #[test]
    fn decimal_places_come_from_config() {
        let cfg = ProtocolConfig { decimal_places: 1, ..Default::default() };
        // (0.25 + 90) * 10 = 902.5, tie to even
        assert_eq!(normalize_lat(0.25, &cfg).unwrap().get(), 902);
        // 907.5 rounds up to the even neighbour
        assert_eq!(normalize_lat(0.75, &cfg).unwrap().get(), 908);
    }

    #[test]
    fn encodings_beyond_exact_range_are_refused() {
        // huge offset: every latitude would otherwise saturate to one value
        let cfg = ProtocolConfig { lat_offset: 1e20, ..Default::default() };
        for deg in [10.0, -10.0] {
            assert!(matches!(normalize_lat(deg, &cfg), Err(GeofenceError::InvalidConfig(_))), "{deg}");
        }
        // decimal places that never went through validate()
        let cfg = ProtocolConfig { decimal_places: 30, ..Default::default() };
        assert!(matches!(normalize_lat(10.0, &cfg), Err(GeofenceError::InvalidConfig(_))));
        // 9 places is still exact: 360 * 10^9 < 2^53
        let cfg = ProtocolConfig { decimal_places: 9, ..Default::default() };
        assert_eq!(normalize_lng(180.0, &cfg).unwrap().get(), 360_000_000_000);
    }

    #[test]
    fn out_of_range_fails_before_encoding() {
        let cfg = ProtocolConfig::default();
        for bad in [90.0001, -90.5, f64::NAN, f64::INFINITY] {
            match normalize_lat(bad, &cfg) {
                Err(GeofenceError::CoordinateOutOfRange { axis: Axis::Latitude, .. }) => {}
                other => panic!("latitude {bad}: expected range error, got {other:?}"),
            }
        }
        assert!(matches!(
            normalize_lng(-180.5, &cfg),
            Err(GeofenceError::CoordinateOutOfRange { axis: Axis::Longitude, .. })
        ));
        // a shrunken offset turns part of the valid range negative
        let cfg = ProtocolConfig { lat_offset: 45.0, ..Default::default() };
        assert!(normalize_lat(-60.0, &cfg).is_err());
        assert!(normalize_lat(-45.0, &cfg).is_ok());
    }
}
