use serde::{Deserialize, Serialize};

use crate::{GeofenceError, Result};

/// Offsets beyond one full turn only push encodings towards the exact-f64 limit.
pub const MAX_OFFSET: f64 = 360.0;

/// Encoding and decoding parameters shared by the query builder and the
/// response decoder. Both parties must agree on `decimal_places` and the
/// offsets; `magnitude_bits` is the client's signed window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub decimal_places: u32,
    pub lat_offset: f64,
    pub lng_offset: f64,
    pub magnitude_bits: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            decimal_places: 3,
            lat_offset: 90.0,
            lng_offset: 180.0,
            magnitude_bits: 64,
        }
    }
}

impl ProtocolConfig {
    pub fn scale(&self) -> f64 {
        10f64.powi(self.decimal_places as i32)
    }

    pub fn validate(&self) -> Result<()> {
        if self.decimal_places > 9 {
            return Err(GeofenceError::InvalidConfig(format!(
                "{} decimal places exceeds the supported 9",
                self.decimal_places
            )));
        }
        for (name, offset) in [("lat_offset", self.lat_offset), ("lng_offset", self.lng_offset)] {
            if !offset.is_finite() || !(0.0..=MAX_OFFSET).contains(&offset) {
                return Err(GeofenceError::InvalidConfig(format!(
                    "{name} must lie in [0, {MAX_OFFSET}]"
                )));
            }
        }
        if self.magnitude_bits == 0 || self.magnitude_bits > 1024 {
            return Err(GeofenceError::InvalidConfig(format!(
                "magnitude_bits {} out of range",
                self.magnitude_bits
            )));
        }
        Ok(())
    }
}
