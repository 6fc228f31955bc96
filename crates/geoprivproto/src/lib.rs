//! Wire types for the geofence protocol.
//!
//! Requests are HTTP GETs whose query string carries the public key
//! `(g, n)` and the two coordinate ciphertexts as decimal integers. Replies
//! are JSON objects whose integer fields may be far wider than 64 bits; they
//! are written as JSON numbers and read back from either numbers or strings.

use geoprivcrypto::{Ciphertext, CryptoError, PaillierPublicKey};
use rug::Integer;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const AXIS_ALIGNED_PATH: &str = "/calculate";
pub const ROTATED_PATH: &str = "/calculate_rotated";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    AxisAligned,
    Rotated,
}

impl Shape {
    pub const ALL: [Shape; 2] = [Shape::AxisAligned, Shape::Rotated];

    pub fn path(self) -> &'static str {
        match self {
            Shape::AxisAligned => AXIS_ALIGNED_PATH,
            Shape::Rotated => ROTATED_PATH,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::AxisAligned => f.write_str("aligned"),
            Shape::Rotated => f.write_str("rotated"),
        }
    }
}

/// Query parameters shared by both endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireQuery {
    #[serde(with = "decimal")]
    pub g: Integer,
    #[serde(with = "decimal")]
    pub n: Integer,
    #[serde(with = "decimal")]
    pub lat: Integer,
    #[serde(with = "decimal")]
    pub lng: Integer,
}

impl WireQuery {
    pub fn new(pk: &PaillierPublicKey, lat: &Ciphertext, lng: &Ciphertext) -> Self {
        WireQuery {
            g: pk.g(),
            n: pk.n(),
            lat: lat.to_integer(),
            lng: lng.to_integer(),
        }
    }

    pub fn public_key(&self) -> Result<PaillierPublicKey, CryptoError> {
        PaillierPublicKey::from_parts(&self.n, &self.g)
    }

    /// The `(lat, lng)` ciphertexts bound to `pk`.
    pub fn ciphertexts(&self, pk: &PaillierPublicKey) -> Result<(Ciphertext, Ciphertext), CryptoError> {
        Ok((
            Ciphertext::from_wire(pk, &self.lat)?,
            Ciphertext::from_wire(pk, &self.lng)?,
        ))
    }
}

/// Axis-aligned reply: border distances `c_b - coordinate`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisAlignedReply {
    /// south
    #[serde(with = "json_int")]
    pub lat: Integer,
    /// north
    #[serde(with = "json_int")]
    pub lat2: Integer,
    /// west
    #[serde(with = "json_int")]
    pub lng: Integer,
    /// east
    #[serde(with = "json_int")]
    pub lng2: Integer,
    /// Hex fingerprint of the key the evaluator computed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Rotated reply: encrypted projections plus the plaintext squared edge lengths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatedReply {
    #[serde(rename = "e_AP_dot_AB", with = "json_int")]
    pub e_ap_dot_ab: Integer,
    #[serde(rename = "e_AP_dot_AD", with = "json_int")]
    pub e_ap_dot_ad: Integer,
    #[serde(rename = "sq_AB", with = "json_int")]
    pub sq_ab: Integer,
    #[serde(rename = "sq_AD", with = "json_int")]
    pub sq_ad: Integer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireReply {
    AxisAligned(AxisAlignedReply),
    Rotated(RotatedReply),
}

impl WireReply {
    /// Parse a JSON body as the reply expected from `shape`'s endpoint.
    pub fn parse(shape: Shape, body: &[u8]) -> serde_json::Result<Self> {
        Ok(match shape {
            Shape::AxisAligned => WireReply::AxisAligned(serde_json::from_slice(body)?),
            Shape::Rotated => WireReply::Rotated(serde_json::from_slice(body)?),
        })
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            WireReply::AxisAligned(r) => serde_json::to_vec(r),
            WireReply::Rotated(r) => serde_json::to_vec(r),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            WireReply::AxisAligned(_) => Shape::AxisAligned,
            WireReply::Rotated(_) => Shape::Rotated,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            WireReply::AxisAligned(r) => r.key.as_deref(),
            WireReply::Rotated(r) => r.key.as_deref(),
        }
    }
}

/// Big integers as decimal strings (query strings).
pub mod decimal {
    use rug::Integer;
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(v: &Integer, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Integer, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        parse(&s).map_err(D::Error::custom)
    }

    pub(crate) fn parse(s: &str) -> Result<Integer, String> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().enumerate().all(|(i, b)| b.is_ascii_digit() || (i == 0 && b == b'-')) {
            return Err(format!("not a decimal integer: {s:?}"));
        }
        s.parse::<Integer>().map_err(|e| format!("not a decimal integer: {e}"))
    }
}

/// Big integers as JSON numbers; decimal strings are accepted on input.
pub mod json_int {
    use rug::Integer;
    use serde::de::Error as DeError;
    use serde::ser::Error as SerError;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::{Number, Value};
    use std::str::FromStr;

    pub fn serialize<S>(v: &Integer, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let num = Number::from_str(&v.to_string()).map_err(S::Error::custom)?;
        num.serialize(s)
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Integer, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(d)? {
            Value::Number(n) => super::decimal::parse(&n.to_string()).map_err(D::Error::custom),
            Value::String(s) => super::decimal::parse(&s).map_err(D::Error::custom),
            other => Err(D::Error::custom(format!("expected an integer, got {other}"))),
        }
    }
}
