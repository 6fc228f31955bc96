//! The evaluator contract.
//!
//! An evaluator receives the client's public key and an encrypted query and
//! returns encrypted border distances or projections. It never holds the
//! private key; any implementation (in-process, HTTP, a test double) only
//! performs homomorphic additions and plaintext scalings.

use geoprivcrypto::{Ciphertext, KeyId, PaillierPublicKey};
use geoprivproto::{AxisAlignedReply, RotatedReply, Shape, WireReply};
use rug::Integer;

use crate::query::GeofenceQuery;
use crate::{GeofenceError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvaluationResponse {
    /// Border distances `c_b - coordinate`.
    AxisAligned {
        south: Ciphertext,
        north: Ciphertext,
        west: Ciphertext,
        east: Ciphertext,
    },
    /// Encrypted projections of `AP` onto both edges, with the plaintext
    /// squared edge lengths.
    Rotated {
        ap_dot_ab: Ciphertext,
        ap_dot_ad: Ciphertext,
        sq_ab: Integer,
        sq_ad: Integer,
    },
}

impl EvaluationResponse {
    pub fn shape(&self) -> Shape {
        match self {
            EvaluationResponse::AxisAligned { .. } => Shape::AxisAligned,
            EvaluationResponse::Rotated { .. } => Shape::Rotated,
        }
    }

    pub fn to_wire(&self, key: Option<KeyId>) -> WireReply {
        let key = key.map(|k| k.to_hex());
        match self {
            EvaluationResponse::AxisAligned { south, north, west, east } => {
                WireReply::AxisAligned(AxisAlignedReply {
                    lat: south.to_integer(),
                    lat2: north.to_integer(),
                    lng: west.to_integer(),
                    lng2: east.to_integer(),
                    key,
                })
            }
            EvaluationResponse::Rotated { ap_dot_ab, ap_dot_ad, sq_ab, sq_ad } => {
                WireReply::Rotated(RotatedReply {
                    e_ap_dot_ab: ap_dot_ab.to_integer(),
                    e_ap_dot_ad: ap_dot_ad.to_integer(),
                    sq_ab: sq_ab.clone(),
                    sq_ad: sq_ad.clone(),
                    key,
                })
            }
        }
    }

    /// Client side: bind a parsed reply to the client's own key. A `key`
    /// echo naming another key, or a value outside `Z*_{n^2}`, is a key
    /// mismatch.
    pub fn from_wire(pk: &PaillierPublicKey, reply: &WireReply) -> Result<Self> {
        if let Some(echo) = reply.key() {
            let echoed = KeyId::from_hex(echo)
                .map_err(|e| GeofenceError::MalformedResponse(e.to_string()))?;
            let ours = pk.key_id();
            if echoed != ours {
                return Err(GeofenceError::KeyMismatch(format!(
                    "evaluator computed under key {echoed}, session key is {ours}"
                )));
            }
        }
        let ct = |raw: &Integer| Ciphertext::from_wire(pk, raw).map_err(GeofenceError::from);
        Ok(match reply {
            WireReply::AxisAligned(r) => EvaluationResponse::AxisAligned {
                south: ct(&r.lat)?,
                north: ct(&r.lat2)?,
                west: ct(&r.lng)?,
                east: ct(&r.lng2)?,
            },
            WireReply::Rotated(r) => {
                if r.sq_ab.is_negative() || r.sq_ad.is_negative() {
                    return Err(GeofenceError::MalformedResponse(
                        "squared edge lengths must be non-negative".into(),
                    ));
                }
                EvaluationResponse::Rotated {
                    ap_dot_ab: ct(&r.e_ap_dot_ab)?,
                    ap_dot_ad: ct(&r.e_ap_dot_ad)?,
                    sq_ab: r.sq_ab.clone(),
                    sq_ad: r.sq_ad.clone(),
                }
            }
        })
    }
}

pub trait Evaluator {
    fn evaluate(&mut self, pk: &PaillierPublicKey, query: &GeofenceQuery) -> Result<EvaluationResponse>;
}

impl<E: Evaluator + ?Sized> Evaluator for &mut E {
    fn evaluate(&mut self, pk: &PaillierPublicKey, query: &GeofenceQuery) -> Result<EvaluationResponse> {
        (**self).evaluate(pk, query)
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(&mut self, pk: &PaillierPublicKey, query: &GeofenceQuery) -> Result<EvaluationResponse> {
        (**self).evaluate(pk, query)
    }
}
