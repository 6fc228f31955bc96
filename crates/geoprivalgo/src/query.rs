//! Client-side construction of encrypted geofence queries.

use geoprivcrypto::{enc, Ciphertext, PaillierPublicKey};
use geoprivproto::{Shape, WireQuery};
use rand::RngCore;
use rug::Integer;

use crate::normalize::{normalize_point, GeoPoint};
use crate::{ProtocolConfig, Result};

/// Encrypted, normalized coordinates of the query point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedPoint {
    pub lat: Ciphertext,
    pub lng: Ciphertext,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeofenceQuery {
    AxisAligned(EncryptedPoint),
    Rotated(EncryptedPoint),
}

impl GeofenceQuery {
    pub fn new(shape: Shape, point: EncryptedPoint) -> Self {
        match shape {
            Shape::AxisAligned => GeofenceQuery::AxisAligned(point),
            Shape::Rotated => GeofenceQuery::Rotated(point),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            GeofenceQuery::AxisAligned(_) => Shape::AxisAligned,
            GeofenceQuery::Rotated(_) => Shape::Rotated,
        }
    }

    pub fn point(&self) -> &EncryptedPoint {
        match self {
            GeofenceQuery::AxisAligned(p) | GeofenceQuery::Rotated(p) => p,
        }
    }

    pub fn to_wire(&self, pk: &PaillierPublicKey) -> WireQuery {
        let p = self.point();
        WireQuery::new(pk, &p.lat, &p.lng)
    }

    /// Evaluator side: rebuild the public key and the query from the wire.
    pub fn from_wire(shape: Shape, wire: &WireQuery) -> Result<(PaillierPublicKey, GeofenceQuery)> {
        let pk = wire.public_key()?;
        let (lat, lng) = wire.ciphertexts(&pk)?;
        Ok((pk, GeofenceQuery::new(shape, EncryptedPoint { lat, lng })))
    }
}

pub struct QueryBuilder<'a> {
    pk: &'a PaillierPublicKey,
    config: &'a ProtocolConfig,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(pk: &'a PaillierPublicKey, config: &'a ProtocolConfig) -> Self {
        QueryBuilder { pk, config }
    }

    /// Normalize then encrypt. Range violations fail here, before any
    /// ciphertext exists.
    pub fn encrypt_point(&self, point: GeoPoint, rng: &mut impl RngCore) -> Result<EncryptedPoint> {
        let (lat, lng) = normalize_point(point, self.config)?;
        Ok(EncryptedPoint {
            lat: enc(self.pk, &Integer::from(lat), rng)?,
            lng: enc(self.pk, &Integer::from(lng), rng)?,
        })
    }

    pub fn build(&self, shape: Shape, point: GeoPoint, rng: &mut impl RngCore) -> Result<GeofenceQuery> {
        Ok(GeofenceQuery::new(shape, self.encrypt_point(point, rng)?))
    }
}
