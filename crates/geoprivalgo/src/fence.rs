//! Geofence definitions and the in-process reference evaluator.
//!
//! Fences are written in degrees and compiled to fixed-point integers with
//! the same [`ProtocolConfig`] the client normalizes with. The axis-aligned
//! fence is a pair of bands: `x` runs along the first query coordinate
//! (latitude) and is reported in the `west`/`east` distances, `y` runs
//! along the second (longitude) and is reported in `south`/`north`.

use geoprivcrypto::{add, add_plain, mul_plain, rerandomize, Ciphertext, PaillierPublicKey};
use rug::Integer;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::classify::{BorderDistances, Projections};
use crate::evaluator::{EvaluationResponse, Evaluator};
use crate::normalize::{normalize, normalize_point, Axis, GeoPoint};
use crate::query::{EncryptedPoint, GeofenceQuery};
use crate::{GeofenceError, ProtocolConfig, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisAlignedFence {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// Oriented rectangle: corner `origin` and edge vectors `ab`, `ad` in
/// fixed-point units, components ordered `(lat, lng)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotatedFence {
    pub origin: GeoPoint,
    pub ab: [i64; 2],
    pub ad: [i64; 2],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FenceSet {
    pub axis_aligned: AxisAlignedFence,
    pub rotated: RotatedFence,
}

impl FenceSet {
    /// The Colorado demo fences.
    pub fn colorado() -> Self {
        FenceSet {
            axis_aligned: AxisAlignedFence {
                x_min: 37.0,
                x_max: 41.0,
                y_min: -109.05,
                y_max: -102.05,
            },
            rotated: RotatedFence {
                origin: GeoPoint::new(37.0, -109.0),
                ab: [4000, 1000],
                ad: [-1750, 7000],
            },
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| GeofenceError::InvalidFence(format!("{}: {e}", path.display())))?;
        serde_json::from_slice(&data)
            .map_err(|e| GeofenceError::InvalidFence(format!("{}: {e}", path.display())))
    }

    /// Border distances for a plaintext point, without encryption.
    pub fn plain_distances(&self, p: GeoPoint, cfg: &ProtocolConfig) -> Result<BorderDistances> {
        let b = Bands::compile(&self.axis_aligned, cfg)?;
        let (x, y) = normalize_point(p, cfg)?;
        let (x, y) = (Integer::from(x), Integer::from(y));
        Ok(BorderDistances {
            south: Integer::from(&b.south - &y),
            north: Integer::from(&b.north - &y),
            west: Integer::from(&b.west - &x),
            east: Integer::from(&b.east - &x),
        })
    }

    /// Projections of `AP` for a plaintext point, without encryption.
    pub fn plain_projections(&self, p: GeoPoint, cfg: &ProtocolConfig) -> Result<Projections> {
        let r = Rectangle::compile(&self.rotated, cfg)?;
        let (lat, lng) = normalize_point(p, cfg)?;
        let ap = [
            Integer::from(lat) - &r.origin[0],
            Integer::from(lng) - &r.origin[1],
        ];
        let dot = |u: &[Integer; 2]| Integer::from(&ap[0] * &u[0]) + Integer::from(&ap[1] * &u[1]);
        Ok(Projections {
            ap_dot_ab: dot(&r.ab),
            ap_dot_ad: dot(&r.ad),
            sq_ab: r.sq_ab.clone(),
            sq_ad: r.sq_ad.clone(),
        })
    }
}

// Fixed-point border constants.
#[derive(Clone, Debug)]
struct Bands {
    west: Integer,
    east: Integer,
    south: Integer,
    north: Integer,
}

impl Bands {
    fn compile(f: &AxisAlignedFence, cfg: &ProtocolConfig) -> Result<Self> {
        let fixed = |axis: Axis, deg: f64| -> Result<Integer> {
            normalize(axis, deg, cfg)
                .map(Integer::from)
                .map_err(|e| GeofenceError::InvalidFence(e.to_string()))
        };
        let b = Bands {
            west: fixed(Axis::Latitude, f.x_min)?,
            east: fixed(Axis::Latitude, f.x_max)?,
            south: fixed(Axis::Longitude, f.y_min)?,
            north: fixed(Axis::Longitude, f.y_max)?,
        };
        if b.west > b.east || b.south > b.north {
            return Err(GeofenceError::InvalidFence(
                "band minimum exceeds its maximum".into(),
            ));
        }
        Ok(b)
    }
}

#[derive(Clone, Debug)]
struct Rectangle {
    origin: [Integer; 2],
    ab: [Integer; 2],
    ad: [Integer; 2],
    sq_ab: Integer,
    sq_ad: Integer,
    // -A.AB and -A.AD, folded in with add_plain
    shift_ab: Integer,
    shift_ad: Integer,
}

impl Rectangle {
    fn compile(f: &RotatedFence, cfg: &ProtocolConfig) -> Result<Self> {
        let (lat, lng) = normalize_point(f.origin, cfg)
            .map_err(|e| GeofenceError::InvalidFence(format!("origin: {e}")))?;
        let origin = [Integer::from(lat), Integer::from(lng)];
        let ab = f.ab.map(Integer::from);
        let ad = f.ad.map(Integer::from);
        let dot = |u: &[Integer; 2], v: &[Integer; 2]| {
            Integer::from(&u[0] * &v[0]) + Integer::from(&u[1] * &v[1])
        };
        let sq_ab = dot(&ab, &ab);
        let sq_ad = dot(&ad, &ad);
        if sq_ab == 0 || sq_ad == 0 {
            return Err(GeofenceError::InvalidFence("edge vectors must be nonzero".into()));
        }
        if dot(&ab, &ad) != 0 {
            return Err(GeofenceError::InvalidFence(format!(
                "edges {:?} and {:?} are not orthogonal",
                f.ab, f.ad
            )));
        }
        // |AP.u| over the whole coordinate domain, with |AP_lat| <= 180
        // and |AP_lng| <= 360 degrees in fixed point; it has to decode
        // inside the client's signed window for every point on earth
        let scale = Integer::from(Integer::u_pow_u(10, cfg.decimal_places));
        let span = [Integer::from(&scale * 180u32), Integer::from(&scale * 360u32)];
        let worst = |u: &[Integer; 2]| {
            Integer::from(&span[0] * &u[0]).abs() + Integer::from(&span[1] * &u[1]).abs()
        };
        let window = Integer::from(1) << cfg.magnitude_bits;
        for (name, u, sq) in [("ab", &ab, &sq_ab), ("ad", &ad, &sq_ad)] {
            if *sq >= window || worst(u) >= window {
                return Err(GeofenceError::InvalidFence(format!(
                    "edge {name} is too long for a {}-bit signed window at {} decimal places",
                    cfg.magnitude_bits, cfg.decimal_places
                )));
            }
        }
        let shift_ab = -dot(&origin, &ab);
        let shift_ad = -dot(&origin, &ad);
        Ok(Rectangle { origin, ab, ad, sq_ab, sq_ad, shift_ab, shift_ad })
    }
}

/// Evaluates both fence shapes in-process. Returned ciphertexts are
/// re-randomized and replies carry the key fingerprint they were computed
/// under.
#[derive(Clone, Debug)]
pub struct LocalEvaluator {
    bands: Bands,
    rect: Rectangle,
}

impl LocalEvaluator {
    pub fn new(fences: &FenceSet, cfg: &ProtocolConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(LocalEvaluator {
            bands: Bands::compile(&fences.axis_aligned, cfg)?,
            rect: Rectangle::compile(&fences.rotated, cfg)?,
        })
    }

    /// `&self` so a single instance can serve concurrent requests.
    pub fn evaluate_query(&self, pk: &PaillierPublicKey, query: &GeofenceQuery) -> Result<EvaluationResponse> {
        let mut rng = rand::thread_rng();
        let mut fresh = |c: Ciphertext| rerandomize(pk, &c, &mut rng);
        tracing::debug!(key = %pk.key_id(), shape = %query.shape(), "evaluating query");
        let resp = match query {
            GeofenceQuery::AxisAligned(p) => {
                let b = &self.bands;
                let neg_x = mul_plain(pk, &p.lat, &Integer::from(-1))?;
                let neg_y = mul_plain(pk, &p.lng, &Integer::from(-1))?;
                EvaluationResponse::AxisAligned {
                    south: fresh(add_plain(pk, &neg_y, &b.south)?)?,
                    north: fresh(add_plain(pk, &neg_y, &b.north)?)?,
                    west: fresh(add_plain(pk, &neg_x, &b.west)?)?,
                    east: fresh(add_plain(pk, &neg_x, &b.east)?)?,
                }
            }
            GeofenceQuery::Rotated(p) => {
                let r = &self.rect;
                EvaluationResponse::Rotated {
                    ap_dot_ab: fresh(project(pk, p, &r.ab, &r.shift_ab)?)?,
                    ap_dot_ad: fresh(project(pk, p, &r.ad, &r.shift_ad)?)?,
                    sq_ab: r.sq_ab.clone(),
                    sq_ad: r.sq_ad.clone(),
                }
            }
        };
        Ok(resp)
    }
}

// E(P.u) + shift, where shift = -A.u
fn project(pk: &PaillierPublicKey, p: &EncryptedPoint, u: &[Integer; 2], shift: &Integer) -> Result<Ciphertext> {
    let lat = mul_plain(pk, &p.lat, &u[0])?;
    let lng = mul_plain(pk, &p.lng, &u[1])?;
    Ok(add_plain(pk, &add(pk, &lat, &lng)?, shift)?)
}

impl Evaluator for LocalEvaluator {
    fn evaluate(&mut self, pk: &PaillierPublicKey, query: &GeofenceQuery) -> Result<EvaluationResponse> {
        self.evaluate_query(pk, query)
    }
}
