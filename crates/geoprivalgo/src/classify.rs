//! Decryption, signed decoding and containment verdicts.

use geoprivcrypto::{dec, decode_signed, Ciphertext, CryptoError, PaillierPrivateKey};
use rug::Integer;
use std::fmt;

use crate::evaluator::EvaluationResponse;
use crate::{GeofenceError, ProtocolConfig, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxisAlignedVerdict {
    Inside,
    BetweenLongitudeBoundaries,
    BetweenLatitudeBoundaries,
    Outside,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RotatedVerdict {
    Inside,
    OnBorder1Strip,
    OnBorder2Strip,
    Outside,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainmentVerdict {
    AxisAligned(AxisAlignedVerdict),
    Rotated(RotatedVerdict),
}

impl ContainmentVerdict {
    pub fn is_inside(&self) -> bool {
        matches!(
            self,
            ContainmentVerdict::AxisAligned(AxisAlignedVerdict::Inside)
                | ContainmentVerdict::Rotated(RotatedVerdict::Inside)
        )
    }
}

impl fmt::Display for AxisAlignedVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AxisAlignedVerdict::Inside => "inside",
            AxisAlignedVerdict::BetweenLongitudeBoundaries => "between longitude boundaries",
            AxisAlignedVerdict::BetweenLatitudeBoundaries => "between latitude boundaries",
            AxisAlignedVerdict::Outside => "outside",
        })
    }
}

impl fmt::Display for RotatedVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RotatedVerdict::Inside => "inside",
            RotatedVerdict::OnBorder1Strip => "on border 1 strip",
            RotatedVerdict::OnBorder2Strip => "on border 2 strip",
            RotatedVerdict::Outside => "outside",
        })
    }
}

impl fmt::Display for ContainmentVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainmentVerdict::AxisAligned(v) => v.fmt(f),
            ContainmentVerdict::Rotated(v) => v.fmt(f),
        }
    }
}

/// Signed border distances `c_b - coordinate`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BorderDistances {
    pub south: Integer,
    pub north: Integer,
    pub west: Integer,
    pub east: Integer,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projections {
    pub ap_dot_ab: Integer,
    pub ap_dot_ad: Integer,
    pub sq_ab: Integer,
    pub sq_ad: Integer,
}

/// Ties are inside: a distance of exactly zero satisfies both of its
/// inequalities.
pub fn classify_axis_aligned(d: &BorderDistances) -> AxisAlignedVerdict {
    let match_x = d.east >= 0 && d.west <= 0;
    let match_y = d.north >= 0 && d.south <= 0;
    match (match_x, match_y) {
        (true, true) => AxisAlignedVerdict::Inside,
        (true, false) => AxisAlignedVerdict::BetweenLongitudeBoundaries,
        (false, true) => AxisAlignedVerdict::BetweenLatitudeBoundaries,
        (false, false) => AxisAlignedVerdict::Outside,
    }
}

/// Inclusive at both ends: `0 <= AP.AB <= |AB|^2`, likewise for `AD`.
pub fn classify_rotated(p: &Projections) -> RotatedVerdict {
    let border1 = p.ap_dot_ab >= 0 && p.ap_dot_ab <= p.sq_ab;
    let border2 = p.ap_dot_ad >= 0 && p.ap_dot_ad <= p.sq_ad;
    match (border1, border2) {
        (true, true) => RotatedVerdict::Inside,
        (true, false) => RotatedVerdict::OnBorder1Strip,
        (false, true) => RotatedVerdict::OnBorder2Strip,
        (false, false) => RotatedVerdict::Outside,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedResponse {
    AxisAligned(BorderDistances),
    Rotated(Projections),
}

impl DecodedResponse {
    pub fn classify(&self) -> ContainmentVerdict {
        match self {
            DecodedResponse::AxisAligned(d) => ContainmentVerdict::AxisAligned(classify_axis_aligned(d)),
            DecodedResponse::Rotated(p) => ContainmentVerdict::Rotated(classify_rotated(p)),
        }
    }
}

pub struct ResponseDecoder<'a> {
    sk: &'a PaillierPrivateKey,
    config: &'a ProtocolConfig,
}

impl<'a> ResponseDecoder<'a> {
    pub fn new(sk: &'a PaillierPrivateKey, config: &'a ProtocolConfig) -> Self {
        ResponseDecoder { sk, config }
    }

    fn signed(&self, field: &'static str, c: &Ciphertext) -> Result<Integer> {
        let residue = dec(self.sk, c)?;
        decode_signed(residue, &self.sk.n(), self.config.magnitude_bits).map_err(|e| match e {
            CryptoError::RangeOverflow { magnitude_bits } => {
                GeofenceError::RangeOverflow { field, magnitude_bits }
            }
            other => other.into(),
        })
    }

    /// Decode every encrypted field of a reply. When not a single field
    /// lands inside the signed window the reply was almost certainly
    /// computed under a different key of the same size (such values still
    /// pass `Ciphertext::from_wire`), so that case is a key mismatch rather
    /// than a range overflow.
    fn signed_fields<const N: usize>(&self, fields: [(&'static str, &Ciphertext); N]) -> Result<[Integer; N]> {
        let decoded: Vec<Result<Integer>> = fields.iter().map(|&(name, c)| self.signed(name, c)).collect();
        if decoded
            .iter()
            .all(|r| matches!(r, Err(GeofenceError::RangeOverflow { .. })))
        {
            return Err(GeofenceError::KeyMismatch(
                "no reply field decodes inside the signed window".into(),
            ));
        }
        let values = decoded.into_iter().collect::<Result<Vec<_>>>()?;
        values
            .try_into()
            .map_err(|_| GeofenceError::MalformedResponse("reply field count changed while decoding".into()))
    }

    pub fn decode(&self, resp: &EvaluationResponse) -> Result<DecodedResponse> {
        Ok(match resp {
            EvaluationResponse::AxisAligned { south, north, west, east } => {
                let [south, north, west, east] = self.signed_fields([
                    ("south", south),
                    ("north", north),
                    ("west", west),
                    ("east", east),
                ])?;
                DecodedResponse::AxisAligned(BorderDistances { south, north, west, east })
            }
            EvaluationResponse::Rotated { ap_dot_ab, ap_dot_ad, sq_ab, sq_ad } => {
                let [ap_dot_ab, ap_dot_ad] =
                    self.signed_fields([("ap_dot_ab", ap_dot_ab), ("ap_dot_ad", ap_dot_ad)])?;
                DecodedResponse::Rotated(Projections {
                    ap_dot_ab,
                    ap_dot_ad,
                    sq_ab: sq_ab.clone(),
                    sq_ad: sq_ad.clone(),
                })
            }
        })
    }

    pub fn classify(&self, resp: &EvaluationResponse) -> Result<ContainmentVerdict> {
        Ok(self.decode(resp)?.classify())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoprivcrypto::{enc, keygen};

    fn dist(south: i64, north: i64, west: i64, east: i64) -> BorderDistances {
        BorderDistances {
            south: south.into(),
            north: north.into(),
            west: west.into(),
            east: east.into(),
        }
    }

    fn proj(ab: i64, ad: i64, sq_ab: i64, sq_ad: i64) -> Projections {
        Projections {
            ap_dot_ab: ab.into(),
            ap_dot_ad: ad.into(),
            sq_ab: sq_ab.into(),
            sq_ad: sq_ad.into(),
        }
    }

    #[test]
    fn axis_aligned_table() {
        use AxisAlignedVerdict::*;
        let cases = [
            (dist(-5, 5, -5, 5), Inside),
            (dist(0, 0, 0, 0), Inside),
            (dist(-5, 5, 1, 5), BetweenLatitudeBoundaries),
            (dist(-5, 5, -5, -1), BetweenLatitudeBoundaries),
            (dist(1, 5, -5, 5), BetweenLongitudeBoundaries),
            (dist(-5, -1, -5, 5), BetweenLongitudeBoundaries),
            (dist(1, 5, 1, 5), Outside),
            (dist(-9, -1, -9, -1), Outside),
        ];
        for (d, want) in cases {
            assert_eq!(classify_axis_aligned(&d), want, "{d:?}");
        }
    }

    #[test]
    fn rotated_table() {
        use RotatedVerdict::*;
        let cases = [
            (proj(5, 5, 10, 10), Inside),
            (proj(0, 0, 10, 10), Inside),
            (proj(10, 10, 10, 10), Inside),
            (proj(5, 11, 10, 10), OnBorder1Strip),
            (proj(5, -1, 10, 10), OnBorder1Strip),
            (proj(-1, 5, 10, 10), OnBorder2Strip),
            (proj(11, 5, 10, 10), OnBorder2Strip),
            (proj(-1, 11, 10, 10), Outside),
        ];
        for (p, want) in cases {
            assert_eq!(classify_rotated(&p), want, "{p:?}");
        }
    }

    #[test]
    fn decoder_recovers_negative_distances() {
        let mut rng = rand::thread_rng();
        let (pk, sk) = keygen(512, &mut rng).unwrap();
        let cfg = ProtocolConfig::default();
        let e = |v: i64| enc(&pk, &Integer::from(v), &mut rand::thread_rng()).unwrap();
        let resp = EvaluationResponse::AxisAligned {
            south: e(-2231),
            north: e(1777),
            west: e(-3657),
            east: e(3343),
        };
        let decoded = ResponseDecoder::new(&sk, &cfg).decode(&resp).unwrap();
        assert_eq!(decoded, DecodedResponse::AxisAligned(dist(-2231, 1777, -3657, 3343)));
        assert!(decoded.classify().is_inside());
    }

    #[test]
    fn ambiguous_residue_names_the_field() {
        let mut rng = rand::thread_rng();
        let (pk, sk) = keygen(512, &mut rng).unwrap();
        let cfg = ProtocolConfig::default();
        let half = Integer::from(pk.n() >> 1u32);
        let resp = EvaluationResponse::Rotated {
            ap_dot_ab: enc(&pk, &Integer::from(1), &mut rng).unwrap(),
            ap_dot_ad: enc(&pk, &half, &mut rng).unwrap(),
            sq_ab: Integer::from(10),
            sq_ad: Integer::from(10),
        };
        match ResponseDecoder::new(&sk, &cfg).classify(&resp) {
            Err(GeofenceError::RangeOverflow { field: "ap_dot_ad", magnitude_bits: 64 }) => {}
            other => panic!("expected range overflow, got {other:?}"),
        }
    }

    #[test]
    fn reply_with_no_decodable_field_is_a_key_mismatch() {
        let mut rng = rand::thread_rng();
        let (pk, sk) = keygen(512, &mut rng).unwrap();
        let cfg = ProtocolConfig::default();
        let half = Integer::from(pk.n() >> 1u32);
        let resp = EvaluationResponse::Rotated {
            ap_dot_ab: enc(&pk, &half, &mut rng).unwrap(),
            ap_dot_ad: enc(&pk, &(half.clone() + 7u32), &mut rng).unwrap(),
            sq_ab: Integer::from(10),
            sq_ad: Integer::from(10),
        };
        assert!(matches!(
            ResponseDecoder::new(&sk, &cfg).decode(&resp),
            Err(GeofenceError::KeyMismatch(_))
        ));
    }

    #[test]
    fn verdicts_render_readably() {
        let v = ContainmentVerdict::AxisAligned(AxisAlignedVerdict::BetweenLongitudeBoundaries);
        assert_eq!(v.to_string(), "between longitude boundaries");
        assert!(!v.is_inside());
        assert_eq!(ContainmentVerdict::Rotated(RotatedVerdict::OnBorder2Strip).to_string(), "on border 2 strip");
    }
}
