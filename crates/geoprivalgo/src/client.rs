//! A client session: one keypair, one config, one evaluator.

use geoprivcrypto::signed::check_window;
use geoprivcrypto::{keygen, PaillierPrivateKey, PaillierPublicKey};
use rand::RngCore;

use crate::classify::{ContainmentVerdict, ResponseDecoder};
use crate::evaluator::Evaluator;
use crate::normalize::GeoPoint;
use crate::query::QueryBuilder;
use crate::{GeofenceError, ProtocolConfig, Result, Shape};

pub struct GeofenceClient<E: Evaluator> {
    pk: PaillierPublicKey,
    sk: PaillierPrivateKey,
    config: ProtocolConfig,
    evaluator: E,
}

impl<E: Evaluator> GeofenceClient<E> {
    pub fn new(pk: PaillierPublicKey, sk: PaillierPrivateKey, config: ProtocolConfig, evaluator: E) -> Result<Self> {
        if sk.key_id() != pk.key_id() {
            return Err(GeofenceError::KeyMismatch(format!(
                "private key {} does not belong to public key {}",
                sk.key_id(),
                pk.key_id()
            )));
        }
        config.validate()?;
        check_window(config.magnitude_bits, &pk.n())?;
        Ok(GeofenceClient { pk, sk, config, evaluator })
    }

    /// Fresh keypair of `bits` bits.
    pub fn generate(bits: u32, config: ProtocolConfig, evaluator: E, rng: &mut impl RngCore) -> Result<Self> {
        let (pk, sk) = keygen(bits, rng)?;
        Self::new(pk, sk, config, evaluator)
    }

    pub fn public_key(&self) -> &PaillierPublicKey {
        &self.pk
    }

    pub fn evaluator_mut(&mut self) -> &mut E {
        &mut self.evaluator
    }

    /// Encrypt `point`, have the evaluator test it against `shape` and
    /// classify the decrypted reply.
    pub fn check(&mut self, shape: Shape, point: GeoPoint) -> Result<ContainmentVerdict> {
        let mut rng = rand::thread_rng();
        let query = QueryBuilder::new(&self.pk, &self.config).build(shape, point, &mut rng)?;
        tracing::debug!(%shape, key = %self.pk.key_id(), "submitting query");
        let resp = self.evaluator.evaluate(&self.pk, &query)?;
        if resp.shape() != shape {
            return Err(GeofenceError::MalformedResponse(format!(
                "asked for a {shape} evaluation, got {}",
                resp.shape()
            )));
        }
        ResponseDecoder::new(&self.sk, &self.config).classify(&resp)
    }

    /// Axis-aligned then rotated.
    pub fn check_both(&mut self, point: GeoPoint) -> Result<(ContainmentVerdict, ContainmentVerdict)> {
        Ok((
            self.check(Shape::AxisAligned, point)?,
            self.check(Shape::Rotated, point)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvaluationResponse;
    use crate::fence::{FenceSet, LocalEvaluator};
    use crate::fixtures::{COLORADO, KANSAS, NEW_MEXICO, OUTSIDE};
    use crate::query::GeofenceQuery;
    use crate::{AxisAlignedVerdict as A, RotatedVerdict as R};
    use geoprivcrypto::enc;
    use rug::Integer;

    fn session<E: Evaluator>(evaluator: E) -> GeofenceClient<E> {
        GeofenceClient::generate(512, ProtocolConfig::default(), evaluator, &mut rand::thread_rng()).unwrap()
    }

    fn colorado() -> LocalEvaluator {
        LocalEvaluator::new(&FenceSet::colorado(), &ProtocolConfig::default()).unwrap()
    }

    fn aligned(v: A) -> ContainmentVerdict {
        ContainmentVerdict::AxisAligned(v)
    }

    fn rotated(v: R) -> ContainmentVerdict {
        ContainmentVerdict::Rotated(v)
    }

    #[test]
    fn demo_points_against_both_shapes() {
        let mut c = session(colorado());
        let cases = [
            (OUTSIDE, A::Outside, R::Outside),
            (KANSAS, A::BetweenLongitudeBoundaries, R::OnBorder1Strip),
            (NEW_MEXICO, A::BetweenLatitudeBoundaries, R::OnBorder2Strip),
            (COLORADO, A::Inside, R::Inside),
        ];
        for (demo, want_aligned, want_rotated) in cases {
            let (got_aligned, got_rotated) = c.check_both(demo.point).unwrap();
            assert_eq!(got_aligned, aligned(want_aligned), "{}", demo.label);
            assert_eq!(got_rotated, rotated(want_rotated), "{}", demo.label);
        }
    }

    #[test]
    fn verdict_flips_exactly_at_the_border() {
        let mut c = session(colorado());
        let lng = COLORADO.point.lng;
        for i in -3..=3 {
            let lat = 37.0 + f64::from(i) * 0.001;
            let want = if i < 0 { A::BetweenLatitudeBoundaries } else { A::Inside };
            assert_eq!(c.check(Shape::AxisAligned, GeoPoint::new(lat, lng)).unwrap(), aligned(want), "lat {lat}");
        }
        for i in -2..=2 {
            let lat = 41.0 + f64::from(i) * 0.001;
            let want = if i > 0 { A::BetweenLatitudeBoundaries } else { A::Inside };
            assert_eq!(c.check(Shape::AxisAligned, GeoPoint::new(lat, lng)).unwrap(), aligned(want), "lat {lat}");
        }
    }

    #[test]
    fn rectangle_corners_are_inside() {
        let mut c = session(colorado());
        // A itself: both projections are exactly zero
        assert_eq!(c.check(Shape::Rotated, GeoPoint::new(37.0, -109.0)).unwrap(), rotated(R::Inside));
        // C = A + AB + AD = (127000 + 2250, 71000 + 8000)
        assert_eq!(c.check(Shape::Rotated, GeoPoint::new(39.25, -101.0)).unwrap(), rotated(R::Inside));
        assert!(!c.check(Shape::Rotated, GeoPoint::new(39.251, -101.0)).unwrap().is_inside());
    }

    struct Counting<E> {
        inner: E,
        calls: usize,
    }

    impl<E: Evaluator> Evaluator for Counting<E> {
        fn evaluate(&mut self, pk: &PaillierPublicKey, q: &GeofenceQuery) -> Result<EvaluationResponse> {
            self.calls += 1;
            self.inner.evaluate(pk, q)
        }
    }

    #[test]
    fn invalid_points_never_reach_the_evaluator() {
        let mut c = session(Counting { inner: colorado(), calls: 0 });
        for bad in [GeoPoint::new(91.0, 0.0), GeoPoint::new(0.0, -180.01), GeoPoint::new(f64::NAN, 0.0)] {
            assert!(matches!(
                c.check(Shape::Rotated, bad),
                Err(GeofenceError::CoordinateOutOfRange { .. })
            ));
        }
        assert_eq!(c.evaluator_mut().calls, 0);
        c.check(Shape::Rotated, COLORADO.point).unwrap();
        assert_eq!(c.evaluator_mut().calls, 1);
    }

    /// Answers under a key of its own instead of the session key.
    struct ForeignKey {
        pk: PaillierPublicKey,
    }

    impl Evaluator for ForeignKey {
        fn evaluate(&mut self, _pk: &PaillierPublicKey, _q: &GeofenceQuery) -> Result<EvaluationResponse> {
            let mut rng = rand::thread_rng();
            let z = enc(&self.pk, &Integer::from(0), &mut rng)?;
            Ok(EvaluationResponse::AxisAligned {
                south: z.clone(),
                north: z.clone(),
                west: z.clone(),
                east: z,
            })
        }
    }

    #[test]
    fn replies_under_another_key_are_rejected() {
        let (other, _) = keygen(512, &mut rand::thread_rng()).unwrap();
        let mut c = session(ForeignKey { pk: other });
        assert!(matches!(
            c.check(Shape::AxisAligned, COLORADO.point),
            Err(GeofenceError::KeyMismatch(_))
        ));
    }

    /// Serializes through the wire form, echoing the wrong fingerprint.
    struct WrongEcho {
        inner: LocalEvaluator,
        echo: PaillierPublicKey,
    }

    impl Evaluator for WrongEcho {
        fn evaluate(&mut self, pk: &PaillierPublicKey, q: &GeofenceQuery) -> Result<EvaluationResponse> {
            let wire = self.inner.evaluate_query(pk, q)?.to_wire(Some(self.echo.key_id()));
            EvaluationResponse::from_wire(pk, &wire)
        }
    }

    #[test]
    fn mismatched_key_echo_is_rejected() {
        let (other, _) = keygen(256, &mut rand::thread_rng()).unwrap();
        let mut c = session(WrongEcho { inner: colorado(), echo: other });
        assert!(matches!(
            c.check(Shape::Rotated, COLORADO.point),
            Err(GeofenceError::KeyMismatch(_))
        ));
    }

    /// Returns values near n/2, which no honest evaluation produces.
    struct Wrapping;

    impl Evaluator for Wrapping {
        fn evaluate(&mut self, pk: &PaillierPublicKey, _q: &GeofenceQuery) -> Result<EvaluationResponse> {
            let mut rng = rand::thread_rng();
            let half = Integer::from(pk.n() >> 1u32);
            let zero = enc(pk, &Integer::from(0), &mut rng)?;
            Ok(EvaluationResponse::AxisAligned {
                south: enc(pk, &half, &mut rng)?,
                north: zero.clone(),
                west: zero.clone(),
                east: zero,
            })
        }
    }

    #[test]
    fn wrapped_values_are_reported_not_classified() {
        let mut c = session(Wrapping);
        match c.check(Shape::AxisAligned, KANSAS.point) {
            Err(GeofenceError::RangeOverflow { field: "south", .. }) => {}
            other => panic!("expected range overflow, got {other:?}"),
        }
    }

    /// Computes under its own key of the session's size and sends the bare
    /// integers without a key echo, the way the plain HTTP service does.
    struct SameSizeForeignKey {
        pk: PaillierPublicKey,
    }

    impl Evaluator for SameSizeForeignKey {
        fn evaluate(&mut self, pk: &PaillierPublicKey, _q: &GeofenceQuery) -> Result<EvaluationResponse> {
            let mut rng = rand::thread_rng();
            let n2 = pk.n2();
            // reduce into the session's range so the values pass the domain check
            let mut raw = || -> Result<Integer> {
                Ok(enc(&self.pk, &Integer::from(0), &mut rng)?.to_integer() % &n2)
            };
            let wire = geoprivproto::WireReply::AxisAligned(geoprivproto::AxisAlignedReply {
                lat: raw()?,
                lat2: raw()?,
                lng: raw()?,
                lng2: raw()?,
                key: None,
            });
            EvaluationResponse::from_wire(pk, &wire)
        }
    }

    #[test]
    fn same_size_foreign_key_without_echo_is_a_mismatch() {
        let (other, _) = keygen(512, &mut rand::thread_rng()).unwrap();
        let mut c = session(SameSizeForeignKey { pk: other });
        assert!(matches!(
            c.check(Shape::AxisAligned, COLORADO.point),
            Err(GeofenceError::KeyMismatch(_))
        ));
    }

    #[test]
    fn reply_for_the_wrong_shape_is_malformed() {
        struct AlwaysRotated(LocalEvaluator);
        impl Evaluator for AlwaysRotated {
            fn evaluate(&mut self, pk: &PaillierPublicKey, q: &GeofenceQuery) -> Result<EvaluationResponse> {
                let q = GeofenceQuery::Rotated(q.point().clone());
                self.0.evaluate_query(pk, &q)
            }
        }
        let mut c = session(AlwaysRotated(colorado()));
        assert!(matches!(
            c.check(Shape::AxisAligned, COLORADO.point),
            Err(GeofenceError::MalformedResponse(_))
        ));
    }

    #[test]
    fn session_rejects_mismatched_keys_and_narrow_moduli() {
        let mut rng = rand::thread_rng();
        let (pk, _) = keygen(256, &mut rng).unwrap();
        let (_, sk) = keygen(256, &mut rng).unwrap();
        assert!(matches!(
            GeofenceClient::new(pk, sk, ProtocolConfig::default(), colorado()),
            Err(GeofenceError::KeyMismatch(_))
        ));

        let (pk, sk) = keygen(128, &mut rng).unwrap();
        // 4 * 2^200 cannot fit a 128-bit modulus
        let cfg = ProtocolConfig { magnitude_bits: 200, ..Default::default() };
        assert!(matches!(
            GeofenceClient::new(pk, sk, cfg, colorado()),
            Err(GeofenceError::Crypto(_))
        ));
    }
}
