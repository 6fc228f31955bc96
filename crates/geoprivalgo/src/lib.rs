//! geopriv-algo: the privacy-preserving geofence protocol.
//!
//! - [`normalize`]: signed degrees to non-negative fixed-point integers
//! - [`query`]: encrypted queries for the two fence shapes
//! - [`evaluator`]: the evaluator contract and its typed responses
//! - [`fence`]: an in-process reference evaluator
//! - [`classify`]: decryption, signed decoding and containment verdicts
//! - [`client`]: a session tying the above together
//!
//! The evaluator only ever sees ciphertexts and the public key; all
//! comparisons happen on the client after decryption.

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fence;
pub mod fixtures;
pub mod normalize;
pub mod query;

pub use classify::{
    classify_axis_aligned, classify_rotated, AxisAlignedVerdict, BorderDistances,
    ContainmentVerdict, DecodedResponse, Projections, ResponseDecoder, RotatedVerdict,
};
pub use client::GeofenceClient;
pub use config::ProtocolConfig;
pub use error::{GeofenceError, Result};
pub use evaluator::{EvaluationResponse, Evaluator};
pub use fence::{AxisAlignedFence, FenceSet, LocalEvaluator, RotatedFence};
pub use geoprivproto::Shape;
pub use normalize::{normalize_lat, normalize_lng, Axis, GeoPoint, NormalizedCoordinate};
pub use query::{EncryptedPoint, GeofenceQuery, QueryBuilder};
