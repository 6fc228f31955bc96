use geoprivcrypto::CryptoError;
use thiserror::Error;

use crate::normalize::Axis;

pub type Result<T, E = GeofenceError> = std::result::Result<T, E>;

/// Per-query failures. None of them leaves state behind; a caller may
/// report the error and carry on with the next query.
#[derive(Debug, Error)]
pub enum GeofenceError {
    #[error("{axis} {degrees} is outside the encodable range [-{limit}, {limit}]")]
    CoordinateOutOfRange { axis: Axis, degrees: f64, limit: f64 },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed evaluator response: {0}")]
    MalformedResponse(String),

    #[error("key mismatch: {0}")]
    KeyMismatch(String),

    #[error("decrypted {field} lies outside the signed window of {magnitude_bits} bits")]
    RangeOverflow { field: &'static str, magnitude_bits: u32 },

    #[error("invalid geofence: {0}")]
    InvalidFence(String),

    #[error("invalid protocol configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Crypto(CryptoError),
}

impl From<CryptoError> for GeofenceError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeyMismatch { .. } | CryptoError::ForeignCiphertext { .. } => {
                GeofenceError::KeyMismatch(e.to_string())
            }
            CryptoError::RangeOverflow { magnitude_bits } => GeofenceError::RangeOverflow {
                field: "value",
                magnitude_bits,
            },
            other => GeofenceError::Crypto(other),
        }
    }
}
