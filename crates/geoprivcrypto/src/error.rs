use thiserror::Error;

use crate::KeyId;

pub type Result<T, E = CryptoError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key size {bits} is below the supported minimum of {min} bits")]
    KeySize { bits: u32, min: u32 },

    #[error("ciphertext belongs to key {found}, expected key {expected}")]
    KeyMismatch { expected: KeyId, found: KeyId },

    #[error("value is not a ciphertext under key {key}")]
    ForeignCiphertext { key: KeyId },

    #[error("invalid public key: {0}")]
    InvalidKey(&'static str),

    #[error("malformed key fingerprint: {0}")]
    BadKeyId(String),

    #[error("decrypted value lies outside the signed window of {magnitude_bits} bits")]
    RangeOverflow { magnitude_bits: u32 },

    #[error("signed window of {magnitude_bits} bits does not fit a {modulus_bits}-bit modulus")]
    WindowTooWide { magnitude_bits: u32, modulus_bits: u32 },

    #[error("modular inverse does not exist")]
    NotInvertible,
}
