//! Signed interpretation of decrypted residues.
//!
//! Paillier decrypts into `[0, n)`; a difference that is "really" negative
//! comes back as `n - |v|`. The decoder maps residues to the centered range
//! `(-n/2, n/2]` and only accepts values whose magnitude stays below
//! `2^magnitude_bits`, so a wrapped result is reported instead of being
//! read as a huge positive or negative distance.

use rug::Integer;

use crate::{CryptoError, Result};

/// Map a residue in `[0, n)` to its centered representative in `(-n/2, n/2]`.
pub fn centered(v: Integer, n: &Integer) -> Integer {
    let mut half_n = n.clone();
    half_n >>= 1;
    if v > half_n {
        v - n
    } else {
        v
    }
}

/// Window check: `4 * 2^magnitude_bits <= n`, leaving a wide ambiguous band
/// around `n/2` that no honest evaluation can reach.
pub fn check_window(magnitude_bits: u32, n: &Integer) -> Result<()> {
    let quarter_room = Integer::from(1) << (magnitude_bits + 2);
    if quarter_room > *n {
        return Err(CryptoError::WindowTooWide {
            magnitude_bits,
            modulus_bits: n.significant_bits(),
        });
    }
    Ok(())
}

/// Decode a decrypted residue as a signed integer with `|v| < 2^magnitude_bits`.
pub fn decode_signed(residue: Integer, n: &Integer, magnitude_bits: u32) -> Result<Integer> {
    check_window(magnitude_bits, n)?;
    if residue.is_negative() || residue >= *n {
        return Err(CryptoError::RangeOverflow { magnitude_bits });
    }
    let v = centered(residue, n);
    let bound = Integer::from(1) << magnitude_bits;
    if Integer::from(v.abs_ref()) >= bound {
        return Err(CryptoError::RangeOverflow { magnitude_bits });
    }
    Ok(v)
}
