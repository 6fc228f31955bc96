//! geopriv-crypto: Paillier binding for the geofence protocol, key
//! fingerprints, key-file helpers and signed decoding of decrypted residues.
//!
//! Every ciphertext records the fingerprint ([`KeyId`]) of the public key it
//! was produced under. All homomorphic operations and decryption check that
//! fingerprint, so ciphertexts from different keys never mix silently.

use rand::RngCore;
use rug::integer::{IsPrime, Order};
use rug::Integer;
use serde::{Deserialize, Serialize};
use std::fmt;

mod error;
pub mod signed;

pub use error::{CryptoError, Result};
pub use signed::{centered, decode_signed};

/// Smallest modulus accepted by [`keygen`].
pub const MIN_KEY_BITS: u32 = 128;

// ---------------- Key material ----------------

/// BLAKE3 fingerprint of a public key's `(n, g)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(pub [u8; 32]);

impl KeyId {
    fn of(n: &[u8], g: &[u8]) -> Self {
        let mut h = blake3::Hasher::new();
        h.update(&(n.len() as u64).to_be_bytes());
        h.update(n);
        h.update(g);
        KeyId(*h.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| CryptoError::BadKeyId(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| CryptoError::BadKeyId(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(KeyId(arr))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", &self.to_hex()[..16])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaillierPublicKey {
    #[serde(with = "serde_bytes")]
    pub n: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub g: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub n2: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaillierPrivateKey {
    #[serde(with = "serde_bytes")]
    pub lambda: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub mu: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub n: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub g: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub n2: Vec<u8>,
}

impl PaillierPublicKey {
    /// Rebuild a public key from the `(n, g)` pair carried on the wire.
    pub fn from_parts(n: &Integer, g: &Integer) -> Result<Self> {
        if *n <= 1 || n.is_even() {
            return Err(CryptoError::InvalidKey("modulus must be odd and greater than one"));
        }
        let n2 = Integer::from(n.square_ref());
        if *g <= 1 || *g >= n2 {
            return Err(CryptoError::InvalidKey("generator must lie in (1, n^2)"));
        }
        if gcd(g.clone(), n.clone()) != 1 {
            return Err(CryptoError::InvalidKey("generator shares a factor with n"));
        }
        Ok(PaillierPublicKey {
            n: int_to_be(n),
            g: int_to_be(g),
            n2: int_to_be(&n2),
        })
    }

    pub fn n(&self) -> Integer {
        int_from_be(&self.n)
    }
    pub fn g(&self) -> Integer {
        int_from_be(&self.g)
    }
    pub fn n2(&self) -> Integer {
        int_from_be(&self.n2)
    }
    pub fn bits(&self) -> u32 {
        self.n().significant_bits()
    }
    pub fn key_id(&self) -> KeyId {
        KeyId::of(&self.n, &self.g)
    }
}

impl PaillierPrivateKey {
    pub fn n(&self) -> Integer {
        int_from_be(&self.n)
    }
    pub fn n2(&self) -> Integer {
        int_from_be(&self.n2)
    }
    pub fn lambda(&self) -> Integer {
        int_from_be(&self.lambda)
    }
    pub fn mu(&self) -> Integer {
        int_from_be(&self.mu)
    }
    pub fn key_id(&self) -> KeyId {
        KeyId::of(&self.n, &self.g)
    }

    /// The public half, rebuilt from the private key file.
    pub fn public_key(&self) -> PaillierPublicKey {
        PaillierPublicKey {
            n: self.n.clone(),
            g: self.g.clone(),
            n2: self.n2.clone(),
        }
    }
}

// ---------------- Ciphertexts ----------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    #[serde(with = "serde_bytes")]
    c: Vec<u8>,
    key: KeyId,
}

impl Ciphertext {
    fn new(c: &Integer, key: KeyId) -> Self {
        Ciphertext { c: int_to_be(c), key }
    }

    /// Bind a raw integer received over the wire to `pk`. Only elements of
    /// `Z*_{n^2}` are accepted; anything else cannot have been produced
    /// under this key.
    pub fn from_wire(pk: &PaillierPublicKey, raw: &Integer) -> Result<Self> {
        let n = pk.n();
        let n2 = pk.n2();
        if *raw <= 0 || *raw >= n2 || gcd(raw.clone(), n) != 1 {
            return Err(CryptoError::ForeignCiphertext { key: pk.key_id() });
        }
        Ok(Ciphertext::new(raw, pk.key_id()))
    }

    pub fn to_integer(&self) -> Integer {
        int_from_be(&self.c)
    }

    pub fn key_id(&self) -> KeyId {
        self.key
    }
}

#[inline]
fn int_from_be(bytes: &[u8]) -> Integer {
    Integer::from_digits(bytes, Order::MsfBe)
}

#[inline]
fn int_to_be(i: &Integer) -> Vec<u8> {
    i.to_digits::<u8>(Order::MsfBe)
}

fn ensure_key(expected: KeyId, c: &Ciphertext) -> Result<()> {
    if c.key != expected {
        return Err(CryptoError::KeyMismatch {
            expected,
            found: c.key,
        });
    }
    Ok(())
}

// Canonical representative of k modulo n, in [0, n-1].
fn mod_n(k: &Integer, n: &Integer) -> Integer {
    let mut z = k.clone();
    z %= n;
    if z.is_negative() {
        z += n;
    }
    z
}

fn pow_mod(base: &Integer, exp: &Integer, modulus: &Integer) -> Result<Integer> {
    base.clone()
        .pow_mod(exp, modulus)
        .map_err(|_| CryptoError::NotInvertible)
}

/// Uniform value in `[1, n)` that is a unit modulo `n`.
fn rand_unit(n: &Integer, rng: &mut (impl RngCore + ?Sized)) -> Integer {
    let bits = n.significant_bits() as usize;
    let nbytes = (bits + 7) / 8;
    let excess = 8 * nbytes - bits;
    let mut bytes = vec![0u8; nbytes];
    loop {
        rng.fill_bytes(&mut bytes);
        if excess > 0 {
            bytes[0] &= 0xFFu8 >> excess;
        }
        let r = int_from_be(&bytes);
        if r > 0 && r < *n && gcd(r.clone(), n.clone()) == 1 {
            return r;
        }
    }
}

// ---------------- Paillier core ----------------

pub fn keygen(
    bits: u32,
    rng: &mut impl RngCore,
) -> Result<(PaillierPublicKey, PaillierPrivateKey)> {
    if bits < MIN_KEY_BITS {
        return Err(CryptoError::KeySize {
            bits,
            min: MIN_KEY_BITS,
        });
    }
    let half = bits / 2;
    let mut gen_prime = |bits: u32| -> Integer {
        loop {
            let mut bytes = vec![0u8; (bits as usize + 7) / 8];
            rng.fill_bytes(&mut bytes);
            // top two bits so that p*q has the full size; odd
            if let Some(b) = bytes.first_mut() {
                *b |= 0xC0;
            }
            if let Some(b) = bytes.last_mut() {
                *b |= 1;
            }
            let mut p = int_from_be(&bytes);
            p.next_prime_mut();
            if p.is_probably_prime(25) != IsPrime::No {
                return p;
            }
        }
    };
    let p = gen_prime(half);
    let q = loop {
        let q = gen_prime(bits - half);
        if q != p {
            break q;
        }
    };
    let n = Integer::from(&p * &q);
    let n2 = Integer::from(n.square_ref());
    let lambda = lcm(&(p - 1u32), &(q - 1u32));
    let g: Integer = {
        let mut t = n.clone();
        t += 1;
        t
    };
    // mu = L(g^lambda mod n^2)^{-1} mod n
    let gl = pow_mod(&g, &lambda, &n2)?;
    let mu = ell(&gl, &n)
        .invert(&n)
        .map_err(|_| CryptoError::NotInvertible)?;

    let pk = PaillierPublicKey {
        n: int_to_be(&n),
        g: int_to_be(&g),
        n2: int_to_be(&n2),
    };
    let sk = PaillierPrivateKey {
        lambda: int_to_be(&lambda),
        mu: int_to_be(&mu),
        n: pk.n.clone(),
        g: pk.g.clone(),
        n2: pk.n2.clone(),
    };
    Ok((pk, sk))
}

// L(u) = (u - 1) / n
fn ell(u: &Integer, n: &Integer) -> Integer {
    let mut t = u.clone();
    t -= 1;
    t / n
}

fn gcd(mut a: Integer, mut b: Integer) -> Integer {
    while b != 0 {
        let r = Integer::from(&a % &b);
        a = b;
        b = r;
    }
    a.abs()
}

fn lcm(a: &Integer, b: &Integer) -> Integer {
    let g = gcd(a.clone(), b.clone());
    let prod = Integer::from(a * b);
    prod / g
}

/// `g^m` without a full exponentiation when `g = n + 1`.
fn gen_pow(pk: &PaillierPublicKey, m: &Integer) -> Result<Integer> {
    let n = pk.n();
    let n2 = pk.n2();
    let g = pk.g();
    let n_plus_one = Integer::from(&n + 1u32);
    if g == n_plus_one {
        // (1 + n)^m = 1 + m*n  (mod n^2)
        let mut t = Integer::from(m * &n);
        t += 1;
        t %= &n2;
        Ok(t)
    } else {
        pow_mod(&g, m, &n2)
    }
}

/// Encrypt `m` (reduced mod n) under `pk`.
pub fn enc(pk: &PaillierPublicKey, m: &Integer, rng: &mut impl RngCore) -> Result<Ciphertext> {
    let n = pk.n();
    let n2 = pk.n2();
    let m = mod_n(m, &n);
    let r = rand_unit(&n, rng);
    let gm = gen_pow(pk, &m)?;
    let rn = pow_mod(&r, &n, &n2)?;
    let c = Integer::from(&gm * &rn) % &n2;
    Ok(Ciphertext::new(&c, pk.key_id()))
}

/// Decrypt to the residue in `[0, n)`. Signed interpretation is left to
/// [`decode_signed`].
pub fn dec(sk: &PaillierPrivateKey, c: &Ciphertext) -> Result<Integer> {
    ensure_key(sk.key_id(), c)?;
    let n = sk.n();
    let n2 = sk.n2();
    let u = pow_mod(&c.to_integer(), &sk.lambda(), &n2)?;
    Ok((ell(&u, &n) * sk.mu()) % &n)
}

/// `E(a) ⊕ E(b) = E(a + b)`
pub fn add(pk: &PaillierPublicKey, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
    let key = pk.key_id();
    ensure_key(key, a)?;
    ensure_key(key, b)?;
    let n2 = pk.n2();
    let c = Integer::from(&a.to_integer() * &b.to_integer()) % &n2;
    Ok(Ciphertext::new(&c, key))
}

/// `E(a) ⊕ k = E(a + k)` for a known plaintext `k` (negative allowed).
pub fn add_plain(pk: &PaillierPublicKey, a: &Ciphertext, k: &Integer) -> Result<Ciphertext> {
    let key = pk.key_id();
    ensure_key(key, a)?;
    let n2 = pk.n2();
    let gk = gen_pow(pk, &mod_n(k, &pk.n()))?;
    let c = Integer::from(&a.to_integer() * &gk) % &n2;
    Ok(Ciphertext::new(&c, key))
}

/// `k ⊗ E(a) = E(k * a)` for a known plaintext `k` (negative allowed).
pub fn mul_plain(pk: &PaillierPublicKey, a: &Ciphertext, k: &Integer) -> Result<Ciphertext> {
    let key = pk.key_id();
    ensure_key(key, a)?;
    let kk = mod_n(k, &pk.n());
    let c = pow_mod(&a.to_integer(), &kk, &pk.n2())?;
    Ok(Ciphertext::new(&c, key))
}

/// Multiply by a fresh encryption of zero.
pub fn rerandomize(
    pk: &PaillierPublicKey,
    a: &Ciphertext,
    rng: &mut (impl RngCore + ?Sized),
) -> Result<Ciphertext> {
    let key = pk.key_id();
    ensure_key(key, a)?;
    let n = pk.n();
    let n2 = pk.n2();
    let r = rand_unit(&n, rng);
    let rn = pow_mod(&r, &n, &n2)?;
    let c = Integer::from(&a.to_integer() * &rn) % &n2;
    Ok(Ciphertext::new(&c, key))
}

// --- Simple JSON (de)serialization helpers for keys ---

pub fn save_json<T: Serialize>(path: &str, value: &T) -> anyhow::Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
pub fn load_json<T: for<'de> Deserialize<'de>>(path: &str) -> anyhow::Result<T> {
    let data = std::fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

// ------------------- Tests -------------------
