//! 160-bit identifiers for minidht
//!
//! - BLAKE3 (truncated to 160 bits) to derive content keys from names
//! - XOR distance for proximity between identifiers
//! - Peers and content keys share one identifier space

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Width of an identifier in bytes
pub const ID_LEN: usize = 20;

/// A 160-bit identifier, ordered as a big-endian unsigned integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Number160([u8; ID_LEN]);

impl Number160 {
    pub const ZERO: Number160 = Number160([0u8; ID_LEN]);

    pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Build an identifier from a slice that must be exactly 20 bytes long
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        let arr: [u8; ID_LEN] = bytes.try_into().map_err(|_| {
            crate::Error::InvalidId(format!("expected {} bytes, got {}", ID_LEN, bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Identifier whose low 64 bits are `value`
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; ID_LEN];
        bytes[ID_LEN - 8..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Derive a content key from a name (BLAKE3, first 160 bits)
    pub fn from_key(name: &str) -> Self {
        let hash = blake3::hash(name.as_bytes());
        let mut bytes = [0u8; ID_LEN];
        bytes.copy_from_slice(&hash.as_bytes()[..ID_LEN]);
        Self(bytes)
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; ID_LEN];
        rng.fill(&mut bytes[..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn xor(&self, other: &Number160) -> Number160 {
        let mut out = [0u8; ID_LEN];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        Number160(out)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Stable bucket for lock striping and sharding
    pub fn stripe(&self, stripes: usize) -> usize {
        let low = u64::from_be_bytes([
            self.0[12], self.0[13], self.0[14], self.0[15], self.0[16], self.0[17], self.0[18],
            self.0[19],
        ]);
        (low % stripes.max(1) as u64) as usize
    }
}

/// Compare `a` and `b` by XOR distance to `key`. `Less` means `a` is closer.
///
/// XOR is a bijection for a fixed key, so two identifiers are equidistant only
/// when they are the same identifier. The order is therefore total and every
/// peer evaluating the same membership agrees on it.
pub fn distance_cmp(key: &Number160, a: &Number160, b: &Number160) -> Ordering {
    a.xor(key).cmp(&b.xor(key))
}

impl fmt::Display for Number160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Number160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps traces readable
        write!(f, "Number160({})", &hex::encode(self.0)[..12])
    }
}

impl FromStr for Number160 {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() || digits.len() > ID_LEN * 2 {
            return Err(crate::Error::InvalidId(s.to_string()));
        }
        let padded = format!("{:0>width$}", digits, width = ID_LEN * 2);
        let bytes =
            hex::decode(padded).map_err(|e| crate::Error::InvalidId(format!("{}: {}", s, e)))?;
        Self::from_slice(&bytes)
    }
}
