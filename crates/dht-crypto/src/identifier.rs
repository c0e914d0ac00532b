//! 256-bit identifier arithmetic — distance, bit extraction, key hashing.
//!
//! implementation grounded in `lib-storage::dht::routing::KademliaRouter` (XOR
//! distance over NodeId) and `lib-identity::types::node_id` (NodeId as a
//! canonical 32-byte value), generalized to a fixed 256-bit width.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Width of an identifier in bytes. Fixed at 256 bits post-curve-key migration.
pub const ID_LEN: usize = 32;

/// A 256-bit opaque identifier: a node's long-term curve public key, or the
/// SHA-256 of an application key. Equality goes through `subtle::ConstantTimeEq`
/// (spec §4.1: "constant-time with respect to the choice of arguments"),
/// mirroring `lib-crypto::types::keys`'s comparison of public-key-shaped byte
/// arrays rather than a derived, short-circuiting `==`.
#[derive(Clone, Copy, Eq, Hash, Serialize, Deserialize)]
pub struct Id(pub [u8; ID_LEN]);

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Id {
    pub const ZERO: Id = Id([0u8; ID_LEN]);

    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Id(bytes)
    }

    /// Truncates or zero-pads `slice` to `ID_LEN` bytes.
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut buf = [0u8; ID_LEN];
        let n = slice.len().min(ID_LEN);
        buf[..n].copy_from_slice(&slice[..n]);
        Id(buf)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// bit 0 is most-significant. Bits beyond the width read as 0.
    pub fn bit(&self, i: usize) -> u8 {
        if i >= ID_LEN * 8 {
            return 0;
        }
        let byte = self.0[i / 8];
        (byte >> (7 - (i % 8))) & 1
    }

    /// SHA-256 of an arbitrary application key, used to map values into id space.
    pub fn for_key(key: &[u8]) -> Self {
        let digest = Sha256::digest(key);
        Id::from_slice(&digest)
    }

    /// XOR distance between two identifiers, as a 256-bit big-endian integer
    /// represented by its raw bytes. `Distance` implements `Ord` so callers can
    /// sort/compare directly.
    pub fn distance(&self, other: &Id) -> Distance {
        let mut out = [0u8; ID_LEN];
        for i in 0..ID_LEN {
            out[i] = self.0[i] ^ other.0[i];
        }
        Distance(out)
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id({})", hex::encode(self.0))
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// XOR distance between two [`Id`]s, ordered as the big-endian integer it
/// represents. Declared as its own type (rather than a bare `[u8; 32]`) so
/// distance comparisons can't accidentally be confused with identifier equality.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Distance(pub [u8; ID_LEN]);

impl Distance {
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl std::fmt::Debug for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Distance({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_of(byte: u8) -> Id {
        Id([byte; ID_LEN])
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let a = id_of(0x1b);
        let b = id_of(0x8f);
        assert_eq!(a.distance(&b), b.distance(&a));
        assert!(a.distance(&a).is_zero());
    }

    #[test]
    fn distance_is_xor_associative_triangle() {
        let a = id_of(0x11);
        let b = id_of(0x22);
        let c = id_of(0x33);
        let ab = a.distance(&b);
        let bc = b.distance(&c);
        let ac = a.distance(&c);
        let mut xored = [0u8; ID_LEN];
        for i in 0..ID_LEN {
            xored[i] = ab.0[i] ^ bc.0[i];
        }
        assert_eq!(Distance(xored), ac);
    }

    #[test]
    fn distance_concrete_values() {
        let a = Id::from_slice(&[0x1b, 0x8f, 0x10]);
        let b = Id::from_slice(&[0x1b, 0x8f, 0x0f]);
        assert_eq!(a.distance(&b).0[2], 0x1f);

        let ones = Id([0xffu8; ID_LEN]);
        let zeros = Id([0u8; ID_LEN]);
        assert_eq!(ones.distance(&zeros).0, [0xffu8; ID_LEN]);
    }

    #[test]
    fn bit_extraction_boundaries() {
        let mut buf = [0u8; ID_LEN];
        buf[ID_LEN - 1] = 0x01;
        let id = Id(buf);
        assert_eq!(id.bit(255), 1);

        let ones = Id([0xffu8; ID_LEN]);
        assert_eq!(ones.bit(0), 1);

        assert_eq!(ones.bit(256), 0);
        assert_eq!(ones.bit(1_000), 0);
    }

    #[test]
    fn for_key_is_sha256() {
        let a = Id::for_key(b"foo");
        let b = Id::for_key(b"foo");
        let c = Id::for_key(b"bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.0.len(), ID_LEN);
    }
}
