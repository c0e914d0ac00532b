//! Single audited source of randomness for the whole crate — grounded in
//! `lib-crypto::random::secure_rng`, which wraps `rand::rngs::OsRng` rather than
//! letting every call site reach for `rand::thread_rng()` independently.

use crate::identifier::{Id, ID_LEN};
use rand::{rngs::OsRng, RngCore};

/// 32 uniform random bytes from a cryptographically secure generator.
pub fn random_id() -> Id {
    let mut buf = [0u8; ID_LEN];
    OsRng.fill_bytes(&mut buf);
    Id(buf)
}

/// A uniform random u32, used as the seed for transaction-id rejection sampling
/// and for nonce material outside the AEAD layer (which generates its own).
pub fn random_u32() -> u32 {
    OsRng.next_u32()
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}
