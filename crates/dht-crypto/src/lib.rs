//! Identifier arithmetic, curve keys and authenticated encryption for the DHT
//! overlay core. Split out of `dht-core` the way `lib-crypto` is split out of
//! `lib-network`/`lib-storage` in the wider ZHTP workspace this crate grew out
//! of: every other crate treats this one as the sole place that touches raw
//! curve scalars, nonces or key material.

pub mod encryption;
pub mod identifier;
pub mod keys;
pub mod random;
pub mod z85;

pub use encryption::{open, seal, CryptoError};
pub use identifier::{Distance, Id, ID_LEN};
pub use keys::KeyPair;
pub use random::{random_bytes, random_id, random_u32};
