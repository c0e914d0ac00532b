//! z85 encode/decode for seed lists (spec §6.2) and the client-pipe wire
//! protocol (spec §6.4), thin wrappers over the `z85` crate so callers never
//! import it directly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Z85Error {
    #[error("invalid z85 encoding")]
    Invalid,
}

pub fn encode(bytes: &[u8]) -> String {
    z85::encode(bytes)
}

pub fn decode(s: &str) -> Result<Vec<u8>, Z85Error> {
    z85::decode(s).map_err(|_| Z85Error::Invalid)
}
