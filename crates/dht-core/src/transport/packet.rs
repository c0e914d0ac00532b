//! Outer packet and inner payload (fragment) wire layouts (spec §4.4).
//!
//! Grounded in the request/response framing style of
//! `lib-storage::dht::transport`/`lib-network::dht::transport`: a fixed
//! header of primitive fields followed by a variable-length body, decoded
//! with explicit bounds checks rather than a derive macro, since the layout
//! is a raw byte format shared with a non-Rust peer implementation (spec §1),
//! not an internal Rust-to-Rust wire format.

use crate::error::FrameError;
use dht_crypto::Id;

pub const OUTER_HEADER_LEN: usize = 32 + 1;
pub const FRAGMENT_HEADER_LEN: usize = 4 + 1 + 1 + 1 + 2;
/// Content larger than this many bytes is split across sequential fragments.
pub const FRAGMENT_CHUNK_SIZE: usize = 1100;
/// Soft ceiling on total datagram size (spec §4.4): "must not exceed ≈2 KiB".
pub const MAX_DATAGRAM_SIZE: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketMode {
    Plaintext,
    Encrypted,
}

impl PacketMode {
    fn to_byte(self) -> u8 {
        match self {
            PacketMode::Plaintext => 0x01,
            PacketMode::Encrypted => 0x02,
        }
    }

    fn from_byte(b: u8) -> Result<Self, FrameError> {
        match b {
            0x01 => Ok(PacketMode::Plaintext),
            0x02 => Ok(PacketMode::Encrypted),
            _ => Err(FrameError::UnknownMode),
        }
    }
}

/// Encodes the outer packet: `sender_id (32) || mode (1) || body`.
pub fn encode_outer(sender_id: Id, mode: PacketMode, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(OUTER_HEADER_LEN + body.len());
    out.extend_from_slice(sender_id.as_bytes());
    out.push(mode.to_byte());
    out.extend_from_slice(body);
    out
}

/// Decodes the outer packet, returning `(sender_id, mode, body)`.
pub fn decode_outer(datagram: &[u8]) -> Result<(Id, PacketMode, &[u8]), FrameError> {
    if datagram.len() < OUTER_HEADER_LEN {
        return Err(FrameError::TooShort);
    }
    let sender_id = Id::from_slice(&datagram[0..32]);
    let mode = PacketMode::from_byte(datagram[32])?;
    Ok((sender_id, mode, &datagram[OUTER_HEADER_LEN..]))
}

/// One fragment of a Payload, as decoded off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub txid: u32,
    pub msg_type: u8,
    pub index: u8,
    pub last_index: u8,
    pub content: Vec<u8>,
}

/// Encodes a single fragment's wire bytes (the Payload, spec §4.4).
pub fn encode_fragment(txid: u32, msg_type: u8, index: u8, last_index: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAGMENT_HEADER_LEN + content.len());
    out.extend_from_slice(&txid.to_be_bytes());
    out.push(msg_type);
    out.push(index);
    out.push(last_index);
    out.extend_from_slice(&(content.len() as u16).to_be_bytes());
    out.extend_from_slice(content);
    out
}

/// Decodes a single fragment's wire bytes.
pub fn decode_fragment(bytes: &[u8]) -> Result<Fragment, FrameError> {
    if bytes.len() < FRAGMENT_HEADER_LEN {
        return Err(FrameError::TooShort);
    }
    let txid = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
    let msg_type = bytes[4];
    let index = bytes[5];
    let last_index = bytes[6];
    let content_len = u16::from_be_bytes(bytes[7..9].try_into().unwrap()) as usize;

    let remaining = &bytes[FRAGMENT_HEADER_LEN..];
    if content_len > remaining.len() {
        return Err(FrameError::ContentLengthOverflow);
    }

    Ok(Fragment {
        txid,
        msg_type,
        index,
        last_index,
        content: remaining[..content_len].to_vec(),
    })
}

/// Splits `content` into the sequence of wire-ready fragment blobs for one
/// logical message. `last_fragment_index = floor(len / FRAGMENT_CHUNK_SIZE)`
/// per spec §4.4; content of exactly `FRAGMENT_CHUNK_SIZE` bytes therefore
/// yields a trailing empty fragment, which is harmless: concatenation still
/// reconstructs the original bytes exactly.
pub fn encode_message(txid: u32, msg_type: u8, content: &[u8]) -> Vec<Vec<u8>> {
    let last_index = (content.len() / FRAGMENT_CHUNK_SIZE) as u8;
    (0..=last_index)
        .map(|i| {
            let start = (i as usize) * FRAGMENT_CHUNK_SIZE;
            let end = (start + FRAGMENT_CHUNK_SIZE).min(content.len());
            encode_fragment(txid, msg_type, i, last_index, &content[start..end])
        })
        .collect()
}
