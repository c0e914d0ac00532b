//! Wire body encode/decode for the message types that carry a payload beyond
//! a bare target id (spec §6.1). Grounded in `original_source/peerz/messaging/discovery.py`'s
//! `FindNodes.pack_response`/`unpack_response` (the NODE_REPLY layout) and
//! `peerz/messaging/hashtable.py`'s `StoreValue`/`RemoveValue` request packing.
//!
//! **(supplement, see DESIGN.md)** The original concatenates `key + content`
//! for a STOR body with no delimiter and is never actually able to separate
//! the two again on receipt (it re-hashes the *whole* body as if it were the
//! key). That is a shortcut in the original, not a wire contract worth
//! reproducing; `encode_stor_body`/`decode_stor_body` here use an explicit
//! 2-byte big-endian key-length prefix so a STOR can always be decoded back
//! into its constituent key and value.

use crate::error::FrameError;
use crate::node::{Endpoint, Node};
use dht_crypto::{Id, ID_LEN};
use std::net::IpAddr;
use std::str::FromStr;

/// Packs `(node_id || address-string || NUL || port-string || NUL)` per
/// entry, in order (spec §6.1 NODE_REPLY).
pub fn encode_node_reply(nodes: &[Node]) -> Vec<u8> {
    let mut out = Vec::new();
    for node in nodes {
        out.extend_from_slice(node.node_id().as_bytes());
        out.extend_from_slice(node.endpoint.address.to_string().as_bytes());
        out.push(0);
        out.extend_from_slice(node.endpoint.port.to_string().as_bytes());
        out.push(0);
    }
    out
}

/// Inverse of [`encode_node_reply`]. Malformed trailing bytes (an id with no
/// address/port following it, a non-UTF8 or non-numeric field) stop parsing
/// and return whatever entries decoded cleanly up to that point, mirroring
/// the original's `try/except: break` — a partially corrupt NODE_REPLY still
/// yields whatever peers it validly offered.
pub fn decode_node_reply(body: &[u8]) -> Vec<(Id, Endpoint)> {
    let mut out = Vec::new();
    let mut rest = body;
    loop {
        if rest.len() < ID_LEN {
            break;
        }
        let id = Id::from_slice(&rest[..ID_LEN]);
        let tail = &rest[ID_LEN..];

        let Some(addr_end) = tail.iter().position(|&b| b == 0) else { break };
        let Ok(addr_str) = std::str::from_utf8(&tail[..addr_end]) else { break };
        let Ok(address) = IpAddr::from_str(addr_str) else { break };

        let port_start = addr_end + 1;
        if port_start > tail.len() {
            break;
        }
        let port_tail = &tail[port_start..];
        let Some(port_end) = port_tail.iter().position(|&b| b == 0) else { break };
        let Ok(port_str) = std::str::from_utf8(&port_tail[..port_end]) else { break };
        let Ok(port) = port_str.parse::<u16>() else { break };

        out.push((id, Endpoint { address, port }));
        rest = &port_tail[port_end + 1..];
    }
    out
}

/// `key_len:u16 (BE) || key || context_len:u16 (BE) || context || value` (see
/// module docs for why the key/value boundary departs from the original's
/// undelimited concatenation). `context` is the opaque namespace string spec
/// §9's open questions says to carry on the wire without routing ever reading
/// it back; it sits between `key` and `value` so `value` can stay the final,
/// open-ended field.
pub fn encode_stor_body(key: &[u8], context: &str, value: &[u8]) -> Vec<u8> {
    let context = context.as_bytes();
    let mut out = Vec::with_capacity(4 + key.len() + context.len() + value.len());
    out.extend_from_slice(&(key.len() as u16).to_be_bytes());
    out.extend_from_slice(key);
    out.extend_from_slice(&(context.len() as u16).to_be_bytes());
    out.extend_from_slice(context);
    out.extend_from_slice(value);
    out
}

pub fn decode_stor_body(body: &[u8]) -> Result<(Vec<u8>, String, Vec<u8>), FrameError> {
    if body.len() < 2 {
        return Err(FrameError::TooShort);
    }
    let key_len = u16::from_be_bytes([body[0], body[1]]) as usize;
    let after_key = 2 + key_len;
    if body.len() < after_key + 2 {
        return Err(FrameError::ContentLengthOverflow);
    }
    let key = body[2..after_key].to_vec();

    let context_len = u16::from_be_bytes([body[after_key], body[after_key + 1]]) as usize;
    let after_context = after_key + 2 + context_len;
    if body.len() < after_context {
        return Err(FrameError::ContentLengthOverflow);
    }
    let context = String::from_utf8_lossy(&body[after_key + 2..after_context]).into_owned();
    let value = body[after_context..].to_vec();
    Ok((key, context, value))
}

/// `context_len:u16 (BE) || context || key` — REMV carries the raw key, not
/// its hash (spec §6.1; confirmed against `RemoveValue.parse_message`'s
/// `id_for_key(self.key)` on receipt).
pub fn encode_remove_body(key: &[u8], context: &str) -> Vec<u8> {
    let context = context.as_bytes();
    let mut out = Vec::with_capacity(2 + context.len() + key.len());
    out.extend_from_slice(&(context.len() as u16).to_be_bytes());
    out.extend_from_slice(context);
    out.extend_from_slice(key);
    out
}

pub fn decode_remove_body(body: &[u8]) -> Result<(Vec<u8>, String), FrameError> {
    if body.len() < 2 {
        return Err(FrameError::TooShort);
    }
    let context_len = u16::from_be_bytes([body[0], body[1]]) as usize;
    if body.len() < 2 + context_len {
        return Err(FrameError::ContentLengthOverflow);
    }
    let context = String::from_utf8_lossy(&body[2..2 + context_len]).into_owned();
    let key = body[2 + context_len..].to_vec();
    Ok((key, context))
}

/// `32-byte key id || context_len:u16 (BE) || context` — the FVAL query body
/// (spec §6.1 table documents only the bare key id; the trailing context is
/// the same wire-preserving treatment applied to STOR/REMV above).
pub fn encode_fval_body(key_id: Id, context: &str) -> Vec<u8> {
    let context = context.as_bytes();
    let mut out = Vec::with_capacity(ID_LEN + 2 + context.len());
    out.extend_from_slice(key_id.as_bytes());
    out.extend_from_slice(&(context.len() as u16).to_be_bytes());
    out.extend_from_slice(context);
    out
}

pub fn decode_fval_body(body: &[u8]) -> Result<(Id, String), FrameError> {
    if body.len() < ID_LEN + 2 {
        return Err(FrameError::TooShort);
    }
    let key_id = Id::from_slice(&body[..ID_LEN]);
    let context_len = u16::from_be_bytes([body[ID_LEN], body[ID_LEN + 1]]) as usize;
    if body.len() < ID_LEN + 2 + context_len {
        return Err(FrameError::ContentLengthOverflow);
    }
    let context = String::from_utf8_lossy(&body[ID_LEN + 2..ID_LEN + 2 + context_len]).into_owned();
    Ok((key_id, context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn node(port: u16) -> Node {
        Node::new(
            dht_crypto::random_id(),
            Endpoint {
                address: IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7)),
                port,
            },
        )
    }

    #[test]
    fn node_reply_round_trips_multiple_entries() {
        let nodes = vec![node(7000), node(7001), node(7002)];
        let body = encode_node_reply(&nodes);
        let decoded = decode_node_reply(&body);
        assert_eq!(decoded.len(), 3);
        for (n, (id, endpoint)) in nodes.iter().zip(decoded.iter()) {
            assert_eq!(n.node_id(), *id);
            assert_eq!(n.endpoint.port, endpoint.port);
            assert_eq!(n.endpoint.address, endpoint.address);
        }
    }

    #[test]
    fn node_reply_decode_of_empty_body_is_empty() {
        assert!(decode_node_reply(&[]).is_empty());
    }

    #[test]
    fn node_reply_decode_stops_cleanly_on_truncated_trailer() {
        let mut body = encode_node_reply(&[node(7000)]);
        body.truncate(body.len() - 2);
        assert!(decode_node_reply(&body).is_empty());
    }

    #[test]
    fn stor_body_round_trips_key_context_and_value() {
        let body = encode_stor_body(b"mykey", "ns", b"myvalue");
        let (key, context, value) = decode_stor_body(&body).unwrap();
        assert_eq!(key, b"mykey");
        assert_eq!(context, "ns");
        assert_eq!(value, b"myvalue");
    }

    #[test]
    fn stor_body_with_empty_context_round_trips() {
        let body = encode_stor_body(b"mykey", "", b"myvalue");
        let (key, context, value) = decode_stor_body(&body).unwrap();
        assert_eq!(key, b"mykey");
        assert_eq!(context, "");
        assert_eq!(value, b"myvalue");
    }

    #[test]
    fn stor_body_too_short_is_rejected() {
        assert_eq!(decode_stor_body(&[0u8]).unwrap_err(), FrameError::TooShort);
    }

    #[test]
    fn stor_body_with_overflowing_key_length_is_rejected() {
        let body = 10u16.to_be_bytes().to_vec();
        assert_eq!(decode_stor_body(&body).unwrap_err(), FrameError::ContentLengthOverflow);
    }

    #[test]
    fn remove_body_round_trips_key_and_context() {
        let body = encode_remove_body(b"somekey", "ns");
        let (key, context) = decode_remove_body(&body).unwrap();
        assert_eq!(key, b"somekey");
        assert_eq!(context, "ns");
    }

    #[test]
    fn fval_body_round_trips_target_and_context() {
        let target = dht_crypto::Id::for_key(b"foo");
        let body = encode_fval_body(target, "ns");
        let (decoded, context) = decode_fval_body(&body).unwrap();
        assert_eq!(decoded, target);
        assert_eq!(context, "ns");
    }
}
