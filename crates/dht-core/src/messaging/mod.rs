//! Message-type registry and context dispatch (spec §4.6, §6.1). Grounded in
//! `lib-storage::dht::messaging::DhtMessaging`'s outgoing-queue/dispatch
//! style, reshaped per spec §9's redesign note into a flat table rather than
//! a runtime class registry, since the message-type set is small and fixed.

pub mod discovery;
pub mod hashtable;
pub mod scheduler;
pub mod wire;

pub use discovery::{DiscoveryEvent, DiscoveryRegistry};
pub use hashtable::{HashtableEvent, HashtableRegistry, ValueEntry, ValueTable};
pub use scheduler::Scheduler;
pub use wire::{
    decode_fval_body, decode_node_reply, decode_remove_body, decode_stor_body, encode_fval_body,
    encode_node_reply, encode_remove_body, encode_stor_body,
};

pub const PING: u8 = 0x01;
pub const PONG: u8 = 0x02;
pub const FNOD: u8 = 0x03;
pub const NODE_REPLY_DISCOVERY: u8 = 0x04;
pub const FVAL: u8 = 0x05;
pub const NODE_REPLY_DHT: u8 = 0x06;
pub const VALUE_REPLY: u8 = 0x08;
pub const STOR: u8 = 0x09;
pub const REMV: u8 = 0x0b;

pub const DISCOVERY_CONTEXT: u8 = 0x00;
pub const HASHTABLE_CONTEXT: u8 = 0x01;

/// Parity convention (spec §6.1): odd = query, even = response.
pub fn is_query(msg_type: u8) -> bool {
    msg_type % 2 == 1
}

pub fn is_response(msg_type: u8) -> bool {
    msg_type % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_convention_matches_the_registry() {
        for &q in &[PING, FNOD, STOR, REMV] {
            assert!(is_query(q), "{q:#04x} should be a query");
        }
        for &r in &[PONG, NODE_REPLY_DISCOVERY, NODE_REPLY_DHT, VALUE_REPLY] {
            assert!(is_response(r), "{r:#04x} should be a response");
        }
    }
}
