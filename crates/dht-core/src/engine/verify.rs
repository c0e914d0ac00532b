//! Peer verification (spec §4.8): identities are stable public keys, but
//! endpoints drift under NAT rebinding, so a known node_id reporting from a
//! new address updates in place rather than being treated as a stranger.

use crate::node::{Endpoint, Node};
use crate::routing::RoutingTree;
use dht_crypto::Id;
use std::net::IpAddr;

/// Returns the routing tree's existing record for `node_id` (updating its
/// endpoint in place if it moved), or a fresh, not-yet-inserted `Node` if
/// this is the first time `node_id` has been seen. The caller is responsible
/// for inserting a freshly returned record into the routing tree.
pub fn verify_peer(routing: &mut RoutingTree, address: IpAddr, port: u16, node_id: Id) -> Node {
    if let Some(existing) = routing.get_by_id(node_id) {
        if existing.endpoint.address == address && existing.endpoint.port == port {
            return existing;
        }
        routing.update_endpoint(node_id, address, port);
        return routing
            .get_by_id(node_id)
            .expect("just confirmed present above");
    }
    Node::new(node_id, Endpoint { address, port })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    #[test]
    fn unknown_peer_yields_a_fresh_unattached_record() {
        let local = dht_crypto::random_id();
        let mut routing = RoutingTree::new(local, 8, 5);
        let peer = dht_crypto::random_id();

        let node = verify_peer(&mut routing, addr(), 7001, peer);
        assert_eq!(node.node_id(), peer);
        assert!(routing.get_by_id(peer).is_none());
    }

    #[test]
    fn known_peer_with_matching_endpoint_returns_existing_record() {
        let local = dht_crypto::random_id();
        let mut routing = RoutingTree::new(local, 8, 5);
        let peer = dht_crypto::random_id();
        routing.add(Node::new(peer, Endpoint { address: addr(), port: 7001 })).unwrap();

        let node = verify_peer(&mut routing, addr(), 7001, peer);
        assert_eq!(node.endpoint.port, 7001);
    }

    #[test]
    fn known_peer_with_new_endpoint_updates_in_place() {
        let local = dht_crypto::random_id();
        let mut routing = RoutingTree::new(local, 8, 5);
        let peer = dht_crypto::random_id();
        routing.add(Node::new(peer, Endpoint { address: addr(), port: 7001 })).unwrap();

        let node = verify_peer(&mut routing, addr(), 9999, peer);
        assert_eq!(node.endpoint.port, 9999);
        assert_eq!(routing.get_by_id(peer).unwrap().endpoint.port, 9999);
    }
}
