//! Prefix-partitioned tree of bins of active peers with a configurable
//! extra-depth split/consolidate policy (spec §4.2). The public surface is a
//! single [`RoutingTree`]; [`zone`] and [`bin`] hold the recursive internals.

mod bin;
mod zone;

use crate::error::RoutingError;
use crate::node::Node;
use dht_crypto::Id;
use std::net::IpAddr;
use zone::Zone;

pub struct RoutingTree {
    local_id: Id,
    k: usize,
    b: u32,
    root: Zone,
}

impl RoutingTree {
    pub fn new(local_id: Id, k: usize, b: u32) -> Self {
        RoutingTree {
            local_id,
            k,
            b,
            root: Zone::new_leaf(0, String::new(), k),
        }
    }

    pub fn local_id(&self) -> Id {
        self.local_id
    }

    /// Inserts `node` into the leaf matching its prefix, splitting as needed,
    /// or into that leaf's replacement cache if the leaf is full and not
    /// split-eligible (spec §4.2).
    pub fn add(&mut self, node: Node) -> Result<(), RoutingError> {
        if node.node_id() == self.local_id {
            return Err(RoutingError::LocalNode);
        }
        self.root.add(node, self.k, self.b, self.local_id, true);
        Ok(())
    }

    /// Removes `node_id` from its owning leaf, collapsing ancestors down to a
    /// fresh leaf wherever consolidation becomes eligible (spec §4.2).
    pub fn remove(&mut self, node_id: Id) -> bool {
        self.root.remove(node_id, self.k)
    }

    /// Up to `max_nodes` records sorted by ascending XOR distance to `target`
    /// (spec §4.2 `closest_to`).
    pub fn closest_to(&self, target: Id, max_nodes: usize) -> Vec<Node> {
        let mut all = Vec::new();
        self.root.collect_all(&mut all);
        all.sort_by_key(|n| n.node_id().distance(&target));
        all.truncate(max_nodes);
        all
    }

    pub fn get_by_id(&self, node_id: Id) -> Option<Node> {
        self.root.get_by_id(node_id).cloned()
    }

    pub fn get_by_addr(&self, address: IpAddr, port: u16) -> Option<Node> {
        self.root.get_by_addr(address, port).cloned()
    }

    pub fn get_all_nodes(&self) -> Vec<Node> {
        let mut all = Vec::new();
        self.root.collect_all(&mut all);
        all
    }

    pub fn len(&self) -> usize {
        self.root.population()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutates the endpoint of an already-known node in place (used by
    /// `verify_peer`, spec §4.8).
    pub fn update_endpoint(&mut self, node_id: Id, address: IpAddr, port: u16) -> bool {
        self.root
            .get_by_id_mut(node_id)
            .map(|n| {
                n.endpoint.address = address;
                n.endpoint.port = port;
            })
            .is_some()
    }

    pub fn get_mut(&mut self, node_id: Id) -> Option<&mut Node> {
        self.root.get_by_id_mut(node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Endpoint;
    use std::net::Ipv4Addr;

    fn endpoint(port: u16) -> Endpoint {
        Endpoint {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
        }
    }

    fn id_with_bit0(bit0: u8, salt: u8) -> Id {
        let mut bytes = dht_crypto::random_bytes(32);
        bytes[0] = (bytes[0] & 0x7f) | (bit0 << 7);
        bytes[31] = salt;
        Id::from_slice(&bytes)
    }

    #[test]
    fn rejects_inserting_the_local_node() {
        let local = dht_crypto::random_id();
        let mut tree = RoutingTree::new(local, 8, 5);
        let err = tree.add(Node::new(local, endpoint(1))).unwrap_err();
        assert_eq!(err, RoutingError::LocalNode);
    }

    #[test]
    fn add_then_get_by_id_and_addr() {
        let local = dht_crypto::random_id();
        let mut tree = RoutingTree::new(local, 8, 5);
        let peer_id = dht_crypto::random_id();
        tree.add(Node::new(peer_id, endpoint(7001))).unwrap();

        assert!(tree.get_by_id(peer_id).is_some());
        assert!(tree.get_by_addr(IpAddr::V4(Ipv4Addr::LOCALHOST), 7001).is_some());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn remove_deletes_the_record() {
        let local = dht_crypto::random_id();
        let mut tree = RoutingTree::new(local, 8, 5);
        let peer_id = dht_crypto::random_id();
        tree.add(Node::new(peer_id, endpoint(7001))).unwrap();
        assert!(tree.remove(peer_id));
        assert!(tree.get_by_id(peer_id).is_none());
        assert!(!tree.remove(peer_id));
    }

    #[test]
    fn closest_to_is_sorted_prefix_of_full_set() {
        let local = dht_crypto::random_id();
        let mut tree = RoutingTree::new(local, 8, 5);
        for _ in 0..20 {
            tree.add(Node::new(dht_crypto::random_id(), endpoint(7000))).unwrap();
        }
        let target = dht_crypto::random_id();
        let mut all = tree.get_all_nodes();
        all.sort_by_key(|n| n.node_id().distance(&target));

        let closest = tree.closest_to(target, 5);
        assert_eq!(closest.len(), 5);
        for (a, b) in closest.iter().zip(all.iter().take(5)) {
            assert_eq!(a.node_id(), b.node_id());
        }
        for w in closest.windows(2) {
            assert!(w[0].node_id().distance(&target) <= w[1].node_id().distance(&target));
        }
    }

    /// Scenario 4 from spec.md §8: local id bit-0 = 1; insert 5 records with
    /// bit-0 = 0 and 6 with bit-0 = 1 into a K=10 zone; after the 11th insert
    /// the root has two children of sizes 5 and 6.
    #[test]
    fn split_balanced_matches_scenario_four() {
        let local = id_with_bit0(1, 0xff);
        let mut tree = RoutingTree::new(local, 10, 5);

        for i in 0..5u8 {
            tree.add(Node::new(id_with_bit0(0, i), endpoint(7000))).unwrap();
        }
        for i in 0..6u8 {
            tree.add(Node::new(id_with_bit0(1, i), endpoint(7000))).unwrap();
        }

        assert_eq!(tree.len(), 11);
        let all = tree.get_all_nodes();
        let zero_bit = all.iter().filter(|n| n.node_id().bit(0) == 0).count();
        let one_bit = all.iter().filter(|n| n.node_id().bit(0) == 1).count();
        assert_eq!(zero_bit, 5);
        assert_eq!(one_bit, 6);
    }

    /// Scenario 5: with B=1, only the subtree containing the local id keeps
    /// splitting past depth 1; everything else stops at B.
    #[test]
    fn split_unbalanced_respects_extra_depth_bound() {
        let local = id_with_bit0(1, 0x00);
        let mut tree = RoutingTree::new(local, 2, 1);

        // Fill the bit-0=0 subtree (not containing local) past its capacity
        // several times over; it must never exceed depth 1 + B = 2.
        for i in 0..10u8 {
            tree.add(Node::new(id_with_bit0(0, i), endpoint(7000))).unwrap();
        }
        // Subsequent non-local-path records beyond bin+cache capacity are
        // simply absent from the tree, not error (spec: "eventually discarded").
        let all = tree.get_all_nodes();
        let zero_side = all.iter().filter(|n| n.node_id().bit(0) == 0).count();
        assert!(zero_side <= 2, "non-local subtree must not grow past K once B is exhausted");
    }

    #[test]
    fn consolidate_collapses_small_subtrees() {
        let local = id_with_bit0(1, 0xaa);
        let mut tree = RoutingTree::new(local, 4, 5);

        let mut ids = Vec::new();
        for i in 0..4u8 {
            let id = id_with_bit0(0, i);
            ids.push(id);
            tree.add(Node::new(id, endpoint(7000))).unwrap();
        }
        for i in 0..4u8 {
            let id = id_with_bit0(1, i);
            ids.push(id);
            tree.add(Node::new(id, endpoint(7000))).unwrap();
        }
        // one more on the zero side forces a split (bin full, B not exhausted)
        let extra = id_with_bit0(0, 200);
        ids.push(extra);
        tree.add(Node::new(extra, endpoint(7000))).unwrap();
        assert_eq!(tree.len(), 9);

        // Remove enough that the split subtree's combined population drops
        // to <= k/2 = 2, which must collapse it back to a single leaf while
        // keeping all remaining records reachable.
        for id in ids.iter().take(7) {
            tree.remove(*id);
        }
        assert_eq!(tree.len(), 2);
        for id in ids.iter().skip(7) {
            assert!(tree.get_by_id(*id).is_some());
        }
    }
}
