//! A capacity-K bin of Node records plus its replacement cache (spec §3
//! "Routing bin", §4.2 "Replacement cache"). Grounded in the insertion-ordered
//! `Vec<RoutingEntry>`-per-bucket shape that `lib-storage::dht::routing`'s own
//! doc comments describe as `KademliaRouter`'s pre-migration design, before
//! it was folded into a flat `HashMap<NodeId, DhtPeerEntry>`. The tree/bin
//! structure is wanted directly here, so that's what's implemented rather
//! than the flattened registry.

use crate::node::Node;
use dht_crypto::Id;
use std::collections::VecDeque;
use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct RoutingBin {
    capacity: usize,
    entries: Vec<Node>,
    /// FIFO by insertion time, capped at `capacity`; oldest entries are
    /// dropped when the cache overflows (spec §9 Open Questions resolves the
    /// source's inconsistent eviction order this way).
    cache: VecDeque<Node>,
}

impl RoutingBin {
    pub fn new(capacity: usize) -> Self {
        RoutingBin {
            capacity,
            entries: Vec::with_capacity(capacity),
            cache: VecDeque::with_capacity(capacity),
        }
    }

    /// Rebuilds a bin from a flat set of records (used by tree consolidate);
    /// the cache starts empty since a consolidate discards cached overflow.
    pub fn from_records(mut records: Vec<Node>, capacity: usize) -> Self {
        records.truncate(capacity.max(records.len()));
        RoutingBin {
            capacity,
            entries: records,
            cache: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn entries(&self) -> &[Node] {
        &self.entries
    }

    pub fn contains(&self, node_id: Id) -> bool {
        self.entries.iter().any(|n| n.node_id() == node_id)
    }

    pub fn get(&self, node_id: Id) -> Option<&Node> {
        self.entries.iter().find(|n| n.node_id() == node_id)
    }

    pub fn get_mut(&mut self, node_id: Id) -> Option<&mut Node> {
        self.entries.iter_mut().find(|n| n.node_id() == node_id)
    }

    pub fn get_by_addr(&self, address: IpAddr, port: u16) -> Option<&Node> {
        self.entries
            .iter()
            .find(|n| n.endpoint.address == address && n.endpoint.port == port)
    }

    /// Inserts into the bin directly. Caller must have already checked
    /// `!is_full()` and `!contains(node.node_id())`.
    pub fn push(&mut self, node: Node) {
        debug_assert!(!self.is_full());
        debug_assert!(!self.contains(node.node_id()));
        self.entries.push(node);
    }

    /// Sends `node` to the replacement cache (bin was full at insert time).
    /// Most-recent at the tail; oldest dropped once the cache itself overflows.
    pub fn push_to_cache(&mut self, node: Node) {
        if self.cache.len() >= self.capacity {
            self.cache.pop_front();
        }
        self.cache.push_back(node);
    }

    /// Removes `node_id` from the bin if present. On success, promotes the
    /// most-recently-cached record into the freed slot (spec §4.2).
    pub fn remove(&mut self, node_id: Id) -> bool {
        let before = self.entries.len();
        self.entries.retain(|n| n.node_id() != node_id);
        let removed = self.entries.len() != before;
        if removed {
            if let Some(promoted) = self.cache.pop_back() {
                self.entries.push(promoted);
            }
        }
        removed
    }

    pub fn update_endpoint(&mut self, node_id: Id, address: IpAddr, port: u16) -> bool {
        if let Some(n) = self.get_mut(node_id) {
            n.endpoint.address = address;
            n.endpoint.port = port;
            true
        } else {
            false
        }
    }
}
