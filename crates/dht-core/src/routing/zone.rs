//! A node of the routing tree: leaf or internal (spec §3 "Routing zone",
//! §4.2 split/consolidate policy). Implemented without parent back-pointers
//! per spec §9's design note: split/consolidate decisions are made by the
//! recursive call itself (split always happens on the frame that holds the
//! full leaf; consolidate is checked by the caller immediately after a
//! recursive `remove` returns), rather than a child signalling upward through
//! a cycle.

use crate::node::Node;
use crate::routing::bin::RoutingBin;
use dht_crypto::Id;
use std::net::IpAddr;
use tracing::debug_span;

pub(crate) enum ZoneKind {
    Leaf(RoutingBin),
    Internal(Box<Zone>, Box<Zone>),
}

pub(crate) struct Zone {
    pub depth: u32,
    pub prefix: String,
    pub kind: ZoneKind,
}

fn prefix_for(parent_prefix: &str, bit: u8) -> String {
    format!("{}{}", parent_prefix, bit)
}

impl Zone {
    pub fn new_leaf(depth: u32, prefix: String, capacity: usize) -> Self {
        Zone {
            depth,
            prefix,
            kind: ZoneKind::Leaf(RoutingBin::new(capacity)),
        }
    }

    pub fn population(&self) -> usize {
        match &self.kind {
            ZoneKind::Leaf(bin) => bin.len(),
            ZoneKind::Internal(l, r) => l.population() + r.population(),
        }
    }

    pub fn collect_all(&self, out: &mut Vec<Node>) {
        match &self.kind {
            ZoneKind::Leaf(bin) => out.extend(bin.entries().iter().cloned()),
            ZoneKind::Internal(l, r) => {
                l.collect_all(out);
                r.collect_all(out);
            }
        }
    }

    /// Inserts `node`, splitting this leaf if it's full and eligible
    /// (spec §4.2 split policy). `on_local_path` is true iff every bit of
    /// `node_id` routed through so far matches the local node's identifier at
    /// the same positions — i.e. this is (a prefix of) the leaf the local
    /// node itself would resolve to.
    pub fn add(&mut self, node: Node, k: usize, b: u32, local_id: Id, on_local_path: bool) {
        match &mut self.kind {
            ZoneKind::Internal(left, right) => {
                let depth = self.depth as usize;
                let bit = node.node_id().bit(depth);
                let local_bit = local_id.bit(depth);
                if bit == 0 {
                    left.add(node, k, b, local_id, on_local_path && local_bit == 0);
                } else {
                    right.add(node, k, b, local_id, on_local_path && local_bit == 1);
                }
            }
            ZoneKind::Leaf(bin) => {
                if bin.contains(node.node_id()) {
                    bin.remove(node.node_id());
                    bin.push(node);
                    return;
                }
                if !bin.is_full() {
                    bin.push(node);
                    return;
                }

                let depth = self.depth;
                let eligible_depth = (depth as usize) < dht_crypto::ID_LEN * 8;
                let eligible = eligible_depth && (on_local_path || depth < b);

                if eligible {
                    self.split(k);
                    // retry on the now-Internal zone; recurses at most to full depth.
                    self.add(node, k, b, local_id, on_local_path);
                } else {
                    bin.push_to_cache(node);
                }
            }
        }
    }

    /// Splits a full leaf into two empty leaves at `depth + 1`, redistributing
    /// its records by their bit at `depth`. The replacement cache is
    /// discarded (spec §4.2).
    fn split(&mut self, k: usize) {
        let _span = debug_span!("routing_tree.split", depth = self.depth, prefix = %self.prefix).entered();
        let (old_bin, depth, prefix) = match std::mem::replace(
            &mut self.kind,
            ZoneKind::Leaf(RoutingBin::new(k)),
        ) {
            ZoneKind::Leaf(bin) => (bin, self.depth, self.prefix.clone()),
            internal => {
                // Already internal; nothing to do (defensive, not reachable
                // from `add`'s call site).
                self.kind = internal;
                return;
            }
        };

        let mut left = Zone::new_leaf(depth + 1, prefix_for(&prefix, 0), k);
        let mut right = Zone::new_leaf(depth + 1, prefix_for(&prefix, 1), k);

        for node in old_bin.entries().iter().cloned() {
            let bit = node.node_id().bit(depth as usize);
            let target = if bit == 0 { &mut left } else { &mut right };
            match &mut target.kind {
                ZoneKind::Leaf(bin) => bin.push(node),
                ZoneKind::Internal(..) => unreachable!("freshly created leaves"),
            }
        }

        self.kind = ZoneKind::Internal(Box::new(left), Box::new(right));
    }

    /// Removes `node_id`, which by the tree invariant resides at the leaf its
    /// own bits select. Returns whether a record was actually removed.
    /// Collapses this zone into a fresh leaf if, after removal, the combined
    /// population of the subtree has fallen to `<= k / 2` (spec §4.2).
    pub fn remove(&mut self, node_id: Id, k: usize) -> bool {
        match &mut self.kind {
            ZoneKind::Leaf(bin) => bin.remove(node_id),
            ZoneKind::Internal(left, right) => {
                let depth = self.depth as usize;
                let bit = node_id.bit(depth);
                let removed = if bit == 0 {
                    left.remove(node_id, k)
                } else {
                    right.remove(node_id, k)
                };

                if removed && self.population() <= k / 2 {
                    let _span = debug_span!("routing_tree.consolidate", depth = self.depth, prefix = %self.prefix).entered();
                    let mut all = Vec::new();
                    left.collect_all(&mut all);
                    right.collect_all(&mut all);
                    self.kind = ZoneKind::Leaf(RoutingBin::from_records(all, k));
                }

                removed
            }
        }
    }

    pub fn get_by_id(&self, node_id: Id) -> Option<&Node> {
        match &self.kind {
            ZoneKind::Leaf(bin) => bin.get(node_id),
            ZoneKind::Internal(left, right) => {
                let bit = node_id.bit(self.depth as usize);
                if bit == 0 {
                    left.get_by_id(node_id)
                } else {
                    right.get_by_id(node_id)
                }
            }
        }
    }

    pub fn get_by_id_mut(&mut self, node_id: Id) -> Option<&mut Node> {
        match &mut self.kind {
            ZoneKind::Leaf(bin) => bin.get_mut(node_id),
            ZoneKind::Internal(left, right) => {
                let bit = node_id.bit(self.depth as usize);
                if bit == 0 {
                    left.get_by_id_mut(node_id)
                } else {
                    right.get_by_id_mut(node_id)
                }
            }
        }
    }

    pub fn get_by_addr(&self, address: IpAddr, port: u16) -> Option<&Node> {
        match &self.kind {
            ZoneKind::Leaf(bin) => bin.get_by_addr(address, port),
            ZoneKind::Internal(left, right) => left
                .get_by_addr(address, port)
                .or_else(|| right.get_by_addr(address, port)),
        }
    }
}
