//! FindNodes state machine (spec §4.5.1): locate the K closest known nodes to
//! a target identifier via bounded-fan-out iterative querying.
//!
//! This type owns only the working-set bookkeeping; it does not itself touch
//! sockets. The engine drives it by calling [`FindNodesTransaction::start`]
//! and [`FindNodesTransaction::handle_response`], sending an FNOD query to
//! every id each returns and feeding back whatever arrives.

use crate::node::{Endpoint, Node};
use crate::routing::RoutingTree;
use dht_crypto::Id;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindNodesState {
    Initialised,
    Querying,
    WaitingResponse,
    Exhausted,
    TimedOut,
}

impl FindNodesState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FindNodesState::Exhausted | FindNodesState::TimedOut)
    }
}

pub struct FindNodesTransaction {
    target: Id,
    k: usize,
    alpha: usize,
    closest: Vec<Node>,
    unqueried: Vec<Id>,
    queried: HashSet<Id>,
    outstanding: HashMap<Id, Instant>,
    state: FindNodesState,
}

impl FindNodesTransaction {
    pub fn new(target: Id, k: usize, alpha: usize) -> Self {
        FindNodesTransaction {
            target,
            k,
            alpha,
            closest: Vec::new(),
            unqueried: Vec::new(),
            queried: HashSet::new(),
            outstanding: HashMap::new(),
            state: FindNodesState::Initialised,
        }
    }

    pub fn target(&self) -> Id {
        self.target
    }

    pub fn state(&self) -> FindNodesState {
        self.state
    }

    /// Current best-K, sorted by ascending distance to `target`.
    pub fn closest(&self) -> &[Node] {
        &self.closest
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// When `id` was sent its outstanding FNOD query, if still outstanding.
    /// Read this *before* calling [`handle_response`](Self::handle_response)
    /// for that responder — a response removes the entry from `outstanding`.
    pub fn sent_at(&self, id: Id) -> Option<Instant> {
        self.outstanding.get(&id).copied()
    }

    /// `initialised -> querying`: seeds `closest`/`unqueried` from the
    /// routing tree and drains up to alpha into `outstanding`. Returns the
    /// ids the caller must send an FNOD query to.
    pub fn start(&mut self, routing: &RoutingTree) -> Vec<Id> {
        if self.state != FindNodesState::Initialised {
            return Vec::new();
        }
        self.closest = routing.closest_to(self.target, self.k);
        self.unqueried = self.closest.iter().map(|n| n.node_id()).collect();
        self.state = FindNodesState::Querying;
        self.top_up()
    }

    /// Drains `unqueried` into `outstanding` up to alpha, returning the
    /// newly-outstanding ids, and updates the querying/waiting_response
    /// distinction.
    fn top_up(&mut self) -> Vec<Id> {
        let mut sent = Vec::new();
        while self.outstanding.len() < self.alpha {
            let Some(id) = self.unqueried.pop() else { break };
            if self.queried.contains(&id) || self.outstanding.contains_key(&id) {
                continue;
            }
            self.outstanding.insert(id, Instant::now());
            sent.push(id);
        }
        self.recompute_terminal_state();
        sent
    }

    fn recompute_terminal_state(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if self.unqueried.is_empty() && self.outstanding.is_empty() {
            self.state = FindNodesState::Exhausted;
        } else if self.unqueried.is_empty() {
            self.state = FindNodesState::WaitingResponse;
        } else {
            self.state = FindNodesState::Querying;
        }
    }

    /// A response from `responder` carrying its offered (id, endpoint) pairs
    /// (spec §6.1 NODE_REPLY). Accepted only while `responder` is in
    /// `outstanding`; a later duplicate for the same responder is ignored.
    /// Returns the ids of any newly queried peers.
    pub fn handle_response(
        &mut self,
        responder: Id,
        offered: Vec<(Id, Endpoint)>,
        routing: &mut RoutingTree,
    ) -> Vec<Id> {
        if self.state.is_terminal() || self.outstanding.remove(&responder).is_none() {
            return Vec::new();
        }
        self.queried.insert(responder);

        for (id, endpoint) in offered {
            if id == routing.local_id() {
                continue;
            }
            if routing.get_by_id(id).is_none() {
                let _ = routing.add(Node::new(id, endpoint));
            }
            if !self.closest.iter().any(|n| n.node_id() == id) {
                if let Some(node) = routing.get_by_id(id) {
                    self.closest.push(node);
                }
            }
        }

        let target = self.target;
        self.closest.sort_by_key(|n| n.node_id().distance(&target));
        self.closest.truncate(self.k);
        self.unqueried = self
            .closest
            .iter()
            .map(|n| n.node_id())
            .filter(|id| !self.queried.contains(id) && !self.outstanding.contains_key(id))
            .collect();

        self.top_up()
    }

    /// `* -> timed_out` on age (driven by the transaction map, spec §5).
    /// Idempotent. Entering `exhausted` this way also marks any still-
    /// outstanding peers' timeout so their failure counters advance.
    pub fn timeout(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = FindNodesState::TimedOut;
    }

    /// Ids still outstanding when the transaction left the `querying`/
    /// `waiting_response` states, so the caller can call `Node::record_timeout`
    /// on each (spec §4.5.1: "any remaining outstanding peers are marked
    /// timeout()").
    pub fn drain_outstanding(&mut self) -> Vec<Id> {
        self.outstanding.drain().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn endpoint(port: u16) -> Endpoint {
        Endpoint {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
        }
    }

    #[test]
    fn start_with_empty_tree_exhausts_immediately() {
        let local = dht_crypto::random_id();
        let routing = RoutingTree::new(local, 8, 5);
        let mut tx = FindNodesTransaction::new(dht_crypto::random_id(), 8, 3);
        let sent = tx.start(&routing);
        assert!(sent.is_empty());
        assert_eq!(tx.state(), FindNodesState::Exhausted);
    }

    #[test]
    fn start_drains_up_to_alpha() {
        let local = dht_crypto::random_id();
        let mut routing = RoutingTree::new(local, 8, 5);
        for i in 0..8u8 {
            routing
                .add(Node::new(dht_crypto::random_id(), endpoint(7000 + i as u16)))
                .unwrap();
        }
        let mut tx = FindNodesTransaction::new(dht_crypto::random_id(), 8, 3);
        let sent = tx.start(&routing);
        assert_eq!(sent.len(), 3);
        assert_eq!(tx.state(), FindNodesState::WaitingResponse);
        assert_eq!(tx.outstanding_count(), 3);
    }

    #[test]
    fn duplicate_response_from_same_peer_is_ignored() {
        let local = dht_crypto::random_id();
        let mut routing = RoutingTree::new(local, 8, 5);
        let peer = dht_crypto::random_id();
        routing.add(Node::new(peer, endpoint(7001))).unwrap();

        let mut tx = FindNodesTransaction::new(dht_crypto::random_id(), 8, 3);
        tx.start(&routing);
        let first = tx.handle_response(peer, vec![], &mut routing);
        assert!(first.is_empty() || tx.state() == FindNodesState::Exhausted);
        let second = tx.handle_response(peer, vec![], &mut routing);
        assert!(second.is_empty());
    }

    #[test]
    fn handle_response_discovers_and_requeries_new_nodes() {
        let local = dht_crypto::random_id();
        let mut routing = RoutingTree::new(local, 8, 5);
        let peer = dht_crypto::random_id();
        routing.add(Node::new(peer, endpoint(7001))).unwrap();

        let mut tx = FindNodesTransaction::new(dht_crypto::random_id(), 8, 3);
        tx.start(&routing);

        let discovered = dht_crypto::random_id();
        let sent = tx.handle_response(peer, vec![(discovered, endpoint(7002))], &mut routing);
        assert!(sent.contains(&discovered));
        assert!(routing.get_by_id(discovered).is_some());
    }

    #[test]
    fn exhausts_once_all_queried_and_none_outstanding() {
        let local = dht_crypto::random_id();
        let mut routing = RoutingTree::new(local, 8, 5);
        let peer = dht_crypto::random_id();
        routing.add(Node::new(peer, endpoint(7001))).unwrap();

        let mut tx = FindNodesTransaction::new(dht_crypto::random_id(), 8, 3);
        tx.start(&routing);
        tx.handle_response(peer, vec![], &mut routing);
        assert_eq!(tx.state(), FindNodesState::Exhausted);
    }

    #[test]
    fn timeout_is_idempotent_and_terminal() {
        let local = dht_crypto::random_id();
        let routing = RoutingTree::new(local, 8, 5);
        let mut tx = FindNodesTransaction::new(dht_crypto::random_id(), 8, 3);
        tx.start(&routing);
        tx.timeout();
        tx.timeout();
        assert_eq!(tx.state(), FindNodesState::TimedOut);
    }

    #[test]
    fn timeout_does_not_override_exhausted() {
        let local = dht_crypto::random_id();
        let routing = RoutingTree::new(local, 8, 5);
        let mut tx = FindNodesTransaction::new(dht_crypto::random_id(), 8, 3);
        tx.start(&routing);
        assert_eq!(tx.state(), FindNodesState::Exhausted);
        tx.timeout();
        assert_eq!(tx.state(), FindNodesState::Exhausted);
    }
}
