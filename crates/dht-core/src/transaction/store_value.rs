//! StoreValue state machine (spec §4.5.3): drives a sub-FindNodes targeting
//! `id_for_key(key)`, then unicasts a STOR to each of the K closest nodes it
//! returns. No per-recipient acknowledgement is required.

use super::find_nodes::{FindNodesState, FindNodesTransaction};
use crate::node::{Endpoint, Node};
use crate::routing::RoutingTree;
use dht_crypto::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreValueState {
    Initialised,
    WaitingResponse,
    Storing,
    Stored,
    TimedOut,
}

impl StoreValueState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StoreValueState::Stored | StoreValueState::TimedOut)
    }
}

pub struct StoreValueTransaction {
    key: Vec<u8>,
    /// Opaque namespace string (spec §9 open question): not read by routing,
    /// carried through to the outgoing wire STOR so a remote peer sees the
    /// same value the local client supplied.
    context: String,
    value: Vec<u8>,
    lookup: FindNodesTransaction,
    state: StoreValueState,
    /// Recipients the engine has been told to STOR to, filled in once the
    /// sub-lookup exhausts.
    targets: Vec<Node>,
}

impl StoreValueTransaction {
    pub fn new(key: Vec<u8>, context: String, value: Vec<u8>, k: usize, alpha: usize) -> Self {
        let target_id = Id::for_key(&key);
        StoreValueTransaction {
            key,
            context,
            value,
            lookup: FindNodesTransaction::new(target_id, k, alpha),
            state: StoreValueState::Initialised,
            targets: Vec::new(),
        }
    }

    pub fn target(&self) -> Id {
        self.lookup.target()
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn state(&self) -> StoreValueState {
        self.state
    }

    /// The K closest nodes once storing has begun (empty until then).
    pub fn targets(&self) -> &[Node] {
        &self.targets
    }

    /// `initialised -> waiting_response`, or straight to `stored` if the
    /// sub-lookup has nobody to query (an empty or sparse routing tree
    /// exhausts `FindNodesTransaction::start` synchronously). Returns the ids
    /// the caller must send FNOD queries to, plus any unicast-STOR targets
    /// the caller must notify immediately because the sub-lookup already
    /// finished.
    pub fn start(&mut self, routing: &RoutingTree) -> (Vec<Id>, Vec<Node>) {
        if self.state != StoreValueState::Initialised {
            return (Vec::new(), Vec::new());
        }
        let sent = self.lookup.start(routing);
        if self.lookup.state() == FindNodesState::Exhausted {
            self.targets = self.lookup.closest().to_vec();
            self.state = StoreValueState::Stored;
            (sent, self.targets.clone())
        } else {
            self.state = StoreValueState::WaitingResponse;
            (sent, Vec::new())
        }
    }

    /// Feeds a NODE_REPLY into the sub-lookup. Once the sub-lookup exhausts,
    /// transitions to `storing` and returns the unicast-STOR targets; returns
    /// the ids of any further FNOD queries the sub-lookup still needs sent
    /// otherwise.
    pub fn handle_node_reply(
        &mut self,
        responder: Id,
        offered: Vec<(Id, Endpoint)>,
        routing: &mut RoutingTree,
    ) -> (Vec<Id>, Vec<Node>) {
        if self.state.is_terminal() {
            return (Vec::new(), Vec::new());
        }
        let sent = self.lookup.handle_response(responder, offered, routing);
        if self.lookup.state() == FindNodesState::Exhausted {
            self.state = StoreValueState::Storing;
            self.targets = self.lookup.closest().to_vec();
            self.state = StoreValueState::Stored;
            (sent, self.targets.clone())
        } else {
            (sent, Vec::new())
        }
    }

    pub fn timeout(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = StoreValueState::TimedOut;
        self.lookup.timeout();
    }

    pub fn sent_at(&self, id: Id) -> Option<std::time::Instant> {
        self.lookup.sent_at(id)
    }
}
