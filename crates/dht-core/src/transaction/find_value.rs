//! FindValue state machine (spec §4.5.2): identical shape to FindNodes with
//! one additional terminal state, `found`, entered on a VALUE_REPLY.

use super::find_nodes::{FindNodesState, FindNodesTransaction};
use crate::node::Endpoint;
use crate::routing::RoutingTree;
use dht_crypto::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindValueState {
    Initialised,
    Querying,
    WaitingResponse,
    Found,
    Exhausted,
    TimedOut,
}

impl FindValueState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FindValueState::Found | FindValueState::Exhausted | FindValueState::TimedOut
        )
    }
}

fn lift(inner: FindNodesState) -> FindValueState {
    match inner {
        FindNodesState::Initialised => FindValueState::Initialised,
        FindNodesState::Querying => FindValueState::Querying,
        FindNodesState::WaitingResponse => FindValueState::WaitingResponse,
        FindNodesState::Exhausted => FindValueState::Exhausted,
        FindNodesState::TimedOut => FindValueState::TimedOut,
    }
}

pub struct FindValueTransaction {
    /// The wire target is `id_for_key(user_key)` (spec §4.5.2); `user_key` is
    /// kept alongside so the engine can label the eventual value-table entry.
    user_key: String,
    inner: FindNodesTransaction,
    found_value: Option<Vec<u8>>,
    found_state: bool,
}

impl FindValueTransaction {
    pub fn new(user_key: String, k: usize, alpha: usize) -> Self {
        let target = dht_crypto::Id::for_key(user_key.as_bytes());
        FindValueTransaction {
            user_key,
            inner: FindNodesTransaction::new(target, k, alpha),
            found_value: None,
            found_state: false,
        }
    }

    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    pub fn target(&self) -> Id {
        self.inner.target()
    }

    pub fn state(&self) -> FindValueState {
        if self.found_state {
            FindValueState::Found
        } else {
            lift(self.inner.state())
        }
    }

    pub fn found_value(&self) -> Option<&[u8]> {
        self.found_value.as_deref()
    }

    pub fn start(&mut self, routing: &RoutingTree) -> Vec<Id> {
        self.inner.start(routing)
    }

    /// A NODE_REPLY (msgtype 0x06, "DHT fallback") behaves exactly like
    /// FindNodes's response handling.
    pub fn handle_node_reply(
        &mut self,
        responder: Id,
        offered: Vec<(Id, Endpoint)>,
        routing: &mut RoutingTree,
    ) -> Vec<Id> {
        if self.found_state {
            return Vec::new();
        }
        self.inner.handle_response(responder, offered, routing)
    }

    /// A VALUE_REPLY (msgtype 0x08): terminal, stores the value and ignores
    /// any further traffic on this transaction.
    pub fn handle_value_reply(&mut self, value: Vec<u8>) {
        if self.found_state || self.inner.state().is_terminal() {
            return;
        }
        self.found_value = Some(value);
        self.found_state = true;
    }

    pub fn timeout(&mut self) {
        if self.found_state {
            return;
        }
        self.inner.timeout();
    }

    pub fn drain_outstanding(&mut self) -> Vec<Id> {
        self.inner.drain_outstanding()
    }

    pub fn sent_at(&self, id: Id) -> Option<std::time::Instant> {
        self.inner.sent_at(id)
    }
}
