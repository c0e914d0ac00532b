//! In-flight lookup registry: txid allocation, age-based timeout/expire sweep
//! (spec §4.5 "Transaction map"). The four lookup kinds live in their own
//! submodules as explicit tagged state machines (spec §9's redesign note);
//! this module only owns their lifecycle, not their transition logic.

pub mod find_nodes;
pub mod find_value;
pub mod ping;
pub mod store_value;

use crate::error::TransactionError;
use dht_crypto::Id;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub use find_nodes::{FindNodesState, FindNodesTransaction};
pub use find_value::{FindValueState, FindValueTransaction};
pub use ping::{PingState, PingTransaction};
pub use store_value::{StoreValueState, StoreValueTransaction};

/// The four lookup kinds, unified so the transaction map can sweep them
/// uniformly without knowing which kind a given txid holds.
pub enum Transaction {
    FindNodes(FindNodesTransaction),
    FindValue(FindValueTransaction),
    StoreValue(StoreValueTransaction),
    Ping(PingTransaction),
}

impl Transaction {
    /// Idempotent age-based timeout (spec §4.5: "`timeout()` must be
    /// idempotent"). A no-op once the transaction has reached any terminal
    /// state.
    pub fn timeout(&mut self) {
        match self {
            Transaction::FindNodes(t) => t.timeout(),
            Transaction::FindValue(t) => t.timeout(),
            Transaction::StoreValue(t) => t.timeout(),
            Transaction::Ping(t) => t.timeout(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            Transaction::FindNodes(t) => t.state().is_terminal(),
            Transaction::FindValue(t) => t.state().is_terminal(),
            Transaction::StoreValue(t) => t.state().is_terminal(),
            Transaction::Ping(t) => t.state().is_terminal(),
        }
    }

    /// When `responder` was sent its outstanding query, for the three lookup
    /// kinds that can send more than one query over the transaction's life
    /// (a later top-up round overstates that responder's RTT if the caller
    /// instead uses the transaction's overall `created_at`). `Ping` sends
    /// exactly one query for its whole life, so its RTT is already exact from
    /// `created_at` and it has no per-query bookkeeping of its own.
    pub fn sent_at(&self, responder: Id) -> Option<Instant> {
        match self {
            Transaction::FindNodes(t) => t.sent_at(responder),
            Transaction::FindValue(t) => t.sent_at(responder),
            Transaction::StoreValue(t) => t.sent_at(responder),
            Transaction::Ping(_) => None,
        }
    }
}

struct Entry {
    created_at: Instant,
    transaction: Transaction,
}

/// Owns every in-flight transaction, keyed by a random 32-bit id unique among
/// the currently-live set (spec §3 "Transaction" invariant).
#[derive(Default)]
pub struct TransactionMap {
    entries: HashMap<u32, Entry>,
}

impl TransactionMap {
    pub fn new() -> Self {
        TransactionMap {
            entries: HashMap::new(),
        }
    }

    /// Allocates a fresh id by rejection sampling against the live set (spec
    /// §4.5) and inserts `transaction` under it.
    pub fn insert(&mut self, transaction: Transaction) -> u32 {
        let txid = loop {
            let candidate = dht_crypto::random_u32();
            if !self.entries.contains_key(&candidate) {
                break candidate;
            }
        };
        self.entries.insert(
            txid,
            Entry {
                created_at: Instant::now(),
                transaction,
            },
        );
        txid
    }

    pub fn get(&self, txid: u32) -> Result<&Transaction, TransactionError> {
        self.entries
            .get(&txid)
            .map(|e| &e.transaction)
            .ok_or(TransactionError::NotFound)
    }

    pub fn get_mut(&mut self, txid: u32) -> Result<&mut Transaction, TransactionError> {
        self.entries
            .get_mut(&txid)
            .map(|e| &mut e.transaction)
            .ok_or(TransactionError::NotFound)
    }

    pub fn remove(&mut self, txid: u32) -> Option<Transaction> {
        self.entries.remove(&txid).map(|e| e.transaction)
    }

    /// Pulls a transaction out of the map together with its original creation
    /// time, freeing the borrow on `self` so the caller can mutate the
    /// transaction alongside other owned state (e.g. the routing tree) and
    /// then [`reinsert`](Self::reinsert) it if it is still live.
    pub fn take(&mut self, txid: u32) -> Option<(Transaction, Instant)> {
        self.entries.remove(&txid).map(|e| (e.transaction, e.created_at))
    }

    /// Puts a transaction back under its original id, preserving `created_at`
    /// so age-based timeout/expire sweeps see its true age rather than
    /// restarting the clock.
    pub fn reinsert(&mut self, txid: u32, transaction: Transaction, created_at: Instant) {
        self.entries.insert(txid, Entry { created_at, transaction });
    }

    pub fn created_at(&self, txid: u32) -> Option<Instant> {
        self.entries.get(&txid).map(|e| e.created_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calls `timeout()` on every transaction older than `max_age` (spec
    /// §4.5/§5: age > 5 s). Idempotent by construction since `timeout()`
    /// itself is idempotent.
    pub fn timeout(&mut self, max_age: Duration) {
        let now = Instant::now();
        for entry in self.entries.values_mut() {
            if now.duration_since(entry.created_at) > max_age {
                entry.transaction.timeout();
            }
        }
    }

    /// Deletes every transaction older than `max_age` regardless of state
    /// (spec §4.5/§5: age > 30 s).
    pub fn expire(&mut self, max_age: Duration) {
        let now = Instant::now();
        self.entries
            .retain(|_, entry| now.duration_since(entry.created_at) <= max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::ping::PingTransaction;

    #[test]
    fn insert_allocates_distinct_ids() {
        let mut map = TransactionMap::new();
        let a = map.insert(Transaction::Ping(PingTransaction::new(dht_crypto::random_id())));
        let b = map.insert(Transaction::Ping(PingTransaction::new(dht_crypto::random_id())));
        assert_ne!(a, b);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn expire_removes_regardless_of_state() {
        let mut map = TransactionMap::new();
        let txid = map.insert(Transaction::Ping(PingTransaction::new(dht_crypto::random_id())));
        map.expire(Duration::from_secs(0));
        assert_eq!(map.get(txid).unwrap_err(), TransactionError::NotFound);
    }

    #[test]
    fn timeout_is_idempotent() {
        let mut map = TransactionMap::new();
        let txid = map.insert(Transaction::Ping(PingTransaction::new(dht_crypto::random_id())));
        map.timeout(Duration::from_secs(0));
        map.timeout(Duration::from_secs(0));
        match map.get(txid).unwrap() {
            Transaction::Ping(t) => assert_eq!(t.state(), PingState::TimedOut),
            _ => unreachable!(),
        }
    }

    #[test]
    fn get_mut_missing_is_not_found() {
        let mut map = TransactionMap::new();
        assert_eq!(map.get_mut(999).unwrap_err(), TransactionError::NotFound);
    }

    #[test]
    fn sent_at_reports_per_query_send_time_for_find_nodes() {
        use crate::node::{Endpoint, Node};
        use crate::routing::RoutingTree;
        use std::net::{IpAddr, Ipv4Addr};

        let local = dht_crypto::random_id();
        let mut routing = RoutingTree::new(local, 8, 5);
        let peer = dht_crypto::random_id();
        routing
            .add(Node::new(
                peer,
                Endpoint {
                    address: IpAddr::V4(Ipv4Addr::LOCALHOST),
                    port: 7001,
                },
            ))
            .unwrap();

        let mut tx = find_nodes::FindNodesTransaction::new(dht_crypto::random_id(), 8, 3);
        tx.start(&routing);
        let transaction = Transaction::FindNodes(tx);
        assert!(transaction.sent_at(peer).is_some());
        assert!(transaction.sent_at(dht_crypto::random_id()).is_none());
    }

    #[test]
    fn sent_at_is_none_for_ping_which_has_no_per_query_bookkeeping() {
        let tx = Transaction::Ping(PingTransaction::new(dht_crypto::random_id()));
        assert!(tx.sent_at(dht_crypto::random_id()).is_none());
    }
}
