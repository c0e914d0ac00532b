//! Per-peer endpoint, liveness state machine, RTT history and counters
//! (spec §3 "Node record", §4.3 "Node Liveness"). Grounded in the shape of
//! `lib-storage::dht::peer_registry::DhtPeerEntry` (distance/bucket metadata
//! alongside a node) and `lib-network::dht::node::MessageStats`, generalized
//! into a single `Node` type that owns its own liveness transitions instead of
//! tracking `failed_attempts` on a separate registry entry.

use dht_crypto::Id;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

const RTT_HISTORY: usize = 10;
const FAILURES_UNTIL_DEAD: u32 = 3;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The embedded three-state liveness machine (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Liveness {
    Discovered,
    Verified,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: IpAddr,
    pub port: u16,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// A remote (or the local) peer as known to this engine.
///
/// `node_id` is immutable for the record's lifetime (spec §3 invariant); every
/// other field is mutated in place by the engine in response to liveness
/// events. Serializes for both the persistence collaborator's opaque blob and
/// the client-pipe's JSON replies (spec §6.3, §6.4) — liveness is
/// deliberately *not* round-tripped through that serialization on load; see
/// [`Node::reinitialise_liveness`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    node_id: Id,
    pub endpoint: Endpoint,

    liveness: Liveness,

    pub discovered_at: u64,
    pub first_contact: Option<u64>,
    pub last_contact: Option<u64>,
    pub last_failure: Option<u64>,

    pub queries_in: u64,
    pub queries_out: u64,
    pub responses_in: u64,
    pub responses_out: u64,
    consecutive_failures: u32,

    rtt_samples: VecDeque<f64>,
}

impl Node {
    pub fn new(node_id: Id, endpoint: Endpoint) -> Self {
        Node {
            node_id,
            endpoint,
            liveness: Liveness::Discovered,
            discovered_at: now_secs(),
            first_contact: None,
            last_contact: None,
            last_failure: None,
            queries_in: 0,
            queries_out: 0,
            responses_in: 0,
            responses_out: 0,
            consecutive_failures: 0,
            rtt_samples: VecDeque::with_capacity(RTT_HISTORY),
        }
    }

    pub fn node_id(&self) -> Id {
        self.node_id
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn is_failed(&self) -> bool {
        self.liveness == Liveness::Failed
    }

    /// discovered|verified -> verified, on an inbound response. Resets the
    /// failure counter and records an RTT sample.
    pub fn record_response(&mut self, rtt_secs: f64) {
        let at = now_secs();
        if self.first_contact.is_none() {
            self.first_contact = Some(at);
        }
        self.last_contact = Some(at);
        self.responses_in += 1;
        self.consecutive_failures = 0;
        self.liveness = Liveness::Verified;

        if self.rtt_samples.len() == RTT_HISTORY {
            self.rtt_samples.pop_front();
        }
        self.rtt_samples.push_back(rtt_secs);
    }

    /// discovered|verified -> failed on the third consecutive timeout without
    /// an intervening response; otherwise remains in state with the failure
    /// counter incremented (spec §4.3).
    pub fn record_timeout(&mut self) {
        self.last_failure = Some(now_secs());
        self.consecutive_failures += 1;
        if self.consecutive_failures >= FAILURES_UNTIL_DEAD {
            self.liveness = Liveness::Failed;
        }
    }

    pub fn record_query_out(&mut self) {
        self.queries_out += 1;
    }

    pub fn record_query_in(&mut self) {
        self.queries_in += 1;
    }

    pub fn record_response_out(&mut self) {
        self.responses_out += 1;
    }

    /// Arithmetic mean of the ten most recent RTT samples, in seconds.
    pub fn latency(&self) -> Option<f64> {
        if self.rtt_samples.is_empty() {
            return None;
        }
        Some(self.rtt_samples.iter().sum::<f64>() / self.rtt_samples.len() as f64)
    }

    /// `1 - responses_in/queries_out`, or `None` if no query has been sent yet.
    pub fn loss_rate(&self) -> Option<f64> {
        if self.queries_out == 0 {
            return None;
        }
        Some(1.0 - (self.responses_in as f64 / self.queries_out as f64))
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Must be called after deserializing a persisted `Node`: liveness is not
    /// preserved across persistence (spec §6.3), since a node that looked
    /// `verified` on disk tells us nothing about whether it's still alive.
    pub fn reinitialise_liveness(&mut self) {
        self.liveness = Liveness::Discovered;
        self.consecutive_failures = 0;
    }
}
