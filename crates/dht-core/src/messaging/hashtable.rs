//! DistributedHashtable registry (context 0x01, spec §4.6) and the stored
//! value table it schedules republication/replication/expiry over (spec §3
//! "Stored value table").

use crate::config::Config;
use crate::messaging::scheduler::Scheduler;
use dht_crypto::Id;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use super::{FVAL, NODE_REPLY_DHT, REMV, STOR, VALUE_REPLY};

pub fn has_message(msg_type: u8) -> bool {
    matches!(msg_type, FVAL | NODE_REPLY_DHT | VALUE_REPLY | STOR | REMV)
}

pub fn has_command(cmd: &str) -> bool {
    matches!(cmd, "FVAL" | "STOR" | "REMV" | "PUBL" | "HASH")
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// **(supplement, see DESIGN.md)** `key` carries the raw preimage of `key_id`
/// (`Id::for_key(&key) == key_id`), learned either from a client `STOR`
/// command or from a peer's wire STOR body. The original peerz hashtable
/// keeps only the hashed id and has no way to re-propagate a STOR it didn't
/// itself originate; storing the raw bytes here is what lets republication
/// and replication re-send a well-formed STOR rather than re-hash garbage.
/// `store_count` is a diagnostic-only supplement (spec §3) exposed via the
/// `HASH` command; it never affects routing or expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueEntry {
    pub originator: Id,
    pub last_store: u64,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub store_count: u32,
}

/// Maps a key identifier (`id_for_key(user_key)`) to its stored entry.
#[derive(Default)]
pub struct ValueTable {
    entries: HashMap<Id, ValueEntry>,
}

impl ValueTable {
    pub fn new() -> Self {
        ValueTable {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key_id: Id, originator: Id, key: Vec<u8>, value: Vec<u8>) {
        let store_count = self.entries.get(&key_id).map(|e| e.store_count).unwrap_or(0) + 1;
        self.entries.insert(
            key_id,
            ValueEntry {
                originator,
                last_store: now_secs(),
                key,
                value,
                store_count,
            },
        );
    }

    /// Refreshes `last_store` without changing the value or originator
    /// (used when republishing/replicating the existing entry).
    pub fn touch(&mut self, key_id: Id) {
        if let Some(entry) = self.entries.get_mut(&key_id) {
            entry.last_store = now_secs();
            entry.store_count += 1;
        }
    }

    /// Whole-table snapshot for the persistence collaborator (spec §6.3);
    /// liveness has no analogue here (values carry no liveness state), so
    /// unlike `RoutingTree` there's nothing to reinitialise on load.
    pub fn snapshot(&self) -> Vec<(Id, ValueEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    pub fn load(entries: Vec<(Id, ValueEntry)>) -> Self {
        ValueTable {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, key_id: Id) -> Option<&ValueEntry> {
        self.entries.get(&key_id)
    }

    pub fn remove(&mut self, key_id: Id) -> Option<ValueEntry> {
        self.entries.remove(&key_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Id, &ValueEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries originated locally and due for republication (spec §4.6: age
    /// > republish_interval).
    pub fn due_for_republish(&self, local_id: Id, config: &Config) -> Vec<Id> {
        let now = now_secs();
        self.entries
            .iter()
            .filter(|(_, e)| {
                e.originator == local_id
                    && now.saturating_sub(e.last_store) as f64 >= config.republish_interval.as_secs_f64()
            })
            .map(|(k, _)| *k)
            .collect()
    }

    /// Foreign (non-local-origin) entries — candidates for replication to
    /// whichever peers are currently the closest known holders (spec §4.6);
    /// the engine cross-references the routing tree to decide targets.
    pub fn foreign_entries(&self, local_id: Id) -> Vec<Id> {
        self.entries
            .iter()
            .filter(|(_, e)| e.originator != local_id)
            .map(|(k, _)| *k)
            .collect()
    }

    /// Removes foreign entries whose age has reached `expire_factor ×
    /// republish_interval` (spec §3 "Stored value table" invariant). Locally
    /// originated entries never expire this way; they're kept alive by
    /// republication.
    pub fn expire(&mut self, local_id: Id, config: &Config) {
        let now = now_secs();
        let threshold = config.republish_interval.as_secs_f64() * config.expire_factor;
        self.entries.retain(|_, e| {
            e.originator == local_id || (now.saturating_sub(e.last_store) as f64) < threshold
        });
    }
}

/// One of this registry's due scheduled tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashtableEvent {
    RepublishOwnValues,
    ReplicateForeignValues,
    ExpireValues,
}

const REPUBLISH: usize = 0;
const REPLICATE: usize = 1;
const TASK_COUNT: usize = 2;

pub struct HashtableRegistry {
    scheduler: Scheduler,
}

impl HashtableRegistry {
    pub fn new() -> Self {
        HashtableRegistry {
            scheduler: Scheduler::new(TASK_COUNT),
        }
    }

    /// Expiry is folded into every tick (it's cheap and has no independent
    /// schedule of its own in spec §4.6 beyond "entries whose age reaches the
    /// threshold"), so it's always returned alongside whichever of the two
    /// timed tasks is due.
    pub fn trigger_events(&mut self, config: &Config) -> Vec<HashtableEvent> {
        let mut due = vec![HashtableEvent::ExpireValues];

        if self.scheduler.poll(REPUBLISH, config.republish_interval) {
            due.push(HashtableEvent::RepublishOwnValues);
        }
        if self.scheduler.poll(REPLICATE, config.replicate_interval) {
            due.push(HashtableEvent::ReplicateForeignValues);
        }
        due
    }
}

impl Default for HashtableRegistry {
    fn default() -> Self {
        Self::new()
    }
}
