//! Fragment reassembly keyed by transaction id (spec §4.4 "Defragmentation").
//! Grounded in the slot-table style of `lib-storage::dht::messaging`'s
//! `pending_responses: HashMap<...>`, generalized from "one pending reply"
//! to "one fixed-size vector of fragment slots per in-flight reassembly".

use super::packet::Fragment;
use std::collections::HashMap;

struct PartialMessage {
    msg_type: u8,
    slots: Vec<Option<Vec<u8>>>,
    filled: usize,
}

/// Reassembles fragments into complete messages. Unfragmented messages
/// (`last_index == 0, index == 0`) are delivered immediately without
/// allocating a slot table.
#[derive(Default)]
pub struct DefragMap {
    pending: HashMap<u32, PartialMessage>,
}

impl DefragMap {
    pub fn new() -> Self {
        DefragMap {
            pending: HashMap::new(),
        }
    }

    /// Feeds one fragment in. Returns `Some((txid, msg_type, content))` once
    /// every fragment for its txid has arrived; the slot is discarded at
    /// that point. Fragments may arrive out of order and, for content whose
    /// length divides evenly into full chunks, may include a duplicate
    /// delivery of an already-filled slot — the latest copy for a given
    /// index simply overwrites its slot.
    pub fn accept(&mut self, fragment: Fragment) -> Option<(u32, u8, Vec<u8>)> {
        if fragment.last_index == 0 && fragment.index == 0 {
            return Some((fragment.txid, fragment.msg_type, fragment.content));
        }

        let entry = self.pending.entry(fragment.txid).or_insert_with(|| PartialMessage {
            msg_type: fragment.msg_type,
            slots: vec![None; fragment.last_index as usize + 1],
            filled: 0,
        });

        let idx = fragment.index as usize;
        if idx >= entry.slots.len() {
            // Inconsistent last_index from a later fragment of the same txid;
            // drop rather than panic (malformed/adversarial input).
            return None;
        }
        if entry.slots[idx].is_none() {
            entry.filled += 1;
        }
        entry.slots[idx] = Some(fragment.content);

        if entry.filled == entry.slots.len() {
            let done = self.pending.remove(&fragment.txid).unwrap();
            let content: Vec<u8> = done.slots.into_iter().flatten().flatten().collect();
            Some((fragment.txid, done.msg_type, content))
        } else {
            None
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn discard(&mut self, txid: u32) {
        self.pending.remove(&txid);
    }
}
