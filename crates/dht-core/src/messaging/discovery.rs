//! Discovery registry (context 0x00, spec §4.6): peer-discovery msgtypes plus
//! the neighbour-poll / zone-poll / verify-peers / reap scheduled tasks.

use crate::config::Config;
use crate::messaging::scheduler::Scheduler;

use super::{FNOD, NODE_REPLY_DISCOVERY, PING, PONG};

pub fn has_message(msg_type: u8) -> bool {
    matches!(msg_type, PING | PONG | FNOD | NODE_REPLY_DISCOVERY)
}

pub fn has_command(cmd: &str) -> bool {
    matches!(cmd, "NODE" | "PEERS" | "RESET" | "START" | "STOP" | "FNOD")
}

/// One of this registry's due scheduled tasks (spec §4.6). The engine decides
/// how to carry each out (which transactions to start, which peers to ping);
/// this type only decides *when*.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// FindNodes targeting the local node's own id, every 120 s.
    PollNeighbours,
    /// FindNodes targeting a fresh random id, every 300 s.
    PollZone,
    /// Ping up to three random known peers, every 61 s.
    VerifyPeers,
    /// Remove peers in `failed` liveness, every 62 s.
    Reap,
}

const NEIGHBOUR_POLL: usize = 0;
const ZONE_POLL: usize = 1;
const VERIFY_PEERS: usize = 2;
const REAP: usize = 3;
const TASK_COUNT: usize = 4;

pub struct DiscoveryRegistry {
    scheduler: Scheduler,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        DiscoveryRegistry {
            scheduler: Scheduler::new(TASK_COUNT),
        }
    }

    /// Returns every task whose interval has elapsed since its last firing,
    /// resetting that task's clock. Order matches §4.6's listing.
    pub fn trigger_events(&mut self, config: &Config) -> Vec<DiscoveryEvent> {
        let mut due = Vec::new();

        if self.scheduler.poll(NEIGHBOUR_POLL, config.neighbour_poll_interval) {
            due.push(DiscoveryEvent::PollNeighbours);
        }
        if self.scheduler.poll(ZONE_POLL, config.zone_poll_interval) {
            due.push(DiscoveryEvent::PollZone);
        }
        if self.scheduler.poll(VERIFY_PEERS, config.verify_peers_interval) {
            due.push(DiscoveryEvent::VerifyPeers);
        }
        if self.scheduler.poll(REAP, config.reap_interval) {
            due.push(DiscoveryEvent::Reap);
        }
        due
    }
}

impl Default for DiscoveryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
