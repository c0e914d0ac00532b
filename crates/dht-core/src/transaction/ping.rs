//! Ping state machine (spec §4.5.4): send 0x01, expect 0x02.

use dht_crypto::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingState {
    Initialised,
    WaitingResponse,
    Complete,
    TimedOut,
}

impl PingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PingState::Complete | PingState::TimedOut)
    }
}

pub struct PingTransaction {
    target: Id,
    state: PingState,
    rtt_secs: Option<f64>,
}

impl PingTransaction {
    pub fn new(target: Id) -> Self {
        PingTransaction {
            target,
            state: PingState::Initialised,
            rtt_secs: None,
        }
    }

    pub fn target(&self) -> Id {
        self.target
    }

    pub fn state(&self) -> PingState {
        self.state
    }

    pub fn rtt_secs(&self) -> Option<f64> {
        self.rtt_secs
    }

    /// Transitions to `WaitingResponse`; the caller sends msgtype 0x01 to
    /// `target` and records the send time itself (RTT is reported back into
    /// [`PingTransaction::handle_response`]).
    pub fn start(&mut self) {
        if self.state == PingState::Initialised {
            self.state = PingState::WaitingResponse;
        }
    }

    /// A 0x02 PONG arrived from `responder` after `rtt_secs`. Ignored if the
    /// responder doesn't match or the transaction isn't waiting.
    pub fn handle_response(&mut self, responder: Id, rtt_secs: f64) {
        if self.state != PingState::WaitingResponse || responder != self.target {
            return;
        }
        self.rtt_secs = Some(rtt_secs);
        self.state = PingState::Complete;
    }

    pub fn timeout(&mut self) {
        if !self.state.is_terminal() {
            self.state = PingState::TimedOut;
        }
    }
}
