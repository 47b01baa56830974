//! Keepalive tracking for one connection
//!
//! A connection that stays silent for the timeout gets a single probe. If it
//! stays silent for another timeout after that, it is considered dead.

use std::time::{Duration, Instant};

/// What the connection should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessAction {
    /// Keep waiting for traffic, at most this long
    Wait(Duration),
    /// Send one keepalive probe
    Probe,
    /// The probe went unanswered; drop the connection
    Expired,
}

#[derive(Debug, Clone)]
pub struct Liveness {
    timeout: Duration,
    last_activity: Instant,
    probe_pending: bool,
}

impl Liveness {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_activity: now,
            probe_pending: false,
        }
    }

    /// Record inbound traffic; any frame also answers a pending probe
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
        self.probe_pending = false;
    }

    pub fn poll(&mut self, now: Instant) -> LivenessAction {
        let idle = now.saturating_duration_since(self.last_activity);
        if idle < self.timeout {
            return LivenessAction::Wait(self.timeout - idle);
        }
        if self.probe_pending {
            return LivenessAction::Expired;
        }

        // The probe gets a full timeout to be answered
        self.probe_pending = true;
        self.last_activity = now;
        LivenessAction::Probe
    }
}
