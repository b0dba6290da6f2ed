//! Session state: connection/auth lifecycle and deferred-read bookkeeping

/// Minimum spacing between periodic status reports
pub const STATUS_INTERVAL_MS: u64 = 10_000;

/// Time the peripheral needs after a battery request before the cached
/// reading is considered fresh
pub const BATTERY_SETTLE_MS: u64 = 1_000;

/// Connection lifecycle as seen from the controller side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    /// Transport is up, auth sent, no acknowledgement yet
    Connected,
    Authenticated,
}

/// Outcome of starting a battery read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryRequest {
    Started,
    /// A read was already pending; its timer was restarted
    Restarted,
}

#[derive(Debug)]
pub struct Session {
    state: LinkState,
    last_status_ms: u64,
    battery_requested_at: Option<u64>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: LinkState::Disconnected,
            last_status_ms: 0,
            battery_requested_at: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == LinkState::Authenticated
    }

    pub fn battery_pending(&self) -> bool {
        self.battery_requested_at.is_some()
    }

    pub fn connected(&mut self) {
        self.state = LinkState::Connected;
    }

    /// Auth acknowledged. The caller emits a status right away, so this
    /// also restarts the periodic status interval.
    pub fn authenticated(&mut self, now: u64) {
        self.state = LinkState::Authenticated;
        self.last_status_ms = now;
    }

    /// Transport went away. Drops auth and cancels any pending read.
    /// Returns true if a pending battery read was abandoned.
    pub fn disconnected(&mut self) -> bool {
        self.state = LinkState::Disconnected;
        self.battery_requested_at.take().is_some()
    }

    /// Claim the periodic status slot if it is due
    pub fn take_status_due(&mut self, now: u64) -> bool {
        if self.is_authenticated() && now.saturating_sub(self.last_status_ms) >= STATUS_INTERVAL_MS {
            self.last_status_ms = now;
            true
        } else {
            false
        }
    }

    pub fn begin_battery_read(&mut self, now: u64) -> BatteryRequest {
        match self.battery_requested_at.replace(now) {
            Some(_) => BatteryRequest::Restarted,
            None => BatteryRequest::Started,
        }
    }

    /// Complete the pending battery read once it has settled.
    /// Returns true exactly once per request.
    pub fn take_battery_ready(&mut self, now: u64) -> bool {
        match self.battery_requested_at {
            Some(at) if now.saturating_sub(at) >= BATTERY_SETTLE_MS => {
                self.battery_requested_at = None;
                true
            }
            _ => false,
        }
    }
}
