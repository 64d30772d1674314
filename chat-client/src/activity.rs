// chat-client/src/activity.rs
use actix::Recipient;
use std::time::{Duration, Instant};

use crate::actors::idle_watchdog::ActivityPulse;

/// Raw user input that counts as activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    PointerMove,
    KeyPress,
    Scroll,
}

/// Leading-edge throttle: the first event passes, the rest of the window
/// is dropped
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_passed: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_passed: None,
        }
    }

    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&mut self, now: Instant) -> bool {
        let open = match self.last_passed {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if open {
            self.last_passed = Some(now);
        }
        open
    }
}

/// Turns a burst of raw input into throttled activity pulses for the watchdog
pub struct ActivitySource {
    throttle: Throttle,
    sink: Recipient<ActivityPulse>,
    attached: bool,
}

impl ActivitySource {
    pub fn new(interval: Duration, sink: Recipient<ActivityPulse>) -> Self {
        Self {
            throttle: Throttle::new(interval),
            sink,
            attached: true,
        }
    }

    /// Returns whether a pulse was forwarded
    pub fn record(&mut self, input: RawInput) -> bool {
        if !self.attached || !self.throttle.allow() {
            return false;
        }
        tracing::trace!(?input, "User activity");
        self.sink.do_send(ActivityPulse);
        true
    }

    /// Stop forwarding input; the watchdog no longer hears from this source
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}
