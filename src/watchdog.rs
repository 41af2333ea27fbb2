use crate::prelude::*;

use std::time::{Duration, Instant};

/// Pause after a read that produced nothing.
pub const EMPTY_READ_PAUSE: Duration = Duration::from_secs(1);

/// What an expired idle period calls for, besides restarting the sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IdleEvent {
    /// Fake mode: send the sample report line.
    FakeData,
    /// First silent period since data last arrived.
    NoData,
    /// Still silent and already reported.
    StillSilent,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadAction {
    Process,
    Pause(Duration),
}

/// Watches the serial line for silence. "No data" is edge triggered: it
/// fires once per silence and re-arms when bytes arrive again.
#[derive(Clone, Debug)]
pub struct Watchdog {
    period: Duration,
    fake: bool,
    deadline: Instant,
    online: bool,
}

impl Watchdog {
    pub fn new(period: Duration, fake: bool, now: Instant) -> Self {
        Self {
            period,
            fake,
            deadline: now + period,
            online: true,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// A read returned `bytes` bytes at `now`.
    pub fn read(&mut self, bytes: usize, now: Instant) -> ReadAction {
        if bytes == 0 {
            return ReadAction::Pause(EMPTY_READ_PAUSE);
        }

        if !self.online {
            info!("Serial data flowing again");
            self.online = true;
        }
        self.deadline = now + self.period;

        ReadAction::Process
    }

    /// Starts a new period once the current one has run out.
    pub fn poll(&mut self, now: Instant) -> Option<IdleEvent> {
        if now < self.deadline {
            return None;
        }
        self.deadline = now + self.period;

        let event = if self.fake {
            IdleEvent::FakeData
        } else if self.online {
            self.online = false;
            IdleEvent::NoData
        } else {
            IdleEvent::StillSilent
        };

        Some(event)
    }
}
