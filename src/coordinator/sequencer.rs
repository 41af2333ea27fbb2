use crate::prelude::*;

use std::time::{Duration, Instant};

use crate::fronius::packet::ERROR_MAGIC;
use crate::fronius::value::{VAR_END, VAR_START};

/// Default first ActivateError parameter; what an Interface Card Easy expects.
pub const DEFAULT_ERROR_PARAM: u8 = 2;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sequence {
    GetVersion,
    GetDeviceType,
    GetActiveInverters,
    GetValues,
    ActivateError,
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GetVersion => "GetVersion",
            Self::GetDeviceType => "GetDevType",
            Self::GetActiveInverters => "GetActiveInverters",
            Self::GetValues => "GetVals",
            Self::ActivateError => "ActivateErrorForwarding",
        };
        write!(f, "{}", s)
    }
}

/// Progress of the one-time error forwarding handshake. Once `Complete`,
/// further activations are interactive and only report their outcome.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ErrorActivation {
    #[default]
    Initializing,
    Complete,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ErrorParams {
    pub p1: u8,
    pub p2: u8,
}

impl ErrorParams {
    /// A datalogger shared by several inverters wants the day of the month;
    /// a single interface card wants 2.
    pub fn initial(servers: u8, day_of_month: u8) -> Self {
        Self {
            p1: if servers > 1 {
                day_of_month
            } else {
                DEFAULT_ERROR_PARAM
            },
            p2: ERROR_MAGIC,
        }
    }
}

impl Default for ErrorParams {
    fn default() -> Self {
        Self::initial(1, 1)
    }
}

/// Where the command/reply cycle stands. At most one command awaits a reply.
#[derive(Clone, Debug)]
pub struct SequencerState {
    pub current: Sequence,
    pub next: Sequence,
    /// Next measurement index to ask for while in `GetValues`.
    pub index: u8,
    pub sent_at: Option<Instant>,
    pub sequence_complete: bool,
    pub next_send_at: Option<Instant>,
    pub error_activation: ErrorActivation,
}

impl Default for SequencerState {
    fn default() -> Self {
        Self::new()
    }
}

impl SequencerState {
    pub fn new() -> Self {
        Self {
            current: Sequence::GetVersion,
            next: Sequence::ActivateError,
            index: VAR_START,
            sent_at: None,
            sequence_complete: false,
            next_send_at: None,
            error_activation: ErrorActivation::Initializing,
        }
    }

    pub fn awaiting_reply(&self) -> bool {
        self.sent_at.is_some()
    }

    pub fn reply_deadline(&self, timeout: Duration) -> Option<Instant> {
        self.sent_at.map(|sent| sent + timeout)
    }

    pub fn sent(&mut self, now: Instant) {
        self.sent_at = Some(now);
    }

    /// A reply arrived; the next command goes out after `wait_time`.
    pub fn replied(&mut self, now: Instant, wait_time: Duration) {
        self.sent_at = None;
        self.next_send_at = Some(now + wait_time);
    }

    pub fn ready_to_send(&self, now: Instant) -> bool {
        !self.awaiting_reply() && self.next_send_at.map_or(true, |at| now >= at)
    }

    pub fn complete(&mut self) {
        self.sequence_complete = true;
    }

    /// Starts the next sequence: a queued command if there is one, otherwise
    /// the idle alternation between discovery and value polling.
    pub fn begin(&mut self, queued: Option<Sequence>, have_inverters: bool) -> Sequence {
        self.sequence_complete = false;

        match queued {
            Some(sequence) => self.current = sequence,
            None => {
                self.current = self.next;
                self.next = Sequence::GetActiveInverters;
            }
        }

        if self.current == Sequence::GetValues {
            if have_inverters {
                self.index = VAR_START;
            } else {
                debug!("no active inverters to poll, discovering instead");
                self.current = Sequence::GetActiveInverters;
            }
        }

        debug!("New Sequence {} then {}", self.current, self.next);
        self.current
    }

    /// Moves to the next measurement; true once the sweep has covered every
    /// polled index.
    pub fn advance_index(&mut self) -> bool {
        self.index = self.index.saturating_add(1);
        self.index > VAR_END
    }
}
