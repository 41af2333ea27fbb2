use crate::prelude::*;

use super::sequencer::Sequence;

pub const QUEUE_CAPACITY: usize = 10;

/// A one-shot command requested over the control channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueuedCommand {
    GetVersion,
    GetDeviceType,
    GetActiveInverters,
    /// `p2` is left as it was when not given.
    ActivateError { p1: u8, p2: Option<u8> },
}

impl QueuedCommand {
    /// `ActivateError` given without any parameters.
    pub fn is_bare_activation(&self) -> bool {
        matches!(self, Self::ActivateError { p2: None, .. })
    }

    pub fn sequence(&self) -> Sequence {
        match self {
            Self::GetVersion => Sequence::GetVersion,
            Self::GetDeviceType => Sequence::GetDeviceType,
            Self::GetActiveInverters => Sequence::GetActiveInverters,
            Self::ActivateError { .. } => Sequence::ActivateError,
        }
    }
}

impl std::fmt::Display for QueuedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ActivateError { p1, p2: Some(p2) } => {
                write!(f, "ActivateError {} {:02x}", p1, p2)
            }
            Self::ActivateError { p1, p2: None } => write!(f, "ActivateError {}", p1),
            other => write!(f, "{}", other.sequence()),
        }
    }
}

/// Fixed-size ring of pending commands. Full and empty are told apart by
/// the stored length, so all slots are usable.
#[derive(Debug, Default)]
pub struct CommandQueue {
    slots: [Option<QueuedCommand>; QUEUE_CAPACITY],
    head: usize,
    len: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == QUEUE_CAPACITY
    }

    /// Appends `command`, or leaves the queue untouched when it is full.
    pub fn push(&mut self, command: QueuedCommand) -> Result<(), BridgeError> {
        if self.is_full() {
            return Err(BridgeError::QueueFull(command.to_string()));
        }

        let tail = (self.head + self.len) % QUEUE_CAPACITY;
        self.slots[tail] = Some(command);
        self.len += 1;
        debug!("queued {} ({} pending)", command, self.len);

        Ok(())
    }

    pub fn pop(&mut self) -> Option<QueuedCommand> {
        if self.is_empty() {
            return None;
        }

        let command = self.slots[self.head].take();
        self.head = (self.head + 1) % QUEUE_CAPACITY;
        self.len -= 1;

        command
    }
}
