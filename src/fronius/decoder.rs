use crate::prelude::*;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use super::packet::{
    checksum, ValidatedPacket, FRAME_OVERHEAD, LENGTH_OFFSET, MAX_FRAME_SIZE, MAX_INVERTERS,
    PAYLOAD_OFFSET, SYNC, SYNC_LEN,
};

/// Sync failures after the first are only reported every this many bytes.
const SYNC_WARN_INTERVAL: u32 = 100;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiscardReason {
    BadSync { position: usize, byte: u8 },
    BadLength(u8),
    BadChecksum { got: u8, expected: u8 },
}

impl std::fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadSync { position, byte } => write!(
                f,
                "failed to read header byte {} as 0x{:02x} - got 0x{:02x}",
                position, SYNC, byte
            ),
            Self::BadLength(len) => write!(
                f,
                "got length as {} (Max is {}) - discarding packet",
                len, MAX_INVERTERS
            ),
            Self::BadChecksum { got, expected } => {
                write!(f, "checksum fails got {:02x} instead of {:02x}", got, expected)
            }
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FrameEvent {
    Continue,
    Discarded(DiscardReason),
    Complete(ValidatedPacket),
}

#[derive(Clone, Debug, Default)]
pub struct DecoderStats {
    pub frames: u64,
    pub sync_errors: u64,
    pub length_errors: u64,
    pub checksum_errors: u64,
}

/// Assembles frames one byte at a time. Every rejection leaves the decoder
/// waiting for the first sync byte again. The length check bounds a frame
/// at [`MAX_FRAME_SIZE`], so the buffer never grows past it.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    // consecutive non-header bytes; 0 when in sync
    sync_errors: u32,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(MAX_FRAME_SIZE),
            ..Default::default()
        }
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    /// Bytes of the frame currently being assembled.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn is_awaiting_sync(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn ingest(&mut self, byte: u8) -> FrameEvent {
        let position = self.buf.len();

        if position < SYNC_LEN {
            if byte != SYNC {
                let reason = DiscardReason::BadSync { position, byte };
                self.sync_failed(reason);
                // a non-sync byte cannot start a frame either, so it goes too
                self.reset();
                return FrameEvent::Discarded(reason);
            }

            if self.sync_errors > 0 {
                info!(
                    "exiting comms error mode after {} non-header bytes",
                    self.sync_errors
                );
                self.sync_errors = 0;
            }
            self.buf.push(byte);
            return FrameEvent::Continue;
        }

        if position == LENGTH_OFFSET && byte > MAX_INVERTERS {
            let reason = DiscardReason::BadLength(byte);
            warn!("{}", reason);
            self.stats.length_errors += 1;
            self.reset();
            return FrameEvent::Discarded(reason);
        }

        self.buf.push(byte);

        let len = self.buf[LENGTH_OFFSET] as usize;
        if self.buf.len() < len + FRAME_OVERHEAD {
            return FrameEvent::Continue;
        }

        let expected = checksum(&self.buf[LENGTH_OFFSET..len + PAYLOAD_OFFSET]);
        let got = self.buf[len + PAYLOAD_OFFSET];
        if expected != got {
            let reason = DiscardReason::BadChecksum { got, expected };
            warn!("{}", reason);
            self.stats.checksum_errors += 1;
            self.reset();
            return FrameEvent::Discarded(reason);
        }

        self.stats.frames += 1;
        let frame = std::mem::replace(&mut self.buf, Vec::with_capacity(MAX_FRAME_SIZE));
        FrameEvent::Complete(ValidatedPacket::from_validated(frame))
    }

    /// Returns true when the failure was reported.
    fn sync_failed(&mut self, reason: DiscardReason) -> bool {
        self.stats.sync_errors += 1;

        let first = self.sync_errors == 0;
        if first {
            warn!("{}", reason);
        }
        self.sync_errors += 1;
        let periodic = self.sync_errors % SYNC_WARN_INTERVAL == 0;
        if periodic {
            warn!("{} non-header bytes", self.sync_errors);
        }

        first || periodic
    }
}

impl Decoder for FrameDecoder {
    type Item = ValidatedPacket;
    type Error = anyhow::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        while src.has_remaining() {
            if let FrameEvent::Complete(packet) = self.ingest(src.get_u8()) {
                trace!("RX {}", packet);
                return Ok(Some(packet));
            }
        }

        Ok(None)
    }
}
