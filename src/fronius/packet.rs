use crate::prelude::*;

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const SYNC: u8 = 0x80;
pub const SYNC_LEN: usize = 3;
pub const LENGTH_OFFSET: usize = 3;
pub const PAYLOAD_OFFSET: usize = 7;
/// Bytes in every frame besides the payload: 3 sync, length, device, number,
/// command and the trailing checksum.
pub const FRAME_OVERHEAD: usize = 8;

pub const MAX_INVERTERS: u8 = 12;
/// Largest frame on the bus: an active inverter enumeration listing every
/// inverter.
pub const MAX_FRAME_SIZE: usize = MAX_INVERTERS as usize + FRAME_OVERHEAD;

pub const ERROR_MAGIC: u8 = 0x55;

// {{{ ProtocolCommand
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ProtocolCommand {
    GetVersion = 0x01,
    GetDeviceType = 0x02,
    GetDateTime = 0x03,
    GetActiveInverters = 0x04,
    SetErrorSending = 0x07,
    SetErrorForwarding = 0x0d,
    ProtocolError = 0x0e,
    ErrorState = 0x0f,
}
// }}}

/// Low byte of the sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

// {{{ Request
/// An outbound command. Commands without parameters encode to the fixed
/// 8 byte form, with parameters to `8 + params.len()` bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Request {
    pub device: u8,
    pub number: u8,
    pub command: u8,
    pub params: Vec<u8>,
}

impl Request {
    pub fn new<C: Into<u8>>(device: u8, number: u8, command: C) -> Self {
        Self {
            device,
            number,
            command: command.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params<C: Into<u8>>(device: u8, number: u8, command: C, params: &[u8]) -> Self {
        Self {
            device,
            number,
            command: command.into(),
            params: params.to_vec(),
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut r = Vec::with_capacity(FRAME_OVERHEAD + self.params.len());

        r.extend_from_slice(&[SYNC; SYNC_LEN]);
        r.push(self.params.len() as u8);
        r.push(self.device);
        r.push(self.number);
        r.push(self.command);
        r.extend_from_slice(&self.params);
        r.push(checksum(&r[LENGTH_OFFSET..]));

        r
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dev/opt {} num {} cmd 0x{:02x}",
            self.device, self.number, self.command
        )?;
        for p in &self.params {
            write!(f, " {:02x}", p)?;
        }
        Ok(())
    }
}
// }}}

// {{{ ValidatedPacket
/// A complete frame that passed sync, length and checksum validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidatedPacket {
    raw: Vec<u8>,
}

impl ValidatedPacket {
    /// Validates a complete frame. The accumulator normally does this byte by
    /// byte; this is the one-shot form of the same checks.
    pub fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < FRAME_OVERHEAD {
            bail!("packet of {} bytes is shorter than {}", input.len(), FRAME_OVERHEAD);
        }
        if input[..SYNC_LEN] != [SYNC; SYNC_LEN] {
            bail!("invalid packet prefix {:02x?}", &input[..SYNC_LEN]);
        }

        let len = input[LENGTH_OFFSET] as usize;
        if len > MAX_INVERTERS as usize {
            bail!("length {} exceeds maximum {}", len, MAX_INVERTERS);
        }
        if input.len() != len + FRAME_OVERHEAD {
            bail!(
                "packet length mismatch: got {} bytes, length byte says {}",
                input.len(),
                len + FRAME_OVERHEAD
            );
        }

        let expected = checksum(&input[LENGTH_OFFSET..len + PAYLOAD_OFFSET]);
        let got = input[len + PAYLOAD_OFFSET];
        if expected != got {
            bail!("checksum mismatch: got {:02x}, expected {:02x}", got, expected);
        }

        Ok(Self::from_validated(input.to_vec()))
    }

    pub(crate) fn from_validated(raw: Vec<u8>) -> Self {
        Self { raw }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Declared payload length.
    pub fn len(&self) -> u8 {
        self.raw[LENGTH_OFFSET]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn device(&self) -> u8 {
        self.raw[4]
    }

    pub fn number(&self) -> u8 {
        self.raw[5]
    }

    /// Command byte of a reply; for value replies this is the measurement index.
    pub fn command(&self) -> u8 {
        self.raw[6]
    }

    pub fn payload(&self) -> &[u8] {
        &self.raw[PAYLOAD_OFFSET..PAYLOAD_OFFSET + self.len() as usize]
    }

    /// Payload byte `n`, or 0 when the payload is shorter.
    pub fn payload_byte(&self, n: usize) -> u8 {
        self.payload().get(n).copied().unwrap_or(0)
    }

    /// Unsigned 16-bit magnitude of a value reply.
    pub fn magnitude(&self) -> u16 {
        u16::from_be_bytes([self.payload_byte(0), self.payload_byte(1)])
    }

    pub fn exponent_byte(&self) -> u8 {
        self.payload_byte(2)
    }

    pub fn checksum(&self) -> u8 {
        self.raw[self.raw.len() - 1]
    }
}

impl std::fmt::Display for ValidatedPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex: Vec<String> = self.raw.iter().map(|b| format!("{:02x}", b)).collect();
        write!(f, "{}", hex.join(" "))
    }
}
// }}}
