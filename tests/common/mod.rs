#![allow(dead_code)]

use std::time::{Duration, Instant};

use fronius_bridge::coordinator::report::Report;
use fronius_bridge::coordinator::sequencer::ErrorParams;
use fronius_bridge::coordinator::{Coordinator, Settings};
use fronius_bridge::fronius::packet::{ProtocolCommand, Request, ValidatedPacket, ERROR_MAGIC};
use fronius_bridge::fronius::value::VAR_START;
use fronius_bridge::prelude::*;

pub const WAIT: Duration = Duration::from_secs(2);
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A reply frame as the datalogger would put it on the wire.
pub fn reply<C: Into<u8>>(device: u8, number: u8, command: C, payload: &[u8]) -> ValidatedPacket {
    let bytes = Request::with_params(device, number, command, payload).bytes();
    ValidatedPacket::parse(&bytes).expect("test frame should validate")
}

pub fn version_reply(system_type: u8) -> ValidatedPacket {
    reply(0, 0, ProtocolCommand::GetVersion, &[system_type, 3, 2, 1])
}

pub fn discovery_reply(addresses: &[u8]) -> ValidatedPacket {
    reply(0, 0, ProtocolCommand::GetActiveInverters, addresses)
}

pub fn value_reply(address: u8, index: u8, magnitude: u16, exponent: i8) -> ValidatedPacket {
    let [hi, lo] = magnitude.to_be_bytes();
    reply(1, address, index, &[hi, lo, exponent as u8])
}

/// One reading per polled index, 0x10..=0x18: 1234 W, 137 kWh total,
/// 12 kWh day, 4500 kWh year, 5.13 A, 241 V, 49.99 Hz, 6.00 A, 312 V.
pub const SWEEP: [(u16, i8); 9] = [
    (1234, 0),
    (137, 3),
    (12, 3),
    (4500, 3),
    (513, -2),
    (241, 0),
    (4999, -2),
    (600, -2),
    (312, 0),
];

pub fn settings(servers: u8) -> Settings {
    Settings {
        servers,
        wait_time: WAIT,
        reply_timeout: REPLY_TIMEOUT,
        error_params: ErrorParams::initial(servers, 17),
        ..Default::default()
    }
}

/// A coordinator with a hand-driven clock standing in for the serial line.
pub struct Bus {
    pub coordinator: Coordinator,
    pub now: Instant,
}

impl Bus {
    pub fn new(servers: u8) -> Self {
        Self::with_settings(settings(servers))
    }

    pub fn with_settings(settings: Settings) -> Self {
        common_setup();
        Self {
            coordinator: Coordinator::new(settings),
            now: Instant::now(),
        }
    }

    /// Lets the pacing delay pass and takes whatever is due.
    pub fn next_request(&mut self) -> Option<Request> {
        self.now += WAIT;
        self.coordinator.poll(self.now)
    }

    pub fn expect_request(&mut self, expected: Request) {
        assert_eq!(self.next_request(), Some(expected));
    }

    pub fn reply(&mut self, packet: ValidatedPacket) -> Result<Option<Report>, BridgeError> {
        self.coordinator.handle_packet(&packet, self.now)
    }

    /// Runs version, error activation and discovery, leaving the next
    /// sequence to be the value sweep.
    pub fn start(&mut self, addresses: &[u8]) {
        self.expect_request(Request::new(0, 0, ProtocolCommand::GetVersion));
        assert_eq!(self.reply(version_reply(1)), Ok(None));

        let servers = self.coordinator.settings().servers;
        let p1 = ErrorParams::initial(servers, 17).p1;
        self.expect_request(Request::with_params(
            0,
            0,
            ProtocolCommand::SetErrorForwarding,
            &[p1, ERROR_MAGIC],
        ));
        assert_eq!(
            self.reply(reply(0, 0, ProtocolCommand::SetErrorForwarding, &[ERROR_MAGIC])),
            Ok(None)
        );

        self.expect_request(Request::new(0, 0, ProtocolCommand::GetActiveInverters));
        assert_eq!(self.reply(discovery_reply(addresses)), Ok(None));
    }

    /// Answers a whole sweep of `address` with [`SWEEP`].
    pub fn sweep(&mut self, address: u8) -> Result<Option<Report>, BridgeError> {
        self.sweep_with(address, &SWEEP)
    }

    pub fn sweep_with(
        &mut self,
        address: u8,
        readings: &[(u16, i8); 9],
    ) -> Result<Option<Report>, BridgeError> {
        let mut last = Ok(None);
        for (i, (magnitude, exponent)) in readings.iter().enumerate() {
            let index = VAR_START + i as u8;
            self.expect_request(Request::new(1, address, index));
            last = self.reply(value_reply(address, index, *magnitude, *exponent));
            if i + 1 < readings.len() {
                assert_eq!(last, Ok(None));
            }
        }
        last
    }

    pub fn discover(&mut self, addresses: &[u8]) -> Result<Option<Report>, BridgeError> {
        self.expect_request(Request::new(0, 0, ProtocolCommand::GetActiveInverters));
        self.reply(discovery_reply(addresses))
    }
}
