use crate::prelude::*;

pub mod inverter;
pub mod queue;
pub mod report;
pub mod sequencer;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Datelike;

use crate::fronius::decoder::DecoderStats;
use crate::fronius::device::{self, SystemType};
use crate::fronius::packet::{ProtocolCommand, Request, ValidatedPacket, ERROR_MAGIC, MAX_INVERTERS};
use crate::fronius::sanity;
use crate::fronius::value::{self, MeasurementIndex, VALUE_RANGE_END, VAR_END, VAR_START};

use inverter::{InverterAddress, InverterRecord};
use queue::{CommandQueue, QueuedCommand};
use report::{Report, ReportFormat};
use sequencer::{ErrorActivation, ErrorParams, Sequence, SequencerState};

/// Discovery replies listing this address are line noise.
pub const GLITCH_ADDRESS: u8 = 34;
/// SetErrorSending reply byte for an inverter that accepted.
const ERROR_SENDING_ACTIVATED: u8 = 0xff;

#[derive(Debug, Default)]
pub struct PacketStats {
    pub commands_sent: u64,
    pub packets_received: u64,
    pub reply_timeouts: u64,
    pub reports_sent: u64,
    pub values_rejected: u64,
    pub protocol_errors: u64,
    pub error_states: u64,
    pub unexpected_packets: u64,
    pub discovery_errors: u64,
    pub frames: DecoderStats,
}

impl PacketStats {
    pub fn print_summary(&self) {
        info!("Packet Statistics:");
        info!("  Commands sent: {}", self.commands_sent);
        info!("  Packets received: {}", self.packets_received);
        info!("  Reply timeouts: {}", self.reply_timeouts);
        info!("  Reports sent: {}", self.reports_sent);
        info!("  Values rejected: {}", self.values_rejected);
        info!("  Device errors:");
        info!("    Protocol errors: {}", self.protocol_errors);
        info!("    Forwarded error states: {}", self.error_states);
        info!("    Unexpected packets: {}", self.unexpected_packets);
        info!("    Bad discovery replies: {}", self.discovery_errors);
        info!("  Framing:");
        info!("    Frames accepted: {}", self.frames.frames);
        info!("    Sync errors: {}", self.frames.sync_errors);
        info!("    Length errors: {}", self.frames.length_errors);
        info!("    Checksum errors: {}", self.frames.checksum_errors);
    }
}

/// Fixed parameters of the command cycle.
#[derive(Clone, Debug)]
pub struct Settings {
    pub servers: u8,
    pub wait_time: Duration,
    pub reply_timeout: Duration,
    pub format: ReportFormat,
    pub error_params: ErrorParams,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        let day_of_month = chrono::Local::now().day() as u8;
        let error_params = ErrorParams::initial(config.servers(), day_of_month);
        if config.servers() > 1 {
            debug!("Using date as {} in ActivateError", error_params.p1);
        }

        Self {
            servers: config.servers(),
            wait_time: config.wait_time(),
            reply_timeout: config.reply_timeout(),
            format: config.format(),
            error_params,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            servers: 1,
            wait_time: Duration::from_secs(2),
            reply_timeout: Duration::from_secs(2),
            format: ReportFormat::default(),
            error_params: ErrorParams::default(),
        }
    }
}

/// Everything the command cycle knows about the bus.
#[derive(Debug, Default)]
pub struct EngineState {
    pub sequencer: SequencerState,
    pub inverters: BTreeMap<InverterAddress, InverterRecord>,
    /// Inverters found by the last discovery, in reply order.
    pub active: Vec<InverterAddress>,
    /// Position in `active` of the inverter being polled.
    pub cursor: usize,
    pub system_type: SystemType,
    pub error_params: ErrorParams,
    active_mask: Option<u32>,
    warned_zero_address: bool,
}

/// Drives the command/reply cycle on the serial bus: decides what to send,
/// interprets replies and assembles reports.
pub struct Coordinator {
    settings: Settings,
    state: EngineState,
    queue: CommandQueue,
    pub stats: PacketStats,
}

impl Coordinator {
    pub fn new(settings: Settings) -> Self {
        let state = EngineState {
            error_params: settings.error_params,
            ..Default::default()
        };

        Self {
            settings,
            state,
            queue: CommandQueue::new(),
            stats: PacketStats::default(),
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn record(&self, address: InverterAddress) -> Option<&InverterRecord> {
        self.state.inverters.get(&address)
    }

    /// Queues a command to run once the current sequence completes.
    pub fn submit(&mut self, command: QueuedCommand) -> Result<(), BridgeError> {
        self.queue.push(command)
    }

    /// When `poll` next has something to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let sequencer = &self.state.sequencer;
        sequencer
            .reply_deadline(self.settings.reply_timeout)
            .or(sequencer.next_send_at)
    }

    /// Returns the next command to put on the wire, if one is due.
    pub fn poll(&mut self, now: Instant) -> Option<Request> {
        if let Some(deadline) = self.state.sequencer.reply_deadline(self.settings.reply_timeout) {
            if now < deadline {
                return None;
            }
            self.reply_timed_out(now);
        }

        if !self.state.sequencer.ready_to_send(now) {
            return None;
        }

        if self.state.sequencer.sequence_complete {
            self.begin_sequence();
        }

        let request = self.request_for_current();
        debug!("CMD: {} ({})", self.state.sequencer.current, request);
        self.state.sequencer.sent(now);
        self.stats.commands_sent += 1;

        Some(request)
    }

    /// Nothing heard from the bus for a whole idle period: give up on
    /// whatever was in flight and start afresh.
    pub fn idle_timeout(&mut self) {
        let sequencer = &mut self.state.sequencer;
        sequencer.sent_at = None;
        sequencer.next_send_at = None;
        sequencer.complete();
    }

    fn begin_sequence(&mut self) {
        let queued = self.queue.pop();
        if let Some(QueuedCommand::ActivateError { p1, p2 }) = queued {
            self.state.error_params.p1 = p1;
            if let Some(p2) = p2 {
                self.state.error_params.p2 = p2;
            }
        }

        let have_inverters = !self.state.active.is_empty();
        let current = self
            .state
            .sequencer
            .begin(queued.map(|q| q.sequence()), have_inverters);

        if current == Sequence::GetValues && self.state.cursor >= self.state.active.len() {
            self.state.cursor = 0;
        }
    }

    fn target(&self) -> u8 {
        self.state
            .active
            .get(self.state.cursor)
            .map_or(1, |a| a.get())
    }

    fn request_for_current(&self) -> Request {
        match self.state.sequencer.current {
            Sequence::GetVersion => Request::new(0, 0, ProtocolCommand::GetVersion),
            Sequence::GetActiveInverters => Request::new(0, 0, ProtocolCommand::GetActiveInverters),
            Sequence::GetDeviceType => Request::new(1, self.target(), ProtocolCommand::GetDeviceType),
            Sequence::GetValues => Request::new(1, self.target(), self.state.sequencer.index),
            Sequence::ActivateError if self.state.system_type == SystemType::Rs422 => {
                let mut params = vec![ERROR_MAGIC];
                params.extend(1..=self.settings.servers);
                Request::with_params(0, 0, ProtocolCommand::SetErrorSending, &params)
            }
            Sequence::ActivateError => {
                let ErrorParams { p1, p2 } = self.state.error_params;
                Request::with_params(0, 0, ProtocolCommand::SetErrorForwarding, &[p1, p2])
            }
        }
    }

    fn reply_timed_out(&mut self, now: Instant) {
        let sequencer = &mut self.state.sequencer;
        warn!(
            "Timeout waiting {:?} for reply to {}",
            self.settings.reply_timeout, sequencer.current
        );
        self.stats.reply_timeouts += 1;

        sequencer.replied(now, Duration::ZERO);
        if sequencer.current == Sequence::GetValues {
            // skip this variable; a sweep that loses its last reply goes unreported
            if sequencer.advance_index() {
                sequencer.complete();
                self.advance_cursor();
            }
        } else {
            sequencer.complete();
        }
    }

    fn advance_cursor(&mut self) {
        self.state.cursor += 1;
        if self.state.cursor >= self.state.active.len() {
            self.state.cursor = 0;
        }
        debug!("Current inverter set to {} ({})", self.state.cursor, self.target());
    }

    /// Interprets one validated frame. A finished sweep yields its report.
    pub fn handle_packet(
        &mut self,
        packet: &ValidatedPacket,
        now: Instant,
    ) -> Result<Option<Report>, BridgeError> {
        self.stats.packets_received += 1;
        let command = packet.command();

        if command == u8::from(ProtocolCommand::ErrorState) {
            self.error_state(packet);
            return Ok(None);
        }

        self.state.sequencer.replied(now, self.settings.wait_time);

        if (VAR_START..=VALUE_RANGE_END).contains(&command) {
            return self.value_reply(packet);
        }

        match ProtocolCommand::try_from(command) {
            Ok(ProtocolCommand::GetVersion) => self.version_reply(packet),
            Ok(ProtocolCommand::GetDeviceType) => {
                self.state.sequencer.complete();
                info!(
                    "{} Device Type {:02x} ({})",
                    self.target(),
                    packet.payload_byte(0),
                    device::device_type(packet.payload_byte(0))
                );
            }
            Ok(ProtocolCommand::GetActiveInverters) => {
                self.state.sequencer.complete();
                self.discovery_reply(packet)?;
            }
            Ok(ProtocolCommand::SetErrorForwarding) => self.error_forwarding_reply(packet),
            Ok(ProtocolCommand::SetErrorSending) => self.error_sending_reply(packet),
            Ok(ProtocolCommand::ProtocolError) => self.protocol_error(packet),
            _ => {
                self.stats.unexpected_packets += 1;
                warn!(
                    "Unexpected packet LEN {:02x} DEV {:02x} NUM {:02x} CMD {:02x} {:02x} {:02x}",
                    packet.len(),
                    packet.device(),
                    packet.number(),
                    packet.command(),
                    packet.payload_byte(0),
                    packet.payload_byte(1)
                );
            }
        }

        Ok(None)
    }

    fn value_reply(&mut self, packet: &ValidatedPacket) -> Result<Option<Report>, BridgeError> {
        let index = packet.command();

        let Some(&address) = self.state.active.get(self.state.cursor) else {
            warn!("Value reply for index 0x{:02x} with no active inverter", index);
            self.state.sequencer.complete();
            return Ok(None);
        };

        if index <= VAR_END {
            let decoded = value::decode(
                packet.payload_byte(0),
                packet.payload_byte(1),
                packet.exponent_byte(),
                index,
            );
            let record = self.state.inverters.entry(address).or_default();
            let slot = (index - VAR_START) as usize;
            let ctx = sanity::Context {
                inverter: address.get(),
                dc_voltage: record.values[MeasurementIndex::DcVoltage.slot()],
                dc_current: record.values[MeasurementIndex::DcCurrent.slot()],
            };

            let filtered = sanity::filter(
                index,
                decoded.value,
                record.values[slot],
                record.rejections[slot],
                &ctx,
            );
            if filtered.rejections > record.rejections[slot] {
                self.stats.values_rejected += 1;
            }
            trace!("value[{}][0x{:02x}] = {}", address, index, filtered.value);

            record.values[slot] = filtered.value;
            record.rejections[slot] = filtered.rejections;
        } else {
            warn!("{} Ignoring invalid data index {}", address, index);
        }

        if !self.state.sequencer.advance_index() {
            return Ok(None);
        }

        self.state.sequencer.complete();
        self.advance_cursor();
        self.report(address).map(Some)
    }

    fn report(&mut self, address: InverterAddress) -> Result<Report, BridgeError> {
        if address.get() > self.settings.servers {
            return Err(BridgeError::ReportAddressAboveServers {
                address: address.get(),
                servers: self.settings.servers,
            });
        }

        let record = self.state.inverters.entry(address).or_default();
        let line = self.settings.format.line(&record.values);
        debug!("SEND[{}]: {}", address, line);
        self.stats.reports_sent += 1;

        Ok(Report { address, line })
    }

    fn version_reply(&mut self, packet: &ValidatedPacket) {
        self.state.sequencer.complete();
        let p = packet.payload();

        match packet.len() {
            // addressed to one inverter
            8 => {
                let kind = match p[0] {
                    4 => "IG+/RS485",
                    5 => "IG TL/RS485",
                    _ => "???",
                };
                info!(
                    "{} Type {} Version IFC:{:02x}.{:02x}.{:02x} SW:{:02x}.{:02x}.{:02x}.{:02x}",
                    self.target(),
                    kind,
                    p[1],
                    p[2],
                    p[3],
                    p[4],
                    p[5],
                    p[6],
                    p[7]
                );
            }
            // broadcast, answered by the datalogger or interface card
            4 => {
                self.state.system_type = SystemType::try_from(p[0]).unwrap_or_else(|_| {
                    error!("GetVersion got invalid system type as {}", p[0]);
                    SystemType::Datalogger
                });
                info!(
                    "Type {} Version {:02x}.{:02x}.{:02x}",
                    self.state.system_type, p[1], p[2], p[3]
                );
            }
            len => debug!("GetVersion reply with unexpected length {}", len),
        }
    }

    fn discovery_reply(&mut self, packet: &ValidatedPacket) -> Result<(), BridgeError> {
        let servers = self.settings.servers;
        let mut found = Vec::with_capacity(packet.len() as usize);
        let mut mask = 0u32;

        for &raw in packet.payload() {
            let raw = if raw == 0 {
                if !self.state.warned_zero_address {
                    self.state.warned_zero_address = true;
                    warn!("Correcting 0 to 1");
                }
                1
            } else {
                raw
            };

            if raw == GLITCH_ADDRESS {
                self.stats.discovery_errors += 1;
                return Err(BridgeError::CorruptDiscovery(raw));
            }
            if raw > servers {
                self.stats.discovery_errors += 1;
                return Err(BridgeError::AddressAboveServers {
                    address: raw,
                    servers,
                });
            }

            let address = InverterAddress::try_from(raw)?;
            if raw < 32 {
                mask |= 1 << raw;
            }
            found.push(address);
        }

        let changed = self.state.active_mask != Some(mask);
        if changed {
            if found.is_empty() {
                warn!("No active inverters");
            } else {
                let list: Vec<String> = found.iter().map(|a| a.to_string()).collect();
                info!("{} Active inverters: {}", found.len(), list.join(" "));
            }
        }
        debug!("InverterStatus bitmask = {:04x}", mask);

        for address in &found {
            self.state.inverters.entry(*address).or_default();
        }
        self.state.active = found;
        self.state.active_mask = Some(mask);
        if self.state.cursor >= self.state.active.len() {
            self.state.cursor = 0;
        }

        let sequencer = &mut self.state.sequencer;
        if sequencer.current == Sequence::GetActiveInverters {
            sequencer.next = if self.state.active.is_empty() {
                Sequence::GetActiveInverters
            } else {
                Sequence::GetValues
            };
        }

        Ok(())
    }

    fn error_forwarding_reply(&mut self, packet: &ValidatedPacket) {
        self.state.sequencer.complete();
        let success = packet.payload_byte(0) == ERROR_MAGIC;
        let p1 = self.state.error_params.p1;

        match (self.state.sequencer.error_activation, success) {
            (ErrorActivation::Initializing, true) => info!("ActivateError successful on {}", p1),
            (ErrorActivation::Complete, true) => info!("Activate Error Forwarding succeeded"),
            (_, false) => warn!("Activate Error Forwarding failed"),
        }

        self.state.sequencer.error_activation = ErrorActivation::Complete;
    }

    fn error_sending_reply(&mut self, packet: &ValidatedPacket) {
        self.state.sequencer.complete();
        let len = packet.len();
        let responses = len.saturating_sub(1);

        if len > MAX_INVERTERS + 1 {
            error!(
                "Errorsending: Got {} responses, more than MAXINVERTERS ({})",
                responses, MAX_INVERTERS
            );
            return;
        }
        if len > self.settings.servers + 1 {
            error!(
                "Errorsending: Got {} responses, more than configured ({})",
                responses, self.settings.servers
            );
            return;
        }

        let (succeeded, failed): (Vec<_>, Vec<_>) = packet
            .payload()
            .iter()
            .skip(1)
            .enumerate()
            .map(|(i, b)| (i + 1, *b == ERROR_SENDING_ACTIVATED))
            .partition(|(_, ok)| *ok);

        let mut line = String::from("ErrorSending Activated:");
        if !succeeded.is_empty() {
            line.push_str(" Succeeded:");
            for (n, _) in &succeeded {
                line.push_str(&format!(" {}", n));
            }
        }
        if !failed.is_empty() {
            line.push_str(" Failed:");
            for (n, _) in &failed {
                line.push_str(&format!(" {}", n));
            }
        }
        info!("{}", line);

        self.state.sequencer.error_activation = ErrorActivation::Complete;
    }

    fn protocol_error(&mut self, packet: &ValidatedPacket) {
        self.stats.protocol_errors += 1;
        info!(
            "{} Protocol Error: Command 0x{:02x} {} - ignoring",
            self.target(),
            packet.payload_byte(0),
            device::protocol_error(packet.payload_byte(1))
        );

        let sequencer = &mut self.state.sequencer;
        sequencer.complete();
        if sequencer.current == Sequence::GetValues {
            self.advance_cursor();
        }
    }

    fn error_state(&mut self, packet: &ValidatedPacket) {
        self.stats.error_states += 1;
        let code = packet.magnitude();
        warn!(
            "ErrorCode Dev/Opt:{} Number:{} Code:{} Extra:{} {}",
            packet.device(),
            packet.number(),
            code,
            packet.payload_byte(2),
            device::status_text(code)
        );
    }
}
