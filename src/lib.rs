pub mod command; // Control channel command parsing
pub mod config; // Configuration management
pub mod coordinator; // Command sequencing and reply handling
pub mod error; // Error types
pub mod fronius; // Fronius serial protocol
pub mod logging; // Logger setup and the log file
pub mod options; // Command line options parsing
pub mod prelude; // Common imports and types
pub mod serial; // Serial port handling
pub mod server; // Monitoring server connections
pub mod watchdog; // Serial silence tracking

// Get the package version from Cargo.toml
pub const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;

use std::time::Instant;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::command::ControlCommand;
use crate::coordinator::{Coordinator, Settings};
use crate::fronius::decoder::FrameDecoder;
use crate::fronius::packet::MAX_FRAME_SIZE;
use crate::logging::LogFile;
use crate::serial::SerialLink;
use crate::server::ServerLink;
use crate::watchdog::{IdleEvent, ReadAction, Watchdog};

/// Main application entry point
///
/// Loads the configuration, sets up logging and runs the bridge until the
/// server says `exit` or the process is interrupted.
pub async fn app(options: Options) -> Result<()> {
    let config = Config::from_options(&options).map_err(|err| {
        eprintln!("Failed to load config: {:#}", err);
        err
    })?;

    let mut log_error = None;
    let log_file = match config.log_file() {
        Some(path) => match LogFile::open(&path) {
            Ok(file) => Some(file),
            Err(err) => {
                log_error = Some(err);
                None
            }
        },
        None => None,
    };

    logging::init(config.debug, log_file.clone()).map_err(|err| {
        eprintln!("Failed to initialise logging: {:#}", err);
        err
    })?;

    let result = run(config, log_file, log_error).await;
    if let Err(err) = &result {
        error!("{:#}", err);
    }

    result
}

async fn run(config: Config, log_file: Option<LogFile>, log_error: Option<anyhow::Error>) -> Result<()> {
    warn!(
        "STARTED fronius-bridge {} on {} as {} timeout {} {} {}",
        CARGO_PKG_VERSION,
        config.device(),
        config.controller(),
        config.timeout_secs,
        if config.no_log { "nolog" } else { "" },
        if config.fake { "(fake)" } else { "" }
    );
    config.log_summary();

    let mut server = if config.no_server {
        ServerLink::disconnected(config.controller())
    } else {
        ServerLink::connect(&config).await?
    };

    if let Some(err) = log_error {
        warn!("{}", err);
        if let Err(e) = server.send_event(log::Level::Warn, &err.to_string()).await {
            warn!("Failed to send event to server: {}", e);
        }
    }

    let serial = if config.fake {
        None
    } else {
        Some(SerialLink::open(&config)?)
    };

    let coordinator = Coordinator::new(Settings::from_config(&config));

    let mut bridge = Bridge {
        watchdog: Watchdog::new(config.idle_timeout(), config.fake, Instant::now()),
        config,
        coordinator,
        decoder: FrameDecoder::new(),
        buf: BytesMut::with_capacity(MAX_FRAME_SIZE * 4),
        serial,
        server,
        log_file,
    };

    bridge.run().await
}

async fn read_serial(serial: &mut Option<SerialLink>, buf: &mut BytesMut) -> Result<usize> {
    match serial {
        Some(serial) => serial.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Owns all runtime state; everything happens on one task.
struct Bridge {
    config: Config,
    coordinator: Coordinator,
    decoder: FrameDecoder,
    buf: BytesMut,
    serial: Option<SerialLink>,
    server: ServerLink,
    log_file: Option<LogFile>,
    watchdog: Watchdog,
}

impl Bridge {
    async fn run(&mut self) -> Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            self.send_due_command().await;

            let idle = self.watchdog.deadline();
            let wake = self.coordinator.next_deadline().map_or(idle, |d| d.min(idle));

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Interrupted");
                    break;
                }

                line = self.server.recv() => {
                    match line {
                        Some(Ok(text)) => {
                            if !self.handle_command(&text).await {
                                break;
                            }
                        }
                        Some(Err(err)) => warn!("ProcessSocket Failed to read from socket: {}", err),
                        None => {
                            warn!("Server closed the connection");
                            break;
                        }
                    }
                }

                read = read_serial(&mut self.serial, &mut self.buf) => {
                    match read {
                        Ok(n) => match self.watchdog.read(n, Instant::now()) {
                            ReadAction::Process => self.handle_serial_data().await?,
                            ReadAction::Pause(pause) => {
                                warn!("Serial read returned no data");
                                tokio::time::sleep(pause).await;
                            }
                        },
                        // the link has already backed off while reopening
                        Err(err) => warn!("Serial read failed: {:#}", err),
                    }
                }

                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(wake)) => {
                    if let Some(event) = self.watchdog.poll(Instant::now()) {
                        self.idle_timeout(event).await;
                    }
                }
            }
        }

        info!("Shutdown requested");
        self.coordinator.stats.frames = self.decoder.stats().clone();
        self.coordinator.stats.print_summary();

        Ok(())
    }

    async fn send_due_command(&mut self) {
        let Some(serial) = self.serial.as_mut() else {
            return;
        };

        if let Some(request) = self.coordinator.poll(Instant::now()) {
            if let Err(err) = serial.send(&request).await {
                warn!("{:#}", err);
            }
        }
    }

    async fn handle_serial_data(&mut self) -> Result<()> {
        while let Some(packet) = self.decoder.decode(&mut self.buf)? {
            match self.coordinator.handle_packet(&packet, Instant::now()) {
                Ok(Some(report)) => {
                    if let Err(err) = self.server.send(report.address.connection(), &report.line).await {
                        warn!("Failed to send report for inverter {}: {}", report.address, err);
                    }
                }
                Ok(None) => {}
                Err(err) if err.is_fatal() => error!("FATAL {}", err),
                Err(err) => error!("{}", err),
            }
        }

        Ok(())
    }

    async fn idle_timeout(&mut self, event: IdleEvent) {
        self.coordinator.idle_timeout();

        match event {
            IdleEvent::FakeData => {
                let line = self.config.format().fake_line();
                if let Err(err) = self.server.send(0, line).await {
                    warn!("Failed to send fake data: {}", err);
                }
            }
            IdleEvent::NoData => warn!("No data for last period"),
            IdleEvent::StillSilent => {}
        }
    }

    /// Returns false when the server asked us to stop.
    async fn handle_command(&mut self, text: &str) -> bool {
        debug!("ProcessSocket: '{}'", text);

        match ControlCommand::parse(text) {
            ControlCommand::Exit => return false,
            ControlCommand::Ok => {}
            ControlCommand::Truncate => match &self.log_file {
                Some(file) => match file.truncate() {
                    Ok(()) => info!("truncated log file {}", file.path()),
                    Err(err) => warn!("Failed to truncate log file {}: {}", file.path(), err),
                },
                None => info!("Log file not truncated as it is not open"),
            },
            ControlCommand::Debug(level) => logging::set_debug(level),
            ControlCommand::Help => {
                info!("{}", command::HELP);
                if let Err(err) = self.server.send_event(log::Level::Info, command::HELP).await {
                    warn!("Failed to send help: {}", err);
                }
            }
            ControlCommand::Queue(queued) => {
                if queued.is_bare_activation() {
                    info!("No parameters supplied to ActivateError");
                }
                if let Err(err) = self.coordinator.submit(queued) {
                    warn!("{}", err);
                }
            }
            ControlCommand::Unknown(text) => {
                let message = format!("Unknown message from server: {}", text);
                warn!("{}", message);
                if let Err(err) = self.server.send_event(log::Level::Warn, &message).await {
                    warn!("Failed to send event to server: {}", err);
                }
            }
        }

        true
    }
}
