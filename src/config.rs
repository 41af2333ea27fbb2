use crate::prelude::*;

use serde::Deserialize;
use std::time::Duration;

use crate::coordinator::report::ReportFormat;
use crate::fronius::packet::MAX_INVERTERS;

const BAUD_RATES: [u32; 4] = [2400, 4800, 9600, 19200];

/// Runtime settings. Everything can come from the YAML file; command line
/// flags win over the file.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_device")]
    pub device: String,
    #[serde(default)]
    pub controller: u32,
    #[serde(default = "Config::default_baud")]
    pub baud: u32,
    #[serde(default)]
    pub debug: u8,
    #[serde(default)]
    pub fake: bool,
    #[serde(default)]
    pub no_server: bool,
    #[serde(default)]
    pub no_log: bool,
    #[serde(default = "Config::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "Config::default_wait_secs")]
    pub wait_secs: u64,
    #[serde(default = "Config::default_servers")]
    pub servers: u8,
    #[serde(default)]
    pub format: ReportFormat,

    // Server {{{
    #[serde(default = "Config::default_host")]
    pub host: String,
    #[serde(default = "Config::default_port")]
    pub port: u16,
    #[serde(default = "Config::default_retries")]
    pub server_retries: u32,
    #[serde(default = "Config::default_retry_delay_ms")]
    pub server_retry_delay_ms: u64,
    // }}}

    // Serial {{{
    #[serde(default = "Config::default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,
    #[serde(default = "Config::default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "Config::default_serial_retries")]
    pub serial_retries: u32,
    #[serde(default = "Config::default_retry_delay_ms")]
    pub serial_retry_delay_ms: u64,
    // }}}

    /// `{}` is replaced by the controller number.
    #[serde(default = "Config::default_log_file")]
    pub log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: Self::default_device(),
            controller: 0,
            baud: Self::default_baud(),
            debug: 0,
            fake: false,
            no_server: false,
            no_log: false,
            timeout_secs: Self::default_timeout_secs(),
            wait_secs: Self::default_wait_secs(),
            servers: Self::default_servers(),
            format: ReportFormat::default(),
            host: Self::default_host(),
            port: Self::default_port(),
            server_retries: Self::default_retries(),
            server_retry_delay_ms: Self::default_retry_delay_ms(),
            reply_timeout_secs: Self::default_reply_timeout_secs(),
            read_timeout_ms: Self::default_read_timeout_ms(),
            serial_retries: Self::default_serial_retries(),
            serial_retry_delay_ms: Self::default_retry_delay_ms(),
            log_file: Self::default_log_file(),
        }
    }
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("config.rs:error reading {}: {}", file, err))?;

        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// The YAML file named by `-c` (if any) with the command line applied
    /// on top.
    pub fn from_options(options: &Options) -> Result<Self> {
        let mut config = match &options.config_file {
            Some(file) => Self::new(file.clone())?,
            None => Self::default(),
        };

        if let Some(device) = &options.device {
            config.device = device.clone();
        }
        if let Some(controller) = options.controller {
            config.controller = controller;
        }
        if let Some(baud) = options.baud() {
            config.baud = baud;
        }
        if options.debug > 0 {
            config.debug = options.debug;
        }
        config.fake |= options.fake;
        config.no_server |= options.no_server;
        config.no_log |= options.no_log;
        if let Some(timeout) = options.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(wait) = options.wait {
            config.wait_secs = wait;
        }
        if let Some(servers) = options.servers {
            config.servers = servers;
        }
        if options.legacy {
            config.format = ReportFormat::Legacy;
        } else if options.key_value {
            config.format = ReportFormat::KeyValue;
        }

        config.validate()?;

        Ok(config)
    }

    pub fn log_summary(&self) {
        info!("Configuration:");
        info!("  Serial: {} at {} baud{}", self.device, self.baud, if self.fake { " (fake)" } else { "" });
        info!("  Controller: {}", self.controller);
        info!("  Inverters: {}", self.servers);
        info!("  Report format: {:?}", self.format);
        info!("  Idle timeout: {}s, wait time: {}s, reply timeout: {}s",
            self.timeout_secs, self.wait_secs, self.reply_timeout_secs);
        if self.no_server {
            info!("  Server: disabled");
        } else {
            info!("  Server: {}:{}", self.host, self.port);
        }
        info!("  Log file: {}", self.log_file().unwrap_or_else(|| "disabled".to_string()));
    }

    fn validate(&self) -> Result<()> {
        if self.servers == 0 || self.servers > MAX_INVERTERS {
            bail!("servers must be between 1 and {} (got {})", MAX_INVERTERS, self.servers);
        }
        if !BAUD_RATES.contains(&self.baud) {
            bail!("baud must be one of {:?} (got {})", BAUD_RATES, self.baud);
        }
        if self.timeout_secs == 0 {
            bail!("timeout must be at least 1 second");
        }
        if self.reply_timeout_secs == 0 {
            bail!("reply_timeout_secs must be at least 1 second");
        }
        if self.host.is_empty() {
            bail!("host must not be empty");
        }
        if self.device.is_empty() && !self.fake {
            bail!("serial device must not be empty");
        }

        Ok(())
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn controller(&self) -> u32 {
        self.controller
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn servers(&self) -> u8 {
        self.servers
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn server_retries(&self) -> u32 {
        self.server_retries.max(1)
    }

    pub fn server_retry_delay(&self) -> Duration {
        Duration::from_millis(self.server_retry_delay_ms)
    }

    pub fn serial_retries(&self) -> u32 {
        self.serial_retries.max(1)
    }

    pub fn serial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.serial_retry_delay_ms)
    }

    /// Path of the log file, or `None` when logging to file is off.
    pub fn log_file(&self) -> Option<String> {
        if self.no_log {
            return None;
        }
        Some(self.log_file.replace("{}", &self.controller.to_string()))
    }

    fn default_device() -> String {
        "/dev/ttyAM0".to_string()
    }

    fn default_baud() -> u32 {
        19200
    }

    fn default_timeout_secs() -> u64 {
        60
    }

    fn default_wait_secs() -> u64 {
        2
    }

    fn default_servers() -> u8 {
        1
    }

    fn default_host() -> String {
        "localhost".to_string()
    }

    fn default_port() -> u16 {
        10010
    }

    fn default_retries() -> u32 {
        3
    }

    fn default_retry_delay_ms() -> u64 {
        1000
    }

    fn default_reply_timeout_secs() -> u64 {
        2
    }

    fn default_read_timeout_ms() -> u64 {
        100
    }

    fn default_serial_retries() -> u32 {
        10
    }

    fn default_log_file() -> String {
        "/tmp/fronius{}.log".to_string()
    }
}
