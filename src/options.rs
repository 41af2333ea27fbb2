use clap::Parser;

/// Fronius Bridge - relays Fronius inverter readings to a monitoring server
#[derive(Debug, Default, Parser)]
#[clap(author, version)]
pub struct Options {
    /// 2400 baud
    #[clap(short = '0')]
    pub baud_2400: bool,

    /// 4800 baud
    #[clap(short = '1')]
    pub baud_4800: bool,

    /// 9600 baud
    #[clap(short = '2')]
    pub baud_9600: bool,

    /// 19200 baud (default)
    #[clap(short = '3')]
    pub baud_19200: bool,

    /// More debug output; repeat for trace
    #[clap(short = 'd', action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Send fake data instead of reading the serial port
    #[clap(short = 'f')]
    pub fake: bool,

    /// Don't connect to the monitoring server
    #[clap(short = 's')]
    pub no_server: bool,

    /// Don't write a log file
    #[clap(short = 'l')]
    pub no_log: bool,

    /// Seconds without serial data before warning
    #[clap(short = 't')]
    pub timeout: Option<u64>,

    /// Seconds to pause between commands
    #[clap(short = 'w')]
    pub wait: Option<u64>,

    /// Number of inverters, each with its own server connection
    #[clap(short = 'n')]
    pub servers: Option<u8>,

    /// Legacy "data 9 ..." report lines
    #[clap(short = 'O', conflicts_with = "key_value")]
    pub legacy: bool,

    /// "inverter watts:.." report lines (default)
    #[clap(short = 'N')]
    pub key_value: bool,

    /// Optional YAML config file
    #[clap(short = 'c', long = "config")]
    pub config_file: Option<String>,

    /// Serial device
    pub device: Option<String>,

    /// Controller number, used in the logon line and log file name
    pub controller: Option<u32>,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }

    /// Baud rate picked by the -0..-3 flags, if any.
    pub fn baud(&self) -> Option<u32> {
        [
            (self.baud_2400, 2400),
            (self.baud_4800, 4800),
            (self.baud_9600, 9600),
            (self.baud_19200, 19200),
        ]
        .into_iter()
        .find_map(|(set, baud)| set.then_some(baud))
    }
}
