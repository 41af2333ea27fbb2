use crate::prelude::*;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{Arc, Mutex};

use log::LevelFilter;

/// Maps the `-d` count (or `debug n` command) to a log level.
pub fn level_filter(debug: u8) -> LevelFilter {
    match debug {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

pub fn set_debug(debug: u8) {
    let level = level_filter(debug);
    log::set_max_level(level);
    info!("Log level set to {}", level);
}

/// The per-controller log file, shared with the logger so the control
/// channel can truncate it.
#[derive(Debug, Clone)]
pub struct LogFile {
    file: Arc<Mutex<File>>,
    path: String,
}

impl LogFile {
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| anyhow!("could not open logfile {}: {}", path, err))?;

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn truncate(&self) -> Result<()> {
        let file = self
            .file
            .lock()
            .map_err(|_| anyhow!("log file lock poisoned"))?;
        file.set_len(0)?;

        Ok(())
    }

    fn write_all(&self, buf: &[u8]) -> std::io::Result<()> {
        match self.file.lock() {
            Ok(mut file) => file.write_all(buf),
            Err(_) => Ok(()),
        }
    }
}

/// Copies every log line to stderr and, if open, the log file.
struct Tee {
    file: Option<LogFile>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stderr().write_all(buf)?;
        if let Some(file) = &self.file {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()
    }
}

pub fn init(debug: u8, file: Option<LogFile>) -> Result<()> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Pipe(Box::new(Tee { file })))
        .try_init()?;

    log::set_max_level(level_filter(debug));

    Ok(())
}
