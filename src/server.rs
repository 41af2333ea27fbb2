use crate::prelude::*;

use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use net2::TcpStreamExt;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

const TCP_KEEPALIVE_SECS: u64 = 60;
const PROGNAME: &str = "fronius";

type Connection = Framed<TcpStream, LengthDelimitedCodec>;

/// 2-byte big-endian length prefix, the framing the monitoring server speaks
/// in both directions.
pub fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(2)
        .big_endian()
        .max_frame_length(u16::MAX as usize)
        .new_codec()
}

/// Connections to the monitoring server, one per inverter. Commands are
/// only read from the first.
pub struct ServerLink {
    controller: u32,
    connections: Vec<Connection>,
}

impl ServerLink {
    /// A link that swallows everything, for running without a server.
    pub fn disconnected(controller: u32) -> Self {
        Self {
            controller,
            connections: Vec::new(),
        }
    }

    pub async fn connect(config: &Config) -> Result<Self> {
        let mut connections = Vec::with_capacity(config.servers() as usize);

        for i in 0..config.servers() {
            let mut connection = Self::connect_one(config).await?;

            let logon = format!(
                "{} {} {}",
                config.format().logon_name(),
                config.controller() + i as u32,
                crate::CARGO_PKG_VERSION
            );
            connection.send(Bytes::from(logon)).await?;
            connections.push(connection);
        }

        info!(
            "Connected {} session(s) to {}:{}",
            connections.len(),
            config.host(),
            config.port()
        );

        Ok(Self {
            controller: config.controller(),
            connections,
        })
    }

    async fn connect_one(config: &Config) -> Result<Connection> {
        let hp = (config.host().to_owned(), config.port());
        let mut attempt = 0;

        let stream = loop {
            attempt += 1;
            match TcpStream::connect(hp.clone()).await {
                Ok(stream) => break stream,
                Err(err) if attempt < config.server_retries() => {
                    warn!(
                        "connect to {}:{} failed ({}), retrying in {:?}",
                        hp.0,
                        hp.1,
                        err,
                        config.server_retry_delay()
                    );
                    tokio::time::sleep(config.server_retry_delay()).await;
                }
                Err(err) => bail!(
                    "FATAL failed to connect to {}:{} after {} attempts: {}",
                    hp.0,
                    hp.1,
                    attempt,
                    err
                ),
            }
        };

        let std_stream = stream.into_std()?;
        if let Err(e) = std_stream.set_keepalive(Some(Duration::new(TCP_KEEPALIVE_SECS, 0))) {
            warn!("Failed to set TCP keepalive: {}", e);
        }
        let stream = TcpStream::from_std(std_stream)?;

        Ok(Framed::new(stream, codec()))
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Sends `line` on connection `index`.
    pub async fn send(&mut self, index: usize, line: &str) -> Result<()> {
        if !self.is_connected() {
            debug!("no server, dropping: {}", line);
            return Ok(());
        }

        let Some(connection) = self.connections.get_mut(index) else {
            bail!("no server connection {} for: {}", index, line);
        };
        connection.send(Bytes::from(line.to_owned())).await?;

        Ok(())
    }

    /// Passes a diagnostic to the server as an event line.
    pub async fn send_event(&mut self, level: log::Level, text: &str) -> Result<()> {
        let line = format!(
            "event {} {} {} {}",
            level.as_str().to_uppercase(),
            PROGNAME,
            self.controller,
            text
        );
        self.send(0, &line).await
    }

    /// Next command line from the server. `None` once the server has closed
    /// the connection; never resolves when there is no server.
    pub async fn recv(&mut self) -> Option<Result<String>> {
        let Some(connection) = self.connections.first_mut() else {
            return std::future::pending().await;
        };

        connection.next().await.map(|frame| {
            frame
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .map_err(Into::into)
        })
    }
}
