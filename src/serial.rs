use crate::prelude::*;

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::fronius::packet::Request;

type Opener<P> = Box<dyn FnMut(&str) -> Result<P>>;

/// The half-duplex line to the datalogger. A failed read or write closes the
/// port and reopens it a bounded number of times, `retry_delay` apart.
pub struct SerialLink<P = SerialStream> {
    device: String,
    retries: u32,
    retry_delay: Duration,
    open: Opener<P>,
    port: Option<P>,
}

impl SerialLink<SerialStream> {
    /// Opens the port; failure here means the bridge cannot start.
    pub fn open(config: &Config) -> Result<Self> {
        let baud = config.baud();
        let timeout = config.read_timeout();

        let link = Self::with_opener(
            config.device(),
            config.serial_retries(),
            config.serial_retry_delay(),
            move |device| open_port(device, baud, timeout),
        )
        .map_err(|err| anyhow!("FATAL Failed to open {} at {}: {}", config.device(), baud, err))?;
        info!("Opened {} at {} baud", config.device(), baud);

        Ok(link)
    }
}

fn open_port(device: &str, baud: u32, timeout: Duration) -> Result<SerialStream> {
    let port = tokio_serial::new(device, baud)
        .data_bits(tokio_serial::DataBits::Eight)
        .stop_bits(tokio_serial::StopBits::One)
        .parity(tokio_serial::Parity::None)
        .timeout(timeout)
        .open_native_async()?;

    Ok(port)
}

impl<P: AsyncRead + AsyncWrite + Unpin> SerialLink<P> {
    /// Opens the first port through `open`, which is used again for every
    /// reopen.
    pub fn with_opener<F>(device: &str, retries: u32, retry_delay: Duration, mut open: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<P> + 'static,
    {
        let port = open(device)?;

        Ok(Self {
            device: device.to_string(),
            retries: retries.max(1),
            retry_delay,
            open: Box::new(open),
            port: Some(port),
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn try_open(&mut self) -> bool {
        match (self.open)(&self.device) {
            Ok(port) => {
                self.port = Some(port);
                true
            }
            Err(err) => {
                warn!("Error reopening serial port {}: {}", self.device, err);
                false
            }
        }
    }

    /// Closes the port and reopens it. On failure the port stays closed and
    /// the next read starts over.
    async fn recover(&mut self) -> Result<(), BridgeError> {
        self.port = None;

        for attempt in 1..=self.retries {
            tokio::time::sleep(self.retry_delay).await;
            if self.try_open() {
                info!("Reopened {} after {} attempt(s)", self.device, attempt);
                return Ok(());
            }
        }

        Err(BridgeError::SerialRetriesExhausted {
            device: self.device.clone(),
            retries: self.retries,
        })
    }

    /// Appends whatever bytes are available to `buf`. A read error reopens
    /// the port and is still reported, as is a reopen that ran out of
    /// retries.
    pub async fn read(&mut self, buf: &mut BytesMut) -> Result<usize> {
        if self.port.is_none() {
            self.recover().await?;
        }

        let Some(port) = self.port.as_mut() else {
            return Ok(0);
        };

        match port.read_buf(buf).await {
            Ok(n) => Ok(n),
            Err(err) => {
                warn!("ReadSerial: read from {} failed: {}", self.device, err);
                self.recover().await?;
                bail!("read from {} failed ({}); port reopened", self.device, err)
            }
        }
    }

    pub async fn send(&mut self, request: &Request) -> Result<()> {
        let bytes = request.bytes();
        trace!("TX {:02x?}", bytes);

        for attempt in 1..=self.retries {
            let result = match self.port.as_mut() {
                Some(port) => match port.write_all(&bytes).await {
                    Ok(()) => port.flush().await,
                    Err(err) => Err(err),
                },
                None => Err(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "serial port closed",
                )),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(
                        "SendSerial: Failed to write data (attempt {}/{}): {}",
                        attempt, self.retries, err
                    );
                    self.port = None;
                    tokio::time::sleep(self.retry_delay).await;
                    self.try_open();
                }
            }
        }

        Err(BridgeError::SerialRetriesExhausted {
            device: self.device.clone(),
            retries: self.retries,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::pin::Pin;
    use std::rc::Rc;
    use std::task::{Context, Poll};

    use tokio::io::ReadBuf;

    use crate::fronius::packet::ProtocolCommand;

    /// Plays back scripted reads; writes land in a shared buffer.
    #[derive(Default)]
    struct ScriptedPort {
        reads: VecDeque<io::Result<Vec<u8>>>,
        fail_writes: bool,
        written: Rc<RefCell<Vec<u8>>>,
    }

    impl ScriptedPort {
        fn reading(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                reads: reads.into(),
                ..Default::default()
            }
        }
    }

    impl AsyncRead for ScriptedPort {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    buf.put_slice(&bytes);
                    Poll::Ready(Ok(()))
                }
                Some(Err(err)) => Poll::Ready(Err(err)),
                None => Poll::Ready(Ok(())),
            }
        }
    }

    impl AsyncWrite for ScriptedPort {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.fail_writes {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));
            }
            self.written.borrow_mut().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    type Ports = Rc<RefCell<VecDeque<Result<ScriptedPort>>>>;

    fn link(ports: &Ports, retries: u32) -> Result<SerialLink<ScriptedPort>> {
        let ports = ports.clone();
        SerialLink::with_opener("/dev/ttyTEST", retries, Duration::ZERO, move |_| {
            ports
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("no such device")))
        })
    }

    fn eio() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "Input/output error")
    }

    #[tokio::test]
    async fn read_failure_reopens_the_port() -> Result<()> {
        let ports: Ports = Rc::new(RefCell::new(VecDeque::from(vec![
            Ok(ScriptedPort::reading(vec![Err(eio())])),
            Err(anyhow!("busy")),
            Ok(ScriptedPort::reading(vec![Ok(vec![0x80, 0x80])])),
        ])));
        let mut link = link(&ports, 3)?;
        let mut buf = BytesMut::new();

        assert!(link.read(&mut buf).await.is_err());
        assert!(link.is_open());
        assert!(ports.borrow().is_empty());

        assert_eq!(link.read(&mut buf).await?, 2);
        assert_eq!(&buf[..], &[0x80, 0x80]);

        Ok(())
    }

    #[tokio::test]
    async fn exhausted_reopen_leaves_port_closed_until_next_read() -> Result<()> {
        let ports: Ports = Rc::new(RefCell::new(VecDeque::from(vec![Ok(
            ScriptedPort::reading(vec![Err(eio())]),
        )])));
        let mut link = link(&ports, 3)?;
        let mut buf = BytesMut::new();

        let err = link.read(&mut buf).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<BridgeError>(),
            Some(&BridgeError::SerialRetriesExhausted {
                device: "/dev/ttyTEST".to_string(),
                retries: 3,
            })
        );
        assert!(!link.is_open());

        // the adapter comes back
        ports
            .borrow_mut()
            .push_back(Ok(ScriptedPort::reading(vec![Ok(vec![0x42])])));
        assert_eq!(link.read(&mut buf).await?, 1);
        assert!(link.is_open());

        Ok(())
    }

    #[tokio::test]
    async fn write_failure_retries_on_a_new_port() -> Result<()> {
        let written = Rc::new(RefCell::new(Vec::new()));
        let ports: Ports = Rc::new(RefCell::new(VecDeque::from(vec![
            Ok(ScriptedPort {
                fail_writes: true,
                ..Default::default()
            }),
            Ok(ScriptedPort {
                written: written.clone(),
                ..Default::default()
            }),
        ])));
        let mut link = link(&ports, 3)?;

        let request = Request::new(0, 0, ProtocolCommand::GetVersion);
        link.send(&request).await?;
        assert_eq!(*written.borrow(), request.bytes());

        Ok(())
    }

    #[tokio::test]
    async fn write_gives_up_after_retries() -> Result<()> {
        let ports: Ports = Rc::new(RefCell::new(VecDeque::from(vec![Ok(ScriptedPort {
            fail_writes: true,
            ..Default::default()
        })])));
        let mut link = link(&ports, 2)?;

        let err = link
            .send(&Request::new(0, 0, ProtocolCommand::GetVersion))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BridgeError>(),
            Some(BridgeError::SerialRetriesExhausted { retries: 2, .. })
        ));

        Ok(())
    }
}
