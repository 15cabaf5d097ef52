//! Serial transport over a local device path.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use replink_core::{Transport, TransportError};
use serialport::SerialPort;
use tokio::time::Instant;

use crate::find_marker;

/// Poll granularity for blocking port reads. The port's own timeout is set
/// to this so each `spawn_blocking` hop returns quickly and the async
/// deadline stays responsive.
const READ_POLL: Duration = Duration::from_millis(20);

/// Delay between attempts while waiting for a re-enumerating board.
const OPEN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Transport over a serial device.
///
/// Reads and writes go through `spawn_blocking`; the port is moved into the
/// closure and back out so the blocking call never holds a borrow across an
/// await point.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    buf: BytesMut,
    path: String,
}

impl SerialTransport {
    /// Open `path` at `baud`, retrying for up to `wait` while the device
    /// enumerates.
    ///
    /// A board reset over USB disappears and comes back; the wait loop
    /// covers that window the same way the `-w` flag of the original
    /// uploader does.
    ///
    /// # Errors
    /// Returns `TransportError::Connect` when the port cannot be opened
    /// within the wait window.
    pub async fn open(path: &str, baud: u32, wait: Duration) -> Result<Self, TransportError> {
        let deadline = Instant::now() + wait;
        loop {
            match Self::try_open(path.to_string(), baud).await {
                Ok(port) => {
                    tracing::debug!(path, baud, "serial port open");
                    return Ok(Self {
                        port: Some(port),
                        buf: BytesMut::new(),
                        path: path.to_string(),
                    });
                }
                Err(err) if Instant::now() < deadline => {
                    tracing::debug!(path, %err, "port not ready, retrying");
                    tokio::time::sleep(OPEN_RETRY_DELAY).await;
                }
                Err(err) => return Err(TransportError::Connect(format!("{path}: {err}"))),
            }
        }
    }

    async fn try_open(path: String, baud: u32) -> Result<Box<dyn SerialPort>, String> {
        tokio::task::spawn_blocking(move || {
            let port = serialport::new(path, baud)
                .timeout(READ_POLL)
                .open()
                .map_err(|e| e.to_string())?;
            // Drop whatever the board printed before we attached.
            let _ = port.clear(serialport::ClearBuffer::All);
            Ok(port)
        })
        .await
        .map_err(|join| join.to_string())?
    }

    fn take_port(&mut self) -> Result<Box<dyn SerialPort>, TransportError> {
        self.port.take().ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut port = self.take_port()?;
        let data = data.to_vec();
        let (port, result) = tokio::task::spawn_blocking(move || {
            let result = port.write_all(&data).and_then(|()| port.flush());
            (port, result)
        })
        .await
        .map_err(|join| TransportError::Io(std::io::Error::other(join)))?;
        self.port = Some(port);
        result.map_err(TransportError::Io)
    }

    async fn read_until(
        &mut self,
        marker: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(end) = find_marker(&self.buf, marker) {
                return Ok(self.buf.split_to(end).to_vec());
            }
            if Instant::now() >= deadline {
                tracing::trace!(path = %self.path, buffered = self.buf.len(), "read deadline");
                return Err(TransportError::Timeout {
                    partial: self.buf.split().to_vec(),
                    waited: timeout,
                });
            }

            let mut port = self.take_port()?;
            let (port, read) = tokio::task::spawn_blocking(move || {
                let mut chunk = [0u8; 512];
                let read = match port.read(&mut chunk) {
                    Ok(n) => Ok(chunk[..n].to_vec()),
                    // The port timeout is the poll tick, not a failure.
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
                    Err(e) => Err(e),
                };
                (port, read)
            })
            .await
            .map_err(|join| TransportError::Io(std::io::Error::other(join)))?;
            self.port = Some(port);
            self.buf.extend_from_slice(&read.map_err(TransportError::Io)?);
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(port) = self.port.take() {
            tracing::debug!(path = %self.path, "serial port closed");
            drop(port);
        }
        Ok(())
    }
}
