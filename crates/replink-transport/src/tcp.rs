//! TCP transport with the board's telnet-style login.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use replink_core::{Transport, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::find_marker;

/// Transport over a TCP connection to a network-attached board.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    buf: BytesMut,
    peer: String,
}

impl TcpTransport {
    /// Connect to `host:port` within `timeout`.
    ///
    /// # Errors
    /// Returns `TransportError::Connect` on refusal or connect timeout.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let peer = format!("{host}:{port}");
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&peer))
            .await
            .map_err(|_| TransportError::Connect(format!("{peer}: connect timed out")))?
            .map_err(|e| TransportError::Connect(format!("{peer}: {e}")))?;
        let _ = stream.set_nodelay(true);
        tracing::debug!(%peer, "connected");
        Ok(Self {
            stream: Some(stream),
            buf: BytesMut::new(),
            peer,
        })
    }

    /// Exchange the plain-text login that guards the board's network REPL.
    ///
    /// This is control-plane setup, not session protocol: it happens once,
    /// before the raw-mode handshake ever starts.
    ///
    /// # Errors
    /// Returns `TransportError::Timeout` when a prompt does not appear, or
    /// an I/O error on channel failure.
    pub async fn login(
        &mut self,
        user: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        self.read_until(b"Login as:", timeout).await?;
        self.write_all(format!("{user}\r\n").as_bytes()).await?;
        self.read_until(b"Password:", timeout).await?;
        self.write_all(format!("{password}\r\n").as_bytes()).await?;
        self.read_until(b"Login succeeded", timeout).await?;
        tracing::debug!(peer = %self.peer, user, "login accepted");
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
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

            let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout {
                    partial: self.buf.split().to_vec(),
                    waited: timeout,
                });
            }

            match tokio::time::timeout(remaining, stream.read_buf(&mut self.buf)).await {
                Ok(Ok(0)) => {
                    return Err(TransportError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed by device",
                    )));
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(TransportError::Io(e)),
                Err(_) => {
                    return Err(TransportError::Timeout {
                        partial: self.buf.split().to_vec(),
                        waited: timeout,
                    });
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(peer = %self.peer, "closing connection");
            stream.shutdown().await?;
        }
        Ok(())
    }
}
