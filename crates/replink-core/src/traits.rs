//! The byte-stream transport trait and its error taxonomy.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Transport error.
///
/// `Timeout` is a distinct taxon from `Io`: a silent device is not a broken
/// channel, and the session layer treats the two differently.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no marker within {waited:?} ({} bytes buffered)", .partial.len())]
    Timeout {
        /// Everything read before the deadline, including any partial match.
        partial: Vec<u8>,
        /// The timeout that elapsed.
        waited: Duration,
    },
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Whether this error is a read deadline expiring rather than a channel
    /// failure.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Byte-stream transport to a device.
///
/// Implementations carry no retry policy; retries belong to the session
/// layer. Every read is bounded by an explicit timeout so a disconnected
/// device can never hang the caller.
#[async_trait]
pub trait Transport: Send {
    /// Write all bytes to the channel.
    ///
    /// # Errors
    /// Returns `TransportError::Io` on channel failure, `Closed` after
    /// `close`.
    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read until `marker` is observed in the incoming stream, returning all
    /// bytes read up to and including it.
    ///
    /// # Errors
    /// Returns `TransportError::Timeout` carrying the bytes read so far when
    /// the deadline elapses before the marker appears; `Io`/`Closed` on
    /// channel failure.
    async fn read_until(
        &mut self,
        marker: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Release the underlying channel. Further operations fail with
    /// `Closed`.
    ///
    /// # Errors
    /// Returns `TransportError::Io` if releasing the channel fails.
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write_all(data).await
    }

    async fn read_until(
        &mut self,
        marker: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).read_until(marker, timeout).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        (**self).close().await
    }
}
