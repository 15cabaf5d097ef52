//! The raw-REPL session state machine.

use std::time::Duration;

use replink_core::{ExecutionResult, Transport, TransportError};

use crate::protocol;

/// Session error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(TransportError),
    #[error("device did not respond within {0:?}")]
    Timeout(Duration),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { waited, .. } => Self::Timeout(waited),
            other => Self::Transport(other),
        }
    }
}

/// Session protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The interpreter is in its line-edited mode; nothing negotiated yet.
    Interactive,
    /// Raw-mode handshake in flight.
    EnteringRaw,
    /// Raw mode active; `execute` is valid.
    Raw,
    /// An `execute` call is in flight.
    Executing,
    /// Transport released; terminal.
    Closed,
}

/// Session timeouts.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Bound on waiting for the raw-mode banner per handshake attempt.
    pub handshake_timeout: Duration,
    /// Bound on each response-section read during `execute`.
    pub response_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(2),
            response_timeout: Duration::from_secs(10),
        }
    }
}

/// Handshake attempts: the first try plus one bounded retry.
const HANDSHAKE_ATTEMPTS: u32 = 2;

/// One logical connection plus raw-REPL protocol state to a single device.
///
/// Exactly one `execute` can be in flight: the `&mut self` receivers make
/// overlap unrepresentable, and the `Executing` guard rejects (never
/// queues) any path that still observes a call in progress. Callers
/// needing concurrency open one session per transport.
pub struct RawReplSession<T: Transport> {
    transport: Option<T>,
    mode: Mode,
    config: SessionConfig,
}

impl<T: Transport> RawReplSession<T> {
    /// Wrap a connected transport. The interpreter is assumed to be in its
    /// interactive mode.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Wrap a connected transport with explicit timeouts.
    #[must_use]
    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        Self {
            transport: Some(transport),
            mode: Mode::Interactive,
            config,
        }
    }

    /// Current protocol state.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch the interpreter into raw mode.
    ///
    /// Sends an interrupt followed by the raw-mode request and waits for
    /// the banner. A device mid-way through a tight loop can swallow the
    /// first interrupt, so one retry of the whole sequence is allowed
    /// before giving up.
    ///
    /// # Errors
    /// `Protocol` when called outside `Interactive` or when the banner
    /// never appears; `Transport` on channel failure. Failure releases the
    /// transport.
    pub async fn enter_raw_repl(&mut self) -> Result<(), SessionError> {
        match self.mode {
            Mode::Interactive => {}
            Mode::Closed => return Err(SessionError::Protocol("session closed".into())),
            _ => {
                return Err(SessionError::Protocol(
                    "raw mode entry requires an interactive session".into(),
                ));
            }
        }
        self.mode = Mode::EnteringRaw;

        for attempt in 1..=HANDSHAKE_ATTEMPTS {
            if attempt > 1 {
                tracing::debug!("no banner, retrying interrupt");
            }
            self.send(&[b'\r', protocol::INTERRUPT]).await?;
            self.send(&[b'\r', protocol::RAW_ENTER]).await?;

            let handshake_timeout = self.config.handshake_timeout;
            let read = self
                .transport_mut()?
                .read_until(protocol::RAW_BANNER, handshake_timeout)
                .await;
            match read {
                Ok(_) => {
                    tracing::debug!("raw mode entered");
                    self.mode = Mode::Raw;
                    return Ok(());
                }
                Err(TransportError::Timeout { .. }) => {}
                Err(err) => {
                    self.close().await;
                    return Err(err.into());
                }
            }
        }

        self.close().await;
        Err(SessionError::Protocol("could not enter raw repl".into()))
    }

    /// Run `code` on the device and capture both output streams.
    ///
    /// A non-empty stderr yields `ExecStatus::RemoteError` and leaves the
    /// session in `Raw`, usable for further calls. Timeouts and channel
    /// failures release the transport.
    ///
    /// # Errors
    /// `Protocol` outside `Raw`, with no transport write performed;
    /// `Timeout` when a silent device misses a response deadline;
    /// `Transport` on channel failure.
    pub async fn execute(&mut self, code: &str) -> Result<ExecutionResult, SessionError> {
        match self.mode {
            Mode::Raw => {}
            Mode::Executing => {
                return Err(SessionError::Protocol("execute already in flight".into()));
            }
            Mode::Closed => return Err(SessionError::Protocol("session closed".into())),
            Mode::Interactive | Mode::EnteringRaw => {
                return Err(SessionError::Protocol("not in raw mode".into()));
            }
        }
        self.mode = Mode::Executing;
        tracing::trace!(bytes = code.len(), "executing");

        match self.execute_inner(code).await {
            Ok(result) => {
                self.mode = Mode::Raw;
                if result.is_remote_error() {
                    tracing::debug!(stderr = %result.stderr_lossy(), "device raised");
                }
                Ok(result)
            }
            Err(err) => {
                // The channel is mid-envelope in some unknown position;
                // nothing sensible can be sent on it any more.
                self.close().await;
                Err(err)
            }
        }
    }

    async fn execute_inner(&mut self, code: &str) -> Result<ExecutionResult, SessionError> {
        let timeout = self.config.response_timeout;
        let transport = self.transport_mut()?;

        transport.write_all(code.as_bytes()).await?;
        transport.write_all(&[protocol::SUBMIT]).await?;

        match transport.read_until(protocol::OUTPUT_START, timeout).await {
            Ok(_) => {}
            Err(TransportError::Timeout { partial, waited }) => {
                // A silent device is a timeout; chatter without the marker
                // means the code never compiled and the interpreter echoed
                // the complaint instead.
                return Err(if partial.is_empty() {
                    SessionError::Timeout(waited)
                } else {
                    SessionError::Protocol(format!(
                        "expected start-of-output marker, device sent {:?}",
                        String::from_utf8_lossy(&partial)
                    ))
                });
            }
            Err(err) => return Err(err.into()),
        }

        let stdout = section(transport.read_until(protocol::STDOUT_END, timeout).await?, 1);
        let stderr = section(transport.read_until(protocol::STDERR_END, timeout).await?, 2);
        Ok(ExecutionResult::new(stdout, stderr))
    }

    /// Return the interpreter to its interactive mode. A no-op when the
    /// session is already interactive.
    ///
    /// # Errors
    /// `Protocol` after `close`; `Transport` on channel failure.
    pub async fn exit_raw_repl(&mut self) -> Result<(), SessionError> {
        match self.mode {
            Mode::Interactive => Ok(()),
            Mode::Raw => {
                self.send(&[b'\r', protocol::RAW_EXIT]).await?;
                self.mode = Mode::Interactive;
                Ok(())
            }
            Mode::Closed => Err(SessionError::Protocol("session closed".into())),
            Mode::EnteringRaw | Mode::Executing => {
                Err(SessionError::Protocol("operation in flight".into()))
            }
        }
    }

    /// Release the transport. Idempotent; valid from any state. Every
    /// later operation fails with `Protocol("session closed")`.
    pub async fn close(&mut self) {
        self.mode = Mode::Closed;
        if let Some(mut transport) = self.transport.take() {
            if let Err(err) = transport.close().await {
                tracing::warn!(%err, "error releasing transport");
            }
        }
    }

    /// Write with session-teardown on channel failure.
    async fn send(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let write = self.transport_mut()?.write_all(data).await;
        if let Err(err) = write {
            self.close().await;
            return Err(err.into());
        }
        Ok(())
    }

    fn transport_mut(&mut self) -> Result<&mut T, SessionError> {
        self.transport
            .as_mut()
            .ok_or_else(|| SessionError::Protocol("session closed".into()))
    }
}

/// Strip the `marker_len` delimiter bytes off the end of a section read.
fn section(mut bytes: Vec<u8>, marker_len: usize) -> Vec<u8> {
    bytes.truncate(bytes.len().saturating_sub(marker_len));
    bytes
}
