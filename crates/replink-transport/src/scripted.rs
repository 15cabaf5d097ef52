//! Scripted in-memory transport for protocol tests.
//!
//! The counterpart of a real channel for tests and protocol simulation:
//! reads pop a prepared script of device responses, writes are recorded in
//! a shared log the test keeps a handle to after the session has taken
//! ownership of the transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use replink_core::{Transport, TransportError};

use crate::find_marker;

/// One scripted read outcome.
#[derive(Debug, Clone)]
enum ScriptStep {
    /// Bytes the device sends next.
    Data(Vec<u8>),
    /// The device stays silent until the caller's deadline.
    Silence,
}

/// Shared record of everything written to a `ScriptedTransport`.
#[derive(Debug, Clone, Default)]
pub struct WriteLog {
    inner: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl WriteLog {
    /// Number of `write_all` calls recorded.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Every write, in order.
    #[must_use]
    pub fn entries(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().clone()
    }

    /// All written bytes, concatenated.
    #[must_use]
    pub fn concat(&self) -> Vec<u8> {
        self.inner.lock().unwrap().concat()
    }

    fn record(&self, data: &[u8]) {
        self.inner.lock().unwrap().push(data.to_vec());
    }
}

/// In-memory transport driven by a prepared script.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: VecDeque<ScriptStep>,
    pending: Vec<u8>,
    log: WriteLog,
    closed: bool,
}

impl ScriptedTransport {
    /// Empty script: every read times out, every write is recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the next read.
    #[must_use]
    pub fn with_data(mut self, data: &[u8]) -> Self {
        self.script.push_back(ScriptStep::Data(data.to_vec()));
        self
    }

    /// Queue a read that never produces the marker.
    #[must_use]
    pub fn with_silence(mut self) -> Self {
        self.script.push_back(ScriptStep::Silence);
        self
    }

    /// Handle to the write log; keep a clone before handing the transport
    /// to a session.
    #[must_use]
    pub fn log(&self) -> WriteLog {
        self.log.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.log.record(data);
        Ok(())
    }

    async fn read_until(
        &mut self,
        marker: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        loop {
            if let Some(end) = find_marker(&self.pending, marker) {
                let rest = self.pending.split_off(end);
                let head = std::mem::replace(&mut self.pending, rest);
                return Ok(head);
            }
            match self.script.pop_front() {
                Some(ScriptStep::Data(data)) => self.pending.extend_from_slice(&data),
                Some(ScriptStep::Silence) | None => {
                    return Err(TransportError::Timeout {
                        partial: std::mem::take(&mut self.pending),
                        waited: timeout,
                    });
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}
