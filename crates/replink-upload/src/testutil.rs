//! A scriptable stand-in for the board: speaks the raw-REPL wire protocol
//! and interprets the statement shapes the encoder emits against an
//! in-memory file area.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use replink_core::{Transport, TransportError};
use replink_session::{RawReplSession, protocol};

use crate::encoder::decode_append;

/// Shared view of the fake board's file area.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeFiles {
    inner: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl FakeFiles {
    pub(crate) fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.clone())
    }

    fn names(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    fn truncate(&self, name: &str) {
        let mut files = self.inner.lock().unwrap();
        if let Some(entry) = files.iter_mut().find(|(n, _)| n == name) {
            entry.1.clear();
        } else {
            files.push((name.to_string(), Vec::new()));
        }
    }

    fn append(&self, name: &str, data: &[u8]) {
        let mut files = self.inner.lock().unwrap();
        if let Some(entry) = files.iter_mut().find(|(n, _)| n == name) {
            entry.1.extend_from_slice(data);
        }
    }

    fn remove(&self, name: &str) -> bool {
        let mut files = self.inner.lock().unwrap();
        let before = files.len();
        files.retain(|(n, _)| n != name);
        files.len() != before
    }
}

/// A fake board on the other end of the transport.
#[derive(Debug, Default)]
pub(crate) struct FakeDevice {
    incoming: Vec<u8>,
    code_buf: Vec<u8>,
    files: FakeFiles,
    open_file: Option<String>,
    appends_done: usize,
    fail_after_appends: Option<usize>,
    closed: bool,
}

impl FakeDevice {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Raise on every append after the first `n` have succeeded.
    pub(crate) fn fail_after_appends(mut self, n: usize) -> Self {
        self.fail_after_appends = Some(n);
        self
    }

    /// Handle to the file area; keep a clone before handing the device to
    /// a session.
    pub(crate) fn files(&self) -> FakeFiles {
        self.files.clone()
    }

    fn respond(&mut self, stdout: &[u8], stderr: &[u8]) {
        self.incoming.extend_from_slice(protocol::OUTPUT_START);
        self.incoming.extend_from_slice(stdout);
        self.incoming.push(protocol::SUBMIT);
        self.incoming.extend_from_slice(stderr);
        self.incoming.push(protocol::SUBMIT);
        self.incoming.push(b'>');
    }

    fn run(&mut self, code: &str) {
        if let Some(name) = quoted_arg(code, "fd = open(\"") {
            self.files.truncate(&name);
            self.open_file = Some(name);
            self.respond(b"", b"");
        } else if code.starts_with("w(b\"") {
            self.run_append(code);
        } else if code == "fd.close()" {
            self.open_file = None;
            self.respond(b"", b"");
        } else if let Some(name) = quoted_arg(code, "print(len(open(\"") {
            match self.files.get(&name) {
                Some(data) => {
                    let reply = format!("{}\r\n", data.len());
                    self.respond(reply.as_bytes(), b"");
                }
                None => self.raise(&format!("OSError: file not found: {name}")),
            }
        } else if code.contains("file.list()") {
            let mut reply = String::new();
            for name in self.files.names() {
                reply.push_str(&name);
                reply.push_str("\r\n");
            }
            self.respond(reply.as_bytes(), b"");
        } else if let Some(name) = quoted_arg(code, "file.remove(\"") {
            if self.files.remove(&name) {
                self.respond(b"", b"");
            } else {
                self.raise(&format!("OSError: file not found: {name}"));
            }
        } else {
            self.raise("SyntaxError: invalid syntax");
        }
    }

    fn run_append(&mut self, code: &str) {
        if self
            .fail_after_appends
            .is_some_and(|limit| self.appends_done >= limit)
        {
            // One-shot fault: the board recovers for later statements.
            self.fail_after_appends = None;
            self.raise("MemoryError: memory allocation failed");
            return;
        }
        let Some(name) = self.open_file.clone() else {
            self.raise("NameError: name 'w' is not defined");
            return;
        };
        let Some(data) = decode_append(code) else {
            self.raise("SyntaxError: invalid syntax");
            return;
        };
        self.files.append(&name, &data);
        self.appends_done += 1;
        self.respond(b"", b"");
    }

    fn raise(&mut self, message: &str) {
        let traceback = format!(
            "Traceback (most recent call last):\r\n  File \"<stdin>\", line 1\r\n{message}\r\n"
        );
        self.respond(b"", traceback.as_bytes());
    }
}

#[async_trait]
impl Transport for FakeDevice {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        match data {
            [b'\r', protocol::INTERRUPT] => {}
            [b'\r', protocol::RAW_ENTER] => {
                self.code_buf.clear();
                self.incoming.extend_from_slice(b"\r\n");
                self.incoming.extend_from_slice(protocol::RAW_BANNER);
            }
            [b'\r', protocol::RAW_EXIT] => {}
            [protocol::SUBMIT] => {
                let code = String::from_utf8_lossy(&self.code_buf).into_owned();
                self.code_buf.clear();
                self.run(&code);
            }
            other => self.code_buf.extend_from_slice(other),
        }
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
        let found = if marker.is_empty() || self.incoming.len() < marker.len() {
            None
        } else {
            self.incoming
                .windows(marker.len())
                .position(|w| w == marker)
                .map(|start| start + marker.len())
        };
        match found {
            Some(end) => {
                let rest = self.incoming.split_off(end);
                Ok(std::mem::replace(&mut self.incoming, rest))
            }
            None => Err(TransportError::Timeout {
                partial: std::mem::take(&mut self.incoming),
                waited: timeout,
            }),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

/// Extract the first double-quoted argument following `prefix`.
fn quoted_arg(code: &str, prefix: &str) -> Option<String> {
    let start = code.find(prefix)? + prefix.len();
    let rest = &code[start..];
    let end = rest.find('"')?;
    Some(rest[..end].replace("\\\"", "\"").replace("\\\\", "\\"))
}

/// A session over `device`, already switched into raw mode.
pub(crate) async fn raw_session(device: FakeDevice) -> RawReplSession<FakeDevice> {
    let mut session = RawReplSession::new(device);
    session.enter_raw_repl().await.expect("raw mode");
    session
}
