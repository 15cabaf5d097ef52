//! Captured output of one remote execution.

/// Outcome of a completed execution.
///
/// Channel failures and timeouts never produce a status; they surface as
/// errors from the session instead. A status therefore always comes with
/// fully captured output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// The code ran to completion without raising.
    Ok,
    /// The device interpreter raised; stderr carries the traceback. The
    /// session stays usable.
    RemoteError,
}

/// Both output streams of one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    status: ExecStatus,
}

impl ExecutionResult {
    /// Build a result from the two captured streams. Status is
    /// `RemoteError` exactly when stderr is non-empty.
    #[must_use]
    pub fn new(stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        let status = if stderr.is_empty() {
            ExecStatus::Ok
        } else {
            ExecStatus::RemoteError
        };
        Self {
            stdout,
            stderr,
            status,
        }
    }

    /// Captured stdout bytes.
    #[must_use]
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Captured stderr bytes (the device traceback, if any).
    #[must_use]
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Execution status.
    #[must_use]
    pub const fn status(&self) -> ExecStatus {
        self.status
    }

    /// Whether the device raised.
    #[must_use]
    pub const fn is_remote_error(&self) -> bool {
        matches!(self.status, ExecStatus::RemoteError)
    }

    /// Stdout as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_stderr() {
        let ok = ExecutionResult::new(b"out".to_vec(), Vec::new());
        assert_eq!(ok.status(), ExecStatus::Ok);
        assert!(!ok.is_remote_error());

        let err = ExecutionResult::new(Vec::new(), b"Traceback".to_vec());
        assert_eq!(err.status(), ExecStatus::RemoteError);
        assert!(err.is_remote_error());
    }

    #[test]
    fn test_lossy_accessors() {
        let res = ExecutionResult::new(b"hello\n".to_vec(), Vec::new());
        assert_eq!(res.stdout_lossy(), "hello\n");
        assert_eq!(res.stderr_lossy(), "");
    }
}
