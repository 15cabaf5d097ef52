//! File-area primitives issued over a borrowed session.
//!
//! Plain consumers of `execute` with no protocol logic of their own; the
//! same primitives the board's own test scripts use to manage its file
//! area.

use replink_core::{ExecutionResult, Transport};
use replink_session::RawReplSession;

use crate::encoder::escape_name;
use crate::uploader::UploadError;

/// The device's file area, seen through a raw-mode session.
pub struct DeviceFs<'a, T: Transport> {
    session: &'a mut RawReplSession<T>,
}

impl<'a, T: Transport> DeviceFs<'a, T> {
    /// Borrow a session that is already in raw mode.
    #[must_use]
    pub fn new(session: &'a mut RawReplSession<T>) -> Self {
        Self { session }
    }

    /// Names in the device's file area, in the device's own order.
    ///
    /// # Errors
    /// `Remote` when the device raises, `Session` on session failure.
    pub async fn list(&mut self) -> Result<Vec<String>, UploadError> {
        let result = self
            .run("import file\nfor n in file.list(): print(n)")
            .await?;
        Ok(result
            .stdout_lossy()
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    /// Remove `name` from the device's file area.
    ///
    /// # Errors
    /// `Remote` when the file does not exist, `Session` on session
    /// failure.
    pub async fn remove(&mut self, name: &str) -> Result<(), UploadError> {
        self.run(&format!(
            "import file\nfile.remove(\"{}\")",
            escape_name(name)
        ))
        .await?;
        Ok(())
    }

    /// Byte length of `name` on the device, read back through the
    /// interpreter.
    ///
    /// # Errors
    /// `Remote` when the file does not exist, `BadReply` when the reply is
    /// not a length, `Session` on session failure.
    pub async fn size(&mut self, name: &str) -> Result<usize, UploadError> {
        let result = self
            .run(&format!(
                "print(len(open(\"{}\", \"rb\").read()))",
                escape_name(name)
            ))
            .await?;
        let reply = result.stdout_lossy();
        reply
            .trim()
            .parse()
            .map_err(|_| UploadError::BadReply(reply))
    }

    async fn run(&mut self, code: &str) -> Result<ExecutionResult, UploadError> {
        let result = self.session.execute(code).await?;
        if result.is_remote_error() {
            return Err(UploadError::Remote(result.stderr_lossy()));
        }
        Ok(result)
    }
}
