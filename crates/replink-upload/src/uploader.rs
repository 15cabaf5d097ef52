//! Drives an encoded statement sequence through a session.

use replink_core::{ExecutionResult, Transport};
use replink_session::{RawReplSession, SessionError};

use crate::device_fs::DeviceFs;
use crate::encoder::{ChunkEncoder, UploadRequest};

/// Upload error.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("device raised: {0}")]
    Remote(String),
    #[error("unreadable device reply: {0}")]
    BadReply(String),
    #[error("length mismatch for {name}: sent {expected} bytes, device has {actual}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Uploads files by executing encoder output statement by statement.
///
/// Statements are issued strictly in emission order, each awaited to
/// completion before the next: the remote file handle is stateful, and an
/// append against a handle whose open failed is a fatal remote error.
pub struct Uploader<T: Transport> {
    session: RawReplSession<T>,
    encoder: ChunkEncoder,
}

impl<T: Transport> Uploader<T> {
    /// Wrap a session that is already in raw mode.
    #[must_use]
    pub fn new(session: RawReplSession<T>) -> Self {
        Self {
            session,
            encoder: ChunkEncoder::new(),
        }
    }

    /// Replace the default encoder.
    #[must_use]
    pub fn with_encoder(mut self, encoder: ChunkEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Access the underlying session.
    pub fn session_mut(&mut self) -> &mut RawReplSession<T> {
        &mut self.session
    }

    /// Give the session back.
    #[must_use]
    pub fn into_session(self) -> RawReplSession<T> {
        self.session
    }

    /// Upload `request` to the device.
    ///
    /// The first statement the device rejects aborts the remainder and is
    /// surfaced as the returned result; the destination is then truncated
    /// but present, and the caller re-runs the whole upload. There is no
    /// partial retry.
    ///
    /// # Errors
    /// Returns `UploadError::Session` when the session itself fails
    /// (timeout, channel failure, protocol violation).
    pub async fn save(&mut self, request: &UploadRequest) -> Result<ExecutionResult, UploadError> {
        self.save_with_progress(request, &mut |_, _| {}).await
    }

    /// Upload with a per-statement progress callback `(done, total)`.
    ///
    /// # Errors
    /// Same as [`Self::save`].
    pub async fn save_with_progress(
        &mut self,
        request: &UploadRequest,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<ExecutionResult, UploadError> {
        let statements = self.encoder.encode(request);
        let total = statements.len();
        tracing::debug!(
            dest = %request.dest,
            bytes = request.data.len(),
            statements = total,
            "uploading"
        );

        let mut stdout = Vec::new();
        for (issued, statement) in statements.iter().enumerate() {
            let result = self.session.execute(statement).await?;
            progress(issued + 1, total);
            if result.is_remote_error() {
                tracing::warn!(dest = %request.dest, statement = issued, "upload aborted");
                return Ok(result);
            }
            stdout.extend_from_slice(result.stdout());
        }

        tracing::debug!(dest = %request.dest, "upload complete");
        Ok(ExecutionResult::new(stdout, Vec::new()))
    }

    /// Check that the uploaded file's byte length on the device equals
    /// `expected`.
    ///
    /// # Errors
    /// `LengthMismatch` when the device reports a different size;
    /// `Remote`/`BadReply` when the probe itself fails.
    pub async fn verify(&mut self, name: &str, expected: usize) -> Result<(), UploadError> {
        let actual = DeviceFs::new(&mut self.session).size(name).await?;
        if actual == expected {
            Ok(())
        } else {
            Err(UploadError::LengthMismatch {
                name: name.to_string(),
                expected,
                actual,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use replink_core::ExecStatus;

    use super::*;
    use crate::encoder::ChunkEncoder;
    use crate::testutil::{FakeDevice, raw_session};

    #[tokio::test]
    async fn test_save_reconstructs_bytes_on_the_device() {
        let device = FakeDevice::new();
        let files = device.files();
        let mut uploader = Uploader::new(raw_session(device).await);

        let data: Vec<u8> = (0..=255u8).cycle().take(700).collect();
        let request = UploadRequest::new(data.clone(), "blob.bin");
        let result = uploader.save(&request).await.unwrap();

        assert_eq!(result.status(), ExecStatus::Ok);
        assert_eq!(files.get("blob.bin").unwrap(), data);
    }

    #[tokio::test]
    async fn test_save_empty_file() {
        let device = FakeDevice::new();
        let files = device.files();
        let mut uploader = Uploader::new(raw_session(device).await);

        let request = UploadRequest::new(Vec::new(), "empty.dat");
        uploader.save(&request).await.unwrap();

        assert_eq!(files.get("empty.dat").unwrap(), Vec::<u8>::new());
    }

    #[tokio::test]
    async fn test_progress_reports_every_statement() {
        let mut uploader = Uploader::new(raw_session(FakeDevice::new()).await)
            .with_encoder(ChunkEncoder::with_chunk_size(64));

        let request = UploadRequest::new(vec![7u8; 130], "code.py");
        let mut seen = Vec::new();
        uploader
            .save_with_progress(&request, &mut |done, total| seen.push((done, total)))
            .await
            .unwrap();

        // Open + three appends + close.
        assert_eq!(seen, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
    }

    #[tokio::test]
    async fn test_first_remote_error_aborts_remaining_statements() {
        let device = FakeDevice::new().fail_after_appends(1);
        let files = device.files();
        let mut uploader = Uploader::new(raw_session(device).await)
            .with_encoder(ChunkEncoder::with_chunk_size(4));

        let request = UploadRequest::new(b"0123456789abcdef".to_vec(), "part.bin");
        let mut calls = 0;
        let result = uploader
            .save_with_progress(&request, &mut |_, _| calls += 1)
            .await
            .unwrap();

        assert_eq!(result.status(), ExecStatus::RemoteError);
        assert!(!result.stderr_lossy().is_empty());
        // Open + first append + the failing second append, nothing after.
        assert_eq!(calls, 3);
        // Truncated but present.
        assert_eq!(files.get("part.bin").unwrap(), b"0123".to_vec());

        // The session survives a remote error: a fresh upload succeeds.
        let request = UploadRequest::new(b"ok".to_vec(), "next.bin");
        let result = uploader.save(&request).await.unwrap();
        assert_eq!(result.status(), ExecStatus::Ok);
        assert_eq!(files.get("next.bin").unwrap(), b"ok".to_vec());
    }

    #[tokio::test]
    async fn test_verify_matches_uploaded_length() {
        let mut uploader = Uploader::new(raw_session(FakeDevice::new()).await);
        let request = UploadRequest::new(vec![1u8; 321], "data.bin");
        uploader.save(&request).await.unwrap();

        uploader.verify("data.bin", 321).await.unwrap();
        let err = uploader.verify("data.bin", 100).await.unwrap_err();
        match err {
            UploadError::LengthMismatch {
                expected, actual, ..
            } => {
                assert_eq!((expected, actual), (100, 321));
            }
            other => panic!("expected length mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_verify_missing_file_is_a_remote_error() {
        let mut uploader = Uploader::new(raw_session(FakeDevice::new()).await);
        let err = uploader.verify("nope.bin", 1).await.unwrap_err();
        assert!(matches!(err, UploadError::Remote(_)));
    }
}
