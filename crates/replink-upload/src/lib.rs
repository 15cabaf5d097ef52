//! Chunked file upload over a raw-REPL session.
//!
//! Provides:
//! - `ChunkEncoder` - Pure codec from file bytes to remote append statements
//! - `Uploader` - Drives the statement sequence through a session
//! - `DeviceFs` - File-area primitives (list/remove/size) over a session

pub mod device_fs;
pub mod encoder;
pub mod uploader;

#[cfg(test)]
pub(crate) mod testutil;

pub use device_fs::DeviceFs;
pub use encoder::{Chunk, ChunkEncoder, DEFAULT_CHUNK_SIZE, UploadRequest};
pub use uploader::{UploadError, Uploader};
