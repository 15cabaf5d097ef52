//! Statement synthesis for pushing file bytes through the execution
//! channel.
//!
//! The channel only carries source text, so file content travels as
//! `bytes` literals with every byte spelled as a `\xNN` escape. The device
//! decodes the literal back to the identical slice, which makes the whole
//! path lossless for the full 0-255 range.

use std::fmt::Write as _;

/// Default append-slice size. Kept well under the device's line buffer so
/// a rendered statement can never overrun it.
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// One file to place on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// File content.
    pub data: Vec<u8>,
    /// Name to save under on the device.
    pub dest: String,
}

impl UploadRequest {
    /// Build a request.
    #[must_use]
    pub fn new(data: Vec<u8>, dest: impl Into<String>) -> Self {
        Self {
            data,
            dest: dest.into(),
        }
    }
}

/// A bounded slice of the input, rendered as one append statement.
///
/// Chunks are immutable once produced and must reach the device in
/// `index` order: the remote file handle is a single append stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the emission sequence.
    pub index: usize,
    /// The slice, at most the encoder's chunk size.
    pub data: Vec<u8>,
}

impl Chunk {
    /// Render as a remote append statement.
    #[must_use]
    pub fn to_statement(&self) -> String {
        let mut stmt = String::with_capacity(self.data.len() * 4 + 6);
        stmt.push_str("w(b\"");
        for byte in &self.data {
            let _ = write!(stmt, "\\x{byte:02x}");
        }
        stmt.push_str("\")");
        stmt
    }
}

/// Pure codec from file bytes to an ordered remote statement sequence.
///
/// Deterministic: the same input and destination always produce the same
/// statements, so a re-upload is byte-identical to the first attempt.
#[derive(Debug, Clone)]
pub struct ChunkEncoder {
    chunk_size: usize,
}

impl Default for ChunkEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkEncoder {
    /// Encoder with the default chunk bound.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Encoder with an explicit chunk bound (minimum 1).
    #[must_use]
    pub const fn with_chunk_size(size: usize) -> Self {
        Self {
            chunk_size: if size == 0 { 1 } else { size },
        }
    }

    /// The configured chunk bound.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `data` into ordered chunks with no gaps or overlap.
    #[must_use]
    pub fn chunks(&self, data: &[u8]) -> Vec<Chunk> {
        data.chunks(self.chunk_size)
            .enumerate()
            .map(|(index, slice)| Chunk {
                index,
                data: slice.to_vec(),
            })
            .collect()
    }

    /// Produce the full statement sequence for a request: open the
    /// destination for writing, append every chunk in order, close.
    #[must_use]
    pub fn encode(&self, request: &UploadRequest) -> Vec<String> {
        let chunks = self.chunks(&request.data);
        let mut statements = Vec::with_capacity(chunks.len() + 2);
        statements.push(format!(
            "fd = open(\"{}\", \"wb\")\nw = fd.write",
            escape_name(&request.dest)
        ));
        statements.extend(chunks.iter().map(Chunk::to_statement));
        statements.push("fd.close()".to_string());
        statements
    }
}

/// Escape a file name for embedding in a double-quoted remote string.
pub(crate) fn escape_name(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Parse the byte payload back out of an append statement. Test-side
/// inverse of `Chunk::to_statement`.
#[cfg(test)]
pub(crate) fn decode_append(statement: &str) -> Option<Vec<u8>> {
    let body = statement.strip_prefix("w(b\"")?.strip_suffix("\")")?;
    let mut out = Vec::with_capacity(body.len() / 4);
    for escape in body.as_bytes().chunks(4) {
        if escape.len() != 4 || escape[0] != b'\\' || escape[1] != b'x' {
            return None;
        }
        let hex = std::str::from_utf8(&escape[2..4]).ok()?;
        out.push(u8::from_str_radix(hex, 16).ok()?);
    }
    Some(out)
}
