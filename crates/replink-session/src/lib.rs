//! Raw-REPL session state machine.
//!
//! Drives a board's interpreter out of its interactive, line-edited mode
//! into raw mode, submits code, and parses the two-stream response
//! envelope.

pub mod protocol;
pub mod raw_repl;

pub use raw_repl::{Mode, RawReplSession, SessionConfig, SessionError};
