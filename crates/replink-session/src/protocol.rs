//! Raw-REPL control bytes and response markers.
//!
//! These are firmware constants of the MicroPython raw REPL. A firmware
//! variant with different values edits this module and nothing else.

/// Asks the interpreter for raw mode (Ctrl-A).
pub const RAW_ENTER: u8 = 0x01;

/// Returns the interpreter to its line-edited mode (Ctrl-B).
pub const RAW_EXIT: u8 = 0x02;

/// Interrupts whatever the interpreter is running (Ctrl-C).
pub const INTERRUPT: u8 = 0x03;

/// Submits buffered code for execution (Ctrl-D). The device reuses the
/// same byte to delimit the response sections.
pub const SUBMIT: u8 = 0x04;

/// Banner the interpreter prints once raw mode is active.
pub const RAW_BANNER: &[u8] = b"raw REPL; CTRL-B to exit\r\n>";

/// Acknowledgement that submitted code compiled and started running.
pub const OUTPUT_START: &[u8] = b"OK";

/// Delimiter closing the stdout section of a response.
pub const STDOUT_END: &[u8] = &[SUBMIT];

/// Delimiter closing the stderr section, followed by the re-armed raw
/// prompt.
pub const STDERR_END: &[u8] = &[SUBMIT, b'>'];
