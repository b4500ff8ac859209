//! Request/response protocol between the viewer and the privileged server.
//!
//! The server is started with a unix stream socket on its stdin, sends a
//! 32-bit hello value, and then answers requests one at a time. All
//! transferred integers use the host byte order and bit representation.

pub mod client;
pub mod server;
pub mod transport;

pub use client::Client;
pub use server::serve;
pub use transport::Transport;

/// Sent by the server immediately after startup.
pub const SERVER_HELLO: u32 = 0x12345678;

/// Get a list of available audit log files.
///
/// The server replies with a sequence of file name records, each a 32-bit
/// name length followed by the name bytes, terminated by a zero length.
/// No errors are reported; on error the sequence is quietly truncated.
pub const REQ_LIST_FILES: u32 = 1;

/// Read an audit log file.
///
/// The client sends a 32-bit file name length followed by the name bytes.
/// The server replies with a 32-bit errno value (0 for success); on success
/// a 64-bit file size and the file data follow.
pub const REQ_READ_FILE: u32 = 2;
