//! Error types shared across the µDCN workspace.

use thiserror::Error;

/// All possible errors that can occur while encoding, decoding or routing
/// µDCN packets.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed TLV framing (truncated buffer, bad length, unsupported
    /// number width).
    #[error("TLV error: {0}")]
    Tlv(String),

    /// A decoded packet is structurally invalid (wrong top-level type,
    /// missing required field, name that doesn't parse).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The transport refused or failed to deliver a packet.
    #[error("transport error: {0}")]
    Transport(String),

    /// Flow control gave up on a request (retries exhausted, fatal NACK).
    #[error("flow control error: {0}")]
    FlowControl(String),

    /// A file-system operation on the producer side failed; `errno` is the
    /// raw POSIX error number so it can be propagated to the consumer as
    /// the content of a Nack Data packet.
    #[error("file error (errno {errno}): {message}")]
    File { errno: i32, message: String },

    /// CLI argument or control-plane configuration rejected.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
