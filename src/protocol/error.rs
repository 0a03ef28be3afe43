//! Wire-level error types.

use thiserror::Error;

/// Wire error code for a handler-produced error of undeclared kind, an
/// argument decode failure, or an oversize response
/// (`original/exceptions.py::UNKNOWN_ERROR_CODE`).
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN";
/// Wire error code for a command with no registered responder
/// (`original/exceptions.py::UNHANDLED_ERROR_CODE`).
pub const UNHANDLED_ERROR_CODE: &str = "UNHANDLED";

/// An error produced while encoding or decoding the AMP wire format itself —
/// as opposed to an error produced by a command handler.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A key or value exceeded the limits in spec.md §4.2 (`1..=255` for
    /// keys, `0..=65535` for values).
    #[error("{field} exceeds the maximum length ({actual} > {limit})")]
    TooLong {
        /// Which part of the pair was too long.
        field: &'static str,
        /// The offending length.
        actual: usize,
        /// The wire limit.
        limit: usize,
    },
    /// A key was not valid ASCII, or was zero bytes long where a key was
    /// expected.
    #[error("invalid key in packet: {0}")]
    InvalidKey(String),
    /// The same key appeared twice in one packet.
    #[error("duplicate key in packet: {0}")]
    DuplicateKey(String),
    /// A value could not be decoded by its argument codec.
    #[error("failed to decode value for '{key}': {reason}")]
    InvalidValue {
        /// The key whose value failed to decode.
        key: String,
        /// Human-readable decode failure.
        reason: String,
    },
    /// A packet referenced a key that the command schema does not declare.
    #[error("unexpected key in packet: {0}")]
    UnexpectedKey(String),
    /// A required key was missing from an inbound packet.
    #[error("missing key in packet: {0}")]
    MissingKey(String),
    /// A packet carried none of `_command`, `_answer`, or `_error`.
    #[error("packet carries no recognized envelope key")]
    UnrecognizedEnvelope,
    /// An answer or error packet referenced a tag with no pending call.
    #[error("no pending call for tag {0}")]
    UnknownTag(u32),
    /// Underlying I/O failure while reading from or writing to the
    /// transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
