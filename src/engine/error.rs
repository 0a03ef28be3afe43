//! Call-facing and connection-facing failures (spec.md §7).

use thiserror::Error;

use crate::protocol::ProtocolError;

/// A failure surfaced to a caller awaiting `call_remote`, or to the host
/// observing connection lifecycle events.
///
/// Distinct from [`ProtocolError`], which covers only wire-format failures;
/// `AmpError` additionally covers remote-raised errors and connection loss,
/// mirroring the split between the teacher's wire-level `ProtocolError` and
/// connection-level `ClientError`
/// (`examples/colinmarc-pulseaudio-rs/src/client.rs`).
#[derive(Error, Debug)]
pub enum AmpError {
    /// The transport reported `connection_lost` while this call was still
    /// pending.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    /// A local wire-format failure: oversize arguments at `call_remote`
    /// time, or a malformed inbound frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The peer has no responder registered for the called command.
    #[error("unhandled command: {0}")]
    UnhandledCommandError(String),
    /// The peer's handler raised an error not declared in the command's
    /// error table (or the caller couldn't otherwise classify it).
    #[error("unknown remote error: {0}")]
    UnknownRemoteError(String),
    /// The peer's handler raised a declared error; `source` is the concrete
    /// error built by the schema's [`crate::protocol::ErrorFactory`] for
    /// that error code.
    #[error("remote error: {source}")]
    Declared {
        /// The concrete, caller-facing error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A remote error carrying a code this schema doesn't otherwise
    /// recognize (declared on the peer's schema, perhaps, but not on the
    /// local copy — schemas are not exchanged on the wire).
    #[error("remote error {code}: {description}")]
    RemoteAmpError {
        /// The wire `_error_code`.
        code: String,
        /// The wire `_error_description`.
        description: String,
    },
}
