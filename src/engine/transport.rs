//! The byte-transport seam the engine writes through. TCP setup, TLS, and
//! event-loop construction are explicitly out of scope for the core (the
//! host's job); the engine only ever hands fully framed packets to a
//! [`Transport`].
//!
//! Grounded on the teacher's `ReactorHandle::write_command`
//! (`examples/colinmarc-pulseaudio-rs/src/client/reactor.rs`), which also
//! reduces "send these bytes" to enqueueing onto a channel a separate
//! thread drains, rather than writing inline.

use std::fmt;

/// A sink for outbound bytes, supplied by the host when a connection is
/// established.
///
/// The engine never owns a socket: it calls [`send`](Transport::send) with
/// one fully serialized packet at a time and relies on the host to deliver
/// inbound bytes back through
/// [`EngineHandle::data_received`](crate::engine::EngineHandle::data_received).
pub trait Transport: Send + Sync + 'static {
    /// Enqueues `bytes` for writing. Implementations must preserve call
    /// order: bytes queued by an earlier call must reach the peer before
    /// bytes queued by a later one (spec.md §5 "Ordering guarantees").
    fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError>;
}

/// The transport could not accept more bytes — typically because the
/// host's writer task has already shut down.
#[derive(Debug, Clone)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport unavailable: {}", self.0)
    }
}

impl std::error::Error for TransportError {}
