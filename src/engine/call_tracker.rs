//! Assigns outbound tags, stores pending completions, and routes inbound
//! answer/error packets back to the right waiter (spec.md §3 "Pending
//! call", §4.6).
//!
//! Grounded on the teacher's `ReactorState::handlers` map
//! (`examples/colinmarc-pulseaudio-rs/src/client/reactor.rs`), a
//! seq-number-keyed table of one-shot reply callbacks; here the callback is
//! a `tokio::sync::oneshot` sender of an already-classified `AmpError`
//! result rather than a raw buffer, since AMP answers carry their own
//! schema instead of every reply sharing one tagstruct format.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::protocol::{CommandSchema, Packet, Value};

use super::error::AmpError;

type CallResult = Result<HashMap<&'static str, Value>, AmpError>;

struct PendingCall {
    schema: Arc<CommandSchema>,
    completion: oneshot::Sender<CallResult>,
}

/// Per-connection tag counter plus pending-completion table.
///
/// Invariant (spec.md §3): a tag is present in the table iff its completion
/// has not yet been resolved. Tags are scoped to this engine only — two
/// engines in the same process assign overlapping tag sequences
/// independently (SPEC_FULL.md §11).
#[derive(Default)]
pub(crate) struct CallTracker {
    next_tag: u32,
    pending: HashMap<u32, PendingCall>,
}

impl CallTracker {
    pub(crate) fn new() -> Self {
        CallTracker {
            next_tag: 1,
            pending: HashMap::new(),
        }
    }

    /// Assigns the next strictly increasing tag.
    pub(crate) fn next_tag(&mut self) -> u32 {
        let tag = self.next_tag;
        self.next_tag += 1;
        tag
    }

    /// Registers a pending completion for `tag`, to be resolved by a later
    /// inbound answer or error. Must be called before the call packet is
    /// transmitted (spec.md §4.6 step 3).
    pub(crate) fn register(
        &mut self,
        tag: u32,
        schema: Arc<CommandSchema>,
    ) -> oneshot::Receiver<CallResult> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            tag,
            PendingCall {
                schema,
                completion: tx,
            },
        );
        rx
    }

    /// Removes a registration without resolving it — used when a call
    /// fails to transmit after having already registered (spec.md §4.6
    /// step 4), or when a waiting task is cancelled (§5 "Cancellation").
    pub(crate) fn unregister(&mut self, tag: u32) {
        self.pending.remove(&tag);
    }

    /// True if `tag` has a pending completion.
    pub(crate) fn is_pending(&self, tag: u32) -> bool {
        self.pending.contains_key(&tag)
    }

    /// Resolves `tag` with a decoded answer packet. Returns `false` if no
    /// waiter is registered (late answer, or answer to an unknown tag) so
    /// the caller can decide how to treat it.
    pub(crate) fn resolve_answer(&mut self, tag: u32, packet: &Packet) -> bool {
        let Some(pending) = self.pending.remove(&tag) else {
            return false;
        };

        let result = pending.schema.decode_response(packet).map_err(AmpError::from);
        let _ = pending.completion.send(result);
        true
    }

    /// Resolves `tag` with a remote error, classified against the pending
    /// call's own schema (spec.md §4.6). Returns `false` if no waiter is
    /// registered.
    pub(crate) fn resolve_error(&mut self, tag: u32, code: &str, description: String) -> bool {
        let Some(pending) = self.pending.remove(&tag) else {
            return false;
        };

        let err = classify_remote_error(&pending.schema, code, description);
        let _ = pending.completion.send(Err(err));
        true
    }

    /// Resolves every pending completion with `ConnectionLost` and empties
    /// the table (spec.md §3 "Lifecycle", §8 invariant).
    pub(crate) fn fail_all(&mut self, cause: &str) {
        for (_, pending) in self.pending.drain() {
            let _ = pending
                .completion
                .send(Err(AmpError::ConnectionLost(cause.to_string())));
        }
    }
}

/// Classifies a received `(_error_code, _error_description)` pair against a
/// schema's declared errors (spec.md §4.6 "On resolution...").
fn classify_remote_error(schema: &CommandSchema, code: &str, description: String) -> AmpError {
    use crate::protocol::{UNHANDLED_ERROR_CODE, UNKNOWN_ERROR_CODE};

    match code {
        UNKNOWN_ERROR_CODE => AmpError::UnknownRemoteError(description),
        UNHANDLED_ERROR_CODE => AmpError::UnhandledCommandError(description),
        other => match schema.factory_for_code(other) {
            Some(factory) => AmpError::Declared {
                source: factory(description),
            },
            None => AmpError::RemoteAmpError {
                code: other.to_string(),
                description,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ArgSpec, AmpString};

    fn schema() -> Arc<CommandSchema> {
        Arc::new(CommandSchema::new(
            "Echo",
            vec![ArgSpec::new("text", AmpString)],
            vec![ArgSpec::new("text", AmpString)],
        ))
    }

    #[test_log::test(tokio::test)]
    async fn resolves_answer_to_its_waiter() {
        let mut tracker = CallTracker::new();
        let tag = tracker.next_tag();
        let rx = tracker.register(tag, schema());

        let mut packet = Packet::new();
        packet.insert("text", b"hi".to_vec()).unwrap();
        assert!(tracker.resolve_answer(tag, &packet));

        let result = rx.await.unwrap().unwrap();
        assert_eq!(result.get("text"), Some(&Value::String("hi".into())));
    }

    #[test_log::test(tokio::test)]
    async fn unknown_tag_is_reported_as_such() {
        let mut tracker = CallTracker::new();
        assert!(!tracker.resolve_answer(99, &Packet::new()));
    }

    #[test_log::test(tokio::test)]
    async fn fail_all_resolves_every_waiter_with_connection_lost() {
        let mut tracker = CallTracker::new();
        let t1 = tracker.next_tag();
        let t2 = tracker.next_tag();
        let rx1 = tracker.register(t1, schema());
        let rx2 = tracker.register(t2, schema());

        tracker.fail_all("peer closed");
        assert!(!tracker.is_pending(t1));
        assert!(!tracker.is_pending(t2));

        assert!(matches!(
            rx1.await.unwrap(),
            Err(AmpError::ConnectionLost(_))
        ));
        assert!(matches!(
            rx2.await.unwrap(),
            Err(AmpError::ConnectionLost(_))
        ));
    }

    #[test_log::test(tokio::test)]
    async fn tags_are_strictly_increasing() {
        let mut tracker = CallTracker::new();
        let a = tracker.next_tag();
        let b = tracker.next_tag();
        let c = tracker.next_tag();
        assert!(a < b);
        assert!(b < c);
    }
}
