//! The protocol engine itself: owns the transport handle, parser, responder
//! registry, and call tracker for one connection, and exposes `call_remote`
//! plus the lifecycle callbacks a host drives it with (spec.md §2 "Protocol
//! engine", §6 "Engine API").
//!
//! Grounded on the teacher's `ReactorHandle`
//! (`examples/colinmarc-pulseaudio-rs/src/client/reactor.rs`): a cheaply
//! cloneable handle wrapping shared state behind a `std::sync::Mutex`,
//! since no section here suspends while holding the lock (the teacher's own
//! `ReactorState` is guarded the same way, for the same reason).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;

use crate::protocol::{
    self, CommandSchema, Packet, ProtocolError, StreamParser, Value, KEY_ANSWER, KEY_ASK,
    KEY_COMMAND, KEY_ERROR, KEY_ERROR_CODE, KEY_ERROR_DESCRIPTION, UNHANDLED_ERROR_CODE,
    UNKNOWN_ERROR_CODE,
};

use super::call_tracker::CallTracker;
use super::error::AmpError;
use super::registry::Responders;
use super::state::ConnectionState;
use super::transport::Transport;

struct Inner {
    state: ConnectionState,
    transport: Option<Arc<dyn Transport>>,
    parser: StreamParser,
    tracker: CallTracker,
}

struct Shared {
    inner: Mutex<Inner>,
    responders: Arc<Responders>,
    tasks: Mutex<JoinSet<()>>,
}

/// A cloneable handle to one connection's protocol engine.
///
/// This is both the object a host drives (`connection_made`,
/// `data_received`, `connection_lost`, `call_remote`) and the handle passed
/// into every responder invocation so a handler may issue its own nested
/// calls before returning (SPEC_FULL.md §11 "Nested/self-referential
/// calls").
#[derive(Clone)]
pub struct EngineHandle(Arc<Shared>);

impl EngineHandle {
    /// Produces an engine bound to no transport yet (spec.md §6 "Factory").
    ///
    /// `responders` is typically built once via [`Responders::builder`] and
    /// shared (behind the `Arc`) across every connection a host accepts,
    /// since the registry is immutable after construction (spec.md §4.4).
    pub fn new(responders: Arc<Responders>) -> Self {
        EngineHandle(Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: ConnectionState::Unbound,
                transport: None,
                parser: StreamParser::new(),
                tracker: CallTracker::new(),
            }),
            responders,
            tasks: Mutex::new(JoinSet::new()),
        }))
    }

    /// `Unbound -> Open`. Binds the transport the engine will write
    /// outbound packets through.
    pub fn connection_made(&self, transport: Arc<dyn Transport>) {
        let mut inner = self.0.inner.lock().unwrap();
        inner.state = ConnectionState::Open;
        inner.transport = Some(transport);
        inner.parser = StreamParser::new();
        log::debug!("connection established");
    }

    /// `Open -> Closed`. Resolves every pending call with `ConnectionLost`,
    /// drops the transport handle, and aborts every in-flight handler task
    /// so none of them keep running against a connection that's gone
    /// (spec.md §9 "Handler-as-task": the engine owns a structured-
    /// concurrency scope so handler tasks can be "tracked and joined at
    /// shutdown"). Idempotent: a second call is a no-op.
    pub fn connection_lost(&self, cause: impl Into<String>) {
        let cause = cause.into();
        let mut inner = self.0.inner.lock().unwrap();
        if inner.state == ConnectionState::Closed {
            return;
        }
        inner.state = ConnectionState::Closed;
        inner.transport = None;
        inner.tracker.fail_all(&cause);
        drop(inner);

        self.0.tasks.lock().unwrap().abort_all();
        log::debug!("connection lost: {cause}");
    }

    /// Feeds newly received bytes to the parser and dispatches every packet
    /// it completes. A malformed frame is a fatal protocol error: it closes
    /// the connection and is returned to the host.
    pub fn data_received(&self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let packets = {
            let mut inner = self.0.inner.lock().unwrap();
            if inner.state != ConnectionState::Open {
                return Ok(());
            }
            inner.parser.feed(bytes)?
        };

        for packet in packets {
            if let Err(err) = self.classify_and_dispatch(packet) {
                log::error!("fatal protocol error, closing connection: {err}");
                self.connection_lost(err.to_string());
                return Err(err);
            }
        }
        Ok(())
    }

    /// Issues an outbound call and suspends until the answer or error
    /// arrives, the connection is lost, or local encoding fails (spec.md
    /// §4.6).
    pub async fn call_remote(
        &self,
        schema: Arc<CommandSchema>,
        args: HashMap<&'static str, Value>,
    ) -> Result<HashMap<&'static str, Value>, AmpError> {
        let tag = {
            let mut inner = self.0.inner.lock().unwrap();
            if inner.state != ConnectionState::Open {
                return Err(AmpError::ConnectionLost("not connected".to_string()));
            }
            inner.tracker.next_tag()
        };

        let packet = schema.encode_call(tag, &args)?;
        let wire = protocol::serialize_packet(&packet)?;

        let rx = {
            let mut inner = self.0.inner.lock().unwrap();
            inner.tracker.register(tag, schema.clone())
        };

        let transport = {
            let inner = self.0.inner.lock().unwrap();
            inner.transport.clone()
        };

        let Some(transport) = transport else {
            self.0.inner.lock().unwrap().tracker.unregister(tag);
            return Err(AmpError::ConnectionLost("not connected".to_string()));
        };

        if let Err(err) = transport.send(wire) {
            self.0.inner.lock().unwrap().tracker.unregister(tag);
            return Err(AmpError::ConnectionLost(err.to_string()));
        }

        log::debug!("sent call '{}' tag={tag}", schema.name);

        // Dropped if this call's own future is cancelled (e.g. the host
        // wraps it in a timeout or a `select!` branch that loses) before
        // `rx` resolves, so a late-arriving answer doesn't target a slot
        // nobody is listening to anymore (spec.md §5 "Cancellation").
        // Harmless if the tag already resolved and was removed normally.
        let _unregister_on_cancel = UnregisterGuard {
            shared: &self.0,
            tag,
        };

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(AmpError::ConnectionLost(
                "engine dropped before call resolved".to_string(),
            )),
        }
    }

    fn classify_and_dispatch(&self, packet: Packet) -> Result<(), ProtocolError> {
        if packet.contains_key(KEY_COMMAND) {
            self.dispatch_command(packet)
        } else if packet.contains_key(KEY_ANSWER) {
            let tag = decode_tag(packet.get(KEY_ANSWER).unwrap())?;
            let resolved = self.0.inner.lock().unwrap().tracker.resolve_answer(tag, &packet);
            if !resolved {
                log::warn!("answer for unknown or already-cancelled tag {tag}; dropping");
            }
            Ok(())
        } else if packet.contains_key(KEY_ERROR) {
            let tag = decode_tag(packet.get(KEY_ERROR).unwrap())?;
            let code = packet
                .get(KEY_ERROR_CODE)
                .ok_or_else(|| ProtocolError::MissingKey(KEY_ERROR_CODE.to_string()))?;
            let code = std::str::from_utf8(code)
                .map_err(|_| ProtocolError::InvalidValue {
                    key: KEY_ERROR_CODE.to_string(),
                    reason: "not valid UTF-8".to_string(),
                })?
                .to_string();
            let description = packet
                .get(KEY_ERROR_DESCRIPTION)
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default();

            let resolved = self
                .0
                .inner
                .lock()
                .unwrap()
                .tracker
                .resolve_error(tag, &code, description);
            if !resolved {
                log::warn!("error for unknown or already-cancelled tag {tag}; dropping");
            }
            Ok(())
        } else {
            Err(ProtocolError::UnrecognizedEnvelope)
        }
    }

    fn dispatch_command(&self, packet: Packet) -> Result<(), ProtocolError> {
        let cmd_name = std::str::from_utf8(packet.get(KEY_COMMAND).unwrap())
            .map_err(|_| ProtocolError::InvalidValue {
                key: KEY_COMMAND.to_string(),
                reason: "not valid UTF-8".to_string(),
            })?
            .to_string();
        let ask = match packet.get(KEY_ASK) {
            Some(bytes) => Some(decode_tag(bytes)?),
            None => None,
        };

        let engine = self.clone();
        let mut tasks = self.0.tasks.lock().unwrap();
        tasks.spawn(async move {
            engine.run_handler(cmd_name, ask, packet).await;
        });

        // Reap whatever has already finished so the set doesn't grow
        // unbounded over a long-lived connection handling many commands;
        // `try_join_next` is non-blocking and a no-op once nothing is done.
        while tasks.try_join_next().is_some() {}
        Ok(())
    }

    /// Runs one command dispatch to completion: lookup, argument decode,
    /// handler invocation, and reply (spec.md §4.5). Spawned as an
    /// independent task per inbound command, so handlers never block the
    /// parser or each other.
    async fn run_handler(&self, cmd_name: String, ask: Option<u32>, packet: Packet) {
        log::debug!("recv command '{cmd_name}' ask={ask:?}");

        let found = self.0.responders.lookup(&cmd_name);
        let (schema, handler) = match found {
            Some((schema, handler)) => (schema.clone(), handler.clone()),
            None => {
                if let Some(tag) = ask {
                    self.send_error(
                        tag,
                        UNHANDLED_ERROR_CODE,
                        format!("Unhandled Command: '{cmd_name}'"),
                    );
                }
                return;
            }
        };

        let args = match schema.decode_args(&packet) {
            Ok(args) => args,
            Err(err) => {
                // One-way calls swallow argument decode failures too
                // (SPEC_FULL.md §11, spec.md Open Question (c)).
                if let Some(tag) = ask {
                    self.send_error(tag, UNKNOWN_ERROR_CODE, err.to_string());
                }
                return;
            }
        };

        match handler(self.clone(), args).await {
            Ok(response) => {
                let Some(tag) = ask else { return };
                match schema.encode_answer(tag, &response) {
                    Ok(answer) => self.send_packet(&answer),
                    Err(_) => {
                        self.send_error(tag, UNKNOWN_ERROR_CODE, "Response too long".to_string())
                    }
                }
            }
            Err(command_err) => {
                let Some(tag) = ask else { return };
                let code = schema.code_for(command_err.kind);
                self.send_error(tag, code, command_err.description);
            }
        }
    }

    fn send_error(&self, tag: u32, code: &str, description: String) {
        let mut packet = Packet::new();
        let _ = packet.insert(KEY_ERROR, tag.to_string().into_bytes());
        let _ = packet.insert(KEY_ERROR_CODE, code.as_bytes().to_vec());
        let _ = packet.insert(KEY_ERROR_DESCRIPTION, description.into_bytes());
        self.send_packet(&packet);
    }

    fn send_packet(&self, packet: &Packet) {
        let transport = self.0.inner.lock().unwrap().transport.clone();
        let Some(transport) = transport else {
            log::warn!("dropping outbound packet: no transport bound");
            return;
        };

        match protocol::serialize_packet(packet) {
            Ok(bytes) => {
                if let Err(err) = transport.send(bytes) {
                    log::warn!("failed to write packet: {err}");
                }
            }
            Err(err) => log::error!("failed to serialize outgoing packet: {err}"),
        }
    }
}

/// Removes a pending-call entry on drop, regardless of why the scope
/// holding it ended. Idempotent: unregistering a tag that already resolved
/// (and was removed by [`CallTracker::resolve_answer`]/`resolve_error`/
/// `fail_all`) is a plain no-op `HashMap` removal.
struct UnregisterGuard<'a> {
    shared: &'a Shared,
    tag: u32,
}

impl Drop for UnregisterGuard<'_> {
    fn drop(&mut self) {
        self.shared.inner.lock().unwrap().tracker.unregister(self.tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::transport::TransportError;
    use crate::protocol::{AmpString, ArgSpec};

    struct NullTransport;
    impl Transport for NullTransport {
        fn send(&self, _bytes: Vec<u8>) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn noop_schema() -> Arc<CommandSchema> {
        Arc::new(CommandSchema::new(
            "Noop",
            vec![ArgSpec::new("text", AmpString)],
            vec![ArgSpec::new("text", AmpString)],
        ))
    }

    /// Cancelling the task awaiting `call_remote` must remove the pending
    /// registration, so a later answer for that tag finds no waiter instead
    /// of resolving a slot nobody observes anymore (spec.md §5
    /// "Cancellation").
    #[test_log::test(tokio::test)]
    async fn cancelling_a_call_removes_its_pending_registration() {
        let engine = EngineHandle::new(Arc::new(Responders::builder().build()));
        engine.connection_made(Arc::new(NullTransport));

        let mut args = HashMap::new();
        args.insert("text", Value::String("hi".to_string()));

        let engine_clone = engine.clone();
        let schema = noop_schema();
        let handle = tokio::spawn(async move { engine_clone.call_remote(schema, args).await });

        // Give the spawned call a chance to register before we cancel it.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        handle.abort();
        let _ = handle.await;

        // Tag 1 was the first (and only) call issued on this engine; its
        // registration must be gone now that the waiter was cancelled.
        assert!(!engine.0.inner.lock().unwrap().tracker.is_pending(1));
    }

    fn slow_schema() -> CommandSchema {
        CommandSchema::new("Slow", Vec::new(), Vec::new())
    }

    /// `connection_lost` must abort in-flight handler tasks, not just stop
    /// accepting new ones — otherwise a handler spawned before disconnect
    /// keeps running against a transport that's already gone (spec.md §9
    /// "Handler-as-task").
    #[test_log::test(tokio::test)]
    async fn connection_lost_aborts_in_flight_handler_tasks() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::time::Duration;

        let completed = Arc::new(AtomicBool::new(false));
        let completed_clone = completed.clone();

        let responders = Arc::new(
            Responders::builder()
                .register(slow_schema(), move |_engine, _args| {
                    let completed = completed_clone.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        completed.store(true, Ordering::SeqCst);
                        Ok(HashMap::new())
                    }
                })
                .build(),
        );

        let engine = EngineHandle::new(responders);
        engine.connection_made(Arc::new(NullTransport));

        // A one-way call (no `_ask`) is enough to spawn the handler task;
        // we only care whether it keeps running, not its reply.
        let mut packet = Packet::new();
        packet.insert("_command", b"Slow".to_vec()).unwrap();
        let wire = protocol::serialize_packet(&packet).unwrap();
        engine.data_received(&wire).unwrap();

        // Let the spawned task start and reach its sleep.
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.connection_lost("shutting down");

        // Long enough that the handler's 200ms sleep would have elapsed and
        // set the flag if `connection_lost` hadn't aborted it first.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!completed.load(Ordering::SeqCst));
    }
}

fn decode_tag(bytes: &[u8]) -> Result<u32, ProtocolError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| ProtocolError::InvalidValue {
            key: "tag".to_string(),
            reason: "not a decimal-ASCII u32".to_string(),
        })
}
