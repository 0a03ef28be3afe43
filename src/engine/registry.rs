//! Command schema & responder registry (spec.md §4.4).
//!
//! A responder binds a handler function to a [`CommandSchema`]; the
//! registry collects these into a name-keyed lookup, built once and treated
//! as immutable for the lifetime of the engine — the teacher's analogue is
//! its compile-time-fixed set of `protocol::Command` variants
//! (`examples/colinmarc-pulseaudio-rs/src/protocol/command.rs`), generalized
//! here to runtime registration since AMP commands are declared by the host,
//! not the library.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::protocol::{CommandError, CommandSchema, Value};

use super::handle::EngineHandle;

type HandlerArgs = HashMap<&'static str, Value>;
type HandlerOutput = Pin<Box<dyn Future<Output = Result<HandlerArgs, CommandError>> + Send>>;

/// A command handler: given a handle back to the engine (so it may issue
/// its own nested calls before replying, SPEC_FULL.md §11) and the decoded
/// arguments, produces a response map or a declared/undeclared error.
pub trait Handler: Fn(EngineHandle, HandlerArgs) -> HandlerOutput + Send + Sync {}
impl<F> Handler for F where F: Fn(EngineHandle, HandlerArgs) -> HandlerOutput + Send + Sync {}

struct Responder {
    schema: Arc<CommandSchema>,
    handler: Arc<dyn Handler>,
}

/// The name-keyed lookup of registered responders for one engine type.
///
/// Conceptually immutable after construction (spec.md §4.4): build it with
/// [`Responders::builder`], then hand the finished registry to the engine.
#[derive(Default)]
pub struct Responders {
    by_name: HashMap<&'static str, Responder>,
}

impl Responders {
    /// Starts building a registry.
    pub fn builder() -> ResponderBuilder {
        ResponderBuilder::default()
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<(&Arc<CommandSchema>, &Arc<dyn Handler>)> {
        self.by_name
            .get(name)
            .map(|r| (&r.schema, &r.handler))
    }
}

/// Builder for [`Responders`], collecting `(schema, handler)` bindings
/// before the registry is frozen (SPEC_FULL.md §10.3: the registry is the
/// engine's one constructor-time configuration knob).
#[derive(Default)]
pub struct ResponderBuilder {
    by_name: HashMap<&'static str, Responder>,
}

impl ResponderBuilder {
    /// Binds a handler to a command schema under `schema.name`.
    ///
    /// # Panics
    /// Panics if a handler is already registered for this schema's name —
    /// registration happens once, at startup, so a collision is a
    /// programming error in the host, not a runtime condition to recover
    /// from.
    pub fn register<H, Fut>(mut self, schema: CommandSchema, handler: H) -> Self
    where
        H: Fn(EngineHandle, HandlerArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerArgs, CommandError>> + Send + 'static,
    {
        let name = schema.name;
        let wrapped: Arc<dyn Handler> = Arc::new(move |engine, args| {
            Box::pin(handler(engine, args)) as HandlerOutput
        });

        let previous = self.by_name.insert(
            name,
            Responder {
                schema: Arc::new(schema),
                handler: wrapped,
            },
        );
        assert!(
            previous.is_none(),
            "a responder is already registered for command '{name}'"
        );
        self
    }

    /// Freezes the registry.
    pub fn build(self) -> Responders {
        Responders {
            by_name: self.by_name,
        }
    }
}
