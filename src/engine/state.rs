//! The engine's connection lifecycle (spec.md §3 "Lifecycle", §4.7).

/// `Unbound -> Open -> Closed`, matching spec.md §4.7 exactly. `Closed` is
/// terminal: no operation other than observation is valid afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    /// Constructed, but `connection_made` has not yet fired.
    Unbound,
    /// Bound to a transport; `call_remote` and inbound delivery are valid.
    Open,
    /// `connection_lost` has fired. All pending calls have been resolved
    /// with `ConnectionLost` exactly once.
    Closed,
}
