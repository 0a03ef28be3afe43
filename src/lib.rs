//! A pure Rust implementation of the AMP (Asynchronous Messaging Protocol)
//! wire format and command-dispatch model, suitable for writing symmetric
//! request/response engines where either side of a connection may call the
//! other.

#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications,
    variant_size_differences
)]

pub mod engine;
pub mod protocol;
