//! The AMP wire format: packets, typed argument codecs, command schemas, and
//! the incremental parser that turns a byte stream into packets.
//!
//! Mirrors the layout of the teacher's `protocol` module
//! (`examples/colinmarc-pulseaudio-rs/src/protocol/mod.rs`), which splits
//! framing (`mod.rs`), typed (de)serialization (`serde.rs`), and per-command
//! definitions (`command.rs`) into sibling files.

mod codec;
mod command;
mod error;
mod framer;
mod packet;
mod parser;

pub use codec::{AmpBytes, AmpString, Boolean, Codec, CodecError, Float, Integer, Value};
pub use command::{ArgSpec, CommandError, CommandSchema, ErrorSpec};
pub use error::{ProtocolError, UNHANDLED_ERROR_CODE, UNKNOWN_ERROR_CODE};
pub use framer::{deserialize_packet, serialize_packet, write_packet};
pub use packet::{
    Packet, KEY_ANSWER, KEY_ASK, KEY_COMMAND, KEY_ERROR, KEY_ERROR_CODE, KEY_ERROR_DESCRIPTION,
    MAX_KEY_LEN, MAX_VALUE_LEN,
};
pub use parser::StreamParser;
