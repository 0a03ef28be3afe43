//! Typed argument codecs.
//!
//! An AMP packet value is always a plain byte string; the logical type lives
//! in the command schema, not on the wire (unlike the teacher's tagstruct
//! format, where every value is self-tagged with a one-byte type marker —
//! see `examples/colinmarc-pulseaudio-rs/src/protocol/serde.rs`). A [`Codec`]
//! is the AMP equivalent of that crate's `TagStructRead`/`TagStructWrite`
//! pair, just flattened to a single byte-string round trip.

use std::fmt;

use thiserror::Error;

/// A decoded argument value, tagged with its logical type.
///
/// Ported from `original/arguments.py`'s five `Argument` subclasses
/// (`Integer`, `Float`, `Boolean`, `String`, `Bytes`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A signed integer. The original Python implementation allows
    /// arbitrary precision (`int(obj)`); this crate uses `i64`, the widest
    /// integer type available without pulling in a bignum dependency not
    /// used anywhere else in the stack (see DESIGN.md).
    Integer(i64),
    /// A 64-bit float, encoded as its round-trippable decimal text.
    Float(f64),
    /// `True`/`False` on the wire.
    Boolean(bool),
    /// UTF-8 text.
    String(String),
    /// An opaque byte string, passed through unchanged.
    Bytes(Vec<u8>),
}

/// Failure to encode or decode a [`Value`] with a particular [`Codec`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The value passed to `encode` was not of the codec's logical type.
    #[error("expected a {expected} value, got {actual:?}")]
    TypeMismatch {
        /// The codec's logical type name.
        expected: &'static str,
        /// The value that was actually supplied.
        actual: Value,
    },
    /// The bytes passed to `decode` were not valid for the codec's type.
    #[error("invalid {type_name} encoding: {reason}")]
    InvalidEncoding {
        /// The codec's logical type name.
        type_name: &'static str,
        /// What was wrong with the bytes.
        reason: String,
    },
}

/// A pure, stateless value codec: `encode(value) -> bytes` and
/// `decode(bytes) -> value`, as described in spec.md §4.1.
pub trait Codec: fmt::Debug + Send + Sync {
    /// Converts a [`Value`] into its wire representation.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Parses a wire representation back into a [`Value`].
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;

    /// The logical type name, used in error messages.
    fn type_name(&self) -> &'static str;
}

/// Decimal ASCII of a signed integer (`original/arguments.py::Integer`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Integer;

impl Codec for Integer {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Integer(n) => Ok(n.to_string().into_bytes()),
            other => Err(CodecError::TypeMismatch {
                expected: "Integer",
                actual: other.clone(),
            }),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidEncoding {
            type_name: "Integer",
            reason: "not valid ASCII".to_string(),
        })?;

        text.parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| CodecError::InvalidEncoding {
                type_name: "Integer",
                reason: e.to_string(),
            })
    }

    fn type_name(&self) -> &'static str {
        "Integer"
    }
}

/// Textual representation of a double, round-tripping through
/// [`f64`]'s `Display`/`FromStr` (`original/arguments.py::Float`, which
/// uses Python's `repr()`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Float;

impl Codec for Float {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Float(f) => Ok(format!("{f}").into_bytes()),
            other => Err(CodecError::TypeMismatch {
                expected: "Float",
                actual: other.clone(),
            }),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidEncoding {
            type_name: "Float",
            reason: "not valid ASCII".to_string(),
        })?;

        text.parse::<f64>()
            .map(Value::Float)
            .map_err(|e| CodecError::InvalidEncoding {
                type_name: "Float",
                reason: e.to_string(),
            })
    }

    fn type_name(&self) -> &'static str {
        "Float"
    }
}

/// Literal `True`/`False` bytes (`original/arguments.py::Boolean`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Boolean;

impl Codec for Boolean {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Boolean(true) => Ok(b"True".to_vec()),
            Value::Boolean(false) => Ok(b"False".to_vec()),
            other => Err(CodecError::TypeMismatch {
                expected: "Boolean",
                actual: other.clone(),
            }),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        match bytes {
            b"True" => Ok(Value::Boolean(true)),
            b"False" => Ok(Value::Boolean(false)),
            _ => Err(CodecError::InvalidEncoding {
                type_name: "Boolean",
                reason: format!("expected 'True' or 'False', got {:?}", String::from_utf8_lossy(bytes)),
            }),
        }
    }

    fn type_name(&self) -> &'static str {
        "Boolean"
    }
}

/// UTF-8 text (`original/arguments.py::String`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AmpString;

impl Codec for AmpString {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::String(s) => Ok(s.clone().into_bytes()),
            other => Err(CodecError::TypeMismatch {
                expected: "String",
                actual: other.clone(),
            }),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        String::from_utf8(bytes.to_vec())
            .map(Value::String)
            .map_err(|e| CodecError::InvalidEncoding {
                type_name: "String",
                reason: e.to_string(),
            })
    }

    fn type_name(&self) -> &'static str {
        "String"
    }
}

/// Identity codec; passes bytes through unchanged
/// (`original/arguments.py::Bytes`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AmpBytes;

impl Codec for AmpBytes {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(CodecError::TypeMismatch {
                expected: "Bytes",
                actual: other.clone(),
            }),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(Value::Bytes(bytes.to_vec()))
    }

    fn type_name(&self) -> &'static str {
        "Bytes"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roundtrip(codec: &dyn Codec, value: Value, wire: &[u8]) {
        assert_eq!(codec.encode(&value).unwrap(), wire);
        assert_eq!(codec.decode(wire).unwrap(), value);
    }

    #[test_log::test]
    fn integer_roundtrip() {
        roundtrip(&Integer, Value::Integer(1234567890), b"1234567890");
        roundtrip(&Integer, Value::Integer(-42), b"-42");
        roundtrip(&Integer, Value::Integer(0), b"0");
    }

    #[test_log::test]
    fn float_roundtrip() {
        roundtrip(&Float, Value::Float(3.99), b"3.99");
    }

    #[test_log::test]
    fn bytes_roundtrip() {
        roundtrip(&AmpBytes, Value::Bytes(b"data".to_vec()), b"data");
    }

    #[test_log::test]
    fn string_roundtrip() {
        roundtrip(&AmpString, Value::String("my-string".to_string()), b"my-string");
    }

    #[test_log::test]
    fn boolean_roundtrip() {
        roundtrip(&Boolean, Value::Boolean(true), b"True");
        roundtrip(&Boolean, Value::Boolean(false), b"False");
    }

    #[test_log::test]
    fn boolean_rejects_garbage() {
        assert!(Boolean.decode(b"yes").is_err());
        assert!(Boolean.decode(b"true").is_err());
    }

    #[test_log::test]
    fn integer_rejects_non_digits() {
        assert!(Integer.decode(b"12x").is_err());
    }

    #[test_log::test]
    fn string_rejects_invalid_utf8() {
        assert!(AmpString.decode(&[0xff, 0xfe]).is_err());
    }

    #[test_log::test]
    fn type_mismatch_is_rejected() {
        assert_matches::assert_matches!(
            Integer.encode(&Value::String("nope".into())),
            Err(CodecError::TypeMismatch { .. })
        );
    }
}
