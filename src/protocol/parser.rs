//! Incremental stream parser (spec.md §4.3, §9 "Generator-as-state-machine").
//!
//! The original implementation (`original/protocol.py::_parser`) is a
//! coroutine that `yield`s the number of bytes it wants next; the resumed
//! generator frame *is* the parser's state. Rust has no stackful
//! coroutines suited to this, so the state is reified as data: a
//! [`ParserState`] enum plus a pending-key slot and the packet currently
//! under construction, updated by [`StreamParser::feed`] exactly the way
//! the design notes prescribe.

use super::packet::{MAX_KEY_LEN, MAX_VALUE_LEN};
use super::{Packet, ProtocolError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParserState {
    /// Awaiting a 2-byte length header.
    Header,
    /// Awaiting `n` bytes that make up the next key.
    ReadKey(usize),
    /// Awaiting `n` bytes that make up the value for `pending_key`.
    ReadValue(usize),
}

/// A resumable state machine that turns an arbitrarily chunked byte stream
/// into a sequence of complete [`Packet`]s.
///
/// Bytes are handed to [`feed`](StreamParser::feed) as they arrive off the
/// transport, in any grouping — one byte at a time, the whole frame at
/// once, or anything in between (spec.md Testable Properties, scenario 8).
/// Partial frames accumulate in an internal buffer between calls.
#[derive(Debug)]
pub struct StreamParser {
    state: ParserState,
    pending_key: Option<String>,
    current: Packet,
    buf: Vec<u8>,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    /// Creates a fresh parser positioned at the start of a packet.
    pub fn new() -> Self {
        StreamParser {
            state: ParserState::Header,
            pending_key: None,
            current: Packet::new(),
            buf: Vec::new(),
        }
    }

    /// Feeds newly received bytes into the parser, returning every packet
    /// completed as a result (zero, one, or many — a single `feed` call can
    /// complete several packets if enough bytes are available).
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Packet>, ProtocolError> {
        self.buf.extend_from_slice(data);
        let mut completed = Vec::new();

        loop {
            let want = self.bytes_wanted();
            if self.buf.len() < want {
                break;
            }

            let token: Vec<u8> = self.buf.drain(..want).collect();
            if let Some(packet) = self.advance(token)? {
                completed.push(packet);
            }
        }

        Ok(completed)
    }

    /// How many bytes the parser needs before it can make progress — the
    /// explicit-state analogue of the original generator's `yield n`.
    fn bytes_wanted(&self) -> usize {
        match self.state {
            ParserState::Header => 2,
            ParserState::ReadKey(n) => n,
            ParserState::ReadValue(n) => n,
        }
    }

    /// Consumes exactly `bytes_wanted()` bytes and advances the state
    /// machine, returning a completed packet when the two-NUL terminator is
    /// reached.
    fn advance(&mut self, token: Vec<u8>) -> Result<Option<Packet>, ProtocolError> {
        match std::mem::replace(&mut self.state, ParserState::Header) {
            ParserState::Header => {
                let len = u16::from_be_bytes([token[0], token[1]]) as usize;

                if len == 0 {
                    let packet = std::mem::take(&mut self.current);
                    self.state = ParserState::Header;
                    return Ok(Some(packet));
                }

                self.state = if self.pending_key.is_none() {
                    if len > MAX_KEY_LEN {
                        return Err(ProtocolError::TooLong {
                            field: "key",
                            actual: len,
                            limit: MAX_KEY_LEN,
                        });
                    }
                    ParserState::ReadKey(len)
                } else {
                    if len > MAX_VALUE_LEN {
                        return Err(ProtocolError::TooLong {
                            field: "value",
                            actual: len,
                            limit: MAX_VALUE_LEN,
                        });
                    }
                    ParserState::ReadValue(len)
                };

                Ok(None)
            }
            ParserState::ReadKey(_) => {
                let key = String::from_utf8(token)
                    .map_err(|e| ProtocolError::InvalidKey(e.to_string()))?;
                if !key.is_ascii() || key.is_empty() {
                    return Err(ProtocolError::InvalidKey(key));
                }

                self.pending_key = Some(key);
                self.state = ParserState::Header;
                Ok(None)
            }
            ParserState::ReadValue(_) => {
                let key = self
                    .pending_key
                    .take()
                    .expect("ReadValue state implies a pending key");

                if self.current.contains_key(&key) {
                    return Err(ProtocolError::DuplicateKey(key));
                }
                self.current.insert_unchecked(key, token);

                self.state = ParserState::Header;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::framer::serialize_packet;
    use pretty_assertions::assert_eq;
    use rand::Rng;

    fn sample_packet() -> Packet {
        let mut p = Packet::new();
        p.insert("_command", b"Echo".to_vec()).unwrap();
        p.insert("_ask", b"7".to_vec()).unwrap();
        p.insert("text", b"hello world".to_vec()).unwrap();
        p
    }

    #[test_log::test]
    fn parses_whole_frame_at_once() {
        let packet = sample_packet();
        let wire = serialize_packet(&packet).unwrap();

        let mut parser = StreamParser::new();
        let packets = parser.feed(&wire).unwrap();
        assert_eq!(packets, vec![packet]);
    }

    #[test_log::test]
    fn parses_frame_delivered_one_byte_at_a_time() {
        let packet = sample_packet();
        let wire = serialize_packet(&packet).unwrap();

        let mut parser = StreamParser::new();
        let mut completed = Vec::new();
        for byte in wire {
            completed.extend(parser.feed(&[byte]).unwrap());
        }

        assert_eq!(completed, vec![packet]);
    }

    #[test_log::test]
    fn parses_frame_delivered_at_random_split_points() {
        let packet = sample_packet();
        let wire = serialize_packet(&packet).unwrap();

        let mut rng = rand::rng();
        let mut parser = StreamParser::new();
        let mut completed = Vec::new();
        let mut offset = 0;
        while offset < wire.len() {
            let remaining = wire.len() - offset;
            let chunk = rng.random_range(1..=remaining);
            completed.extend(parser.feed(&wire[offset..offset + chunk]).unwrap());
            offset += chunk;
        }

        assert_eq!(completed, vec![packet]);
    }

    #[test_log::test]
    fn parses_multiple_packets_in_one_feed() {
        let a = sample_packet();
        let mut b = Packet::new();
        b.insert("_answer", b"7".to_vec()).unwrap();
        b.insert("text", b"hellohello".to_vec()).unwrap();

        let mut wire = serialize_packet(&a).unwrap();
        wire.extend(serialize_packet(&b).unwrap());

        let mut parser = StreamParser::new();
        let packets = parser.feed(&wire).unwrap();
        assert_eq!(packets, vec![a, b]);
    }

    #[test_log::test]
    fn rejects_duplicate_key_in_one_packet() {
        let mut wire = Vec::new();
        // key "a" twice, terminator.
        for _ in 0..2 {
            wire.extend_from_slice(&1u16.to_be_bytes());
            wire.extend_from_slice(b"a");
            wire.extend_from_slice(&1u16.to_be_bytes());
            wire.extend_from_slice(b"1");
        }
        wire.extend_from_slice(&0u16.to_be_bytes());

        let mut parser = StreamParser::new();
        assert!(parser.feed(&wire).is_err());
    }

    #[test_log::test]
    fn rejects_oversize_key_length() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&300u16.to_be_bytes());
        let mut parser = StreamParser::new();
        assert!(matches!(
            parser.feed(&wire),
            Err(ProtocolError::TooLong { field: "key", .. })
        ));
    }
}
