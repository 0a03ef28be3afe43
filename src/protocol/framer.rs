//! Packet framer: serializes a [`Packet`] to the wire format described in
//! spec.md §4.2, and parses a single complete frame back out of a buffer.
//!
//! Mirrors the teacher's `read_descriptor`/`write_descriptor` pair in
//! `examples/colinmarc-pulseaudio-rs/src/protocol/mod.rs`, using the same
//! `byteorder` big-endian primitives, but framing key/value pairs instead of
//! a fixed descriptor header.

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read};

use super::packet::{MAX_KEY_LEN, MAX_VALUE_LEN};
use super::{Packet, ProtocolError};

/// Serializes a packet to its wire representation:
/// `(u16 key_len, key, u16 val_len, value)*, u16(0)`.
pub fn serialize_packet(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    write_packet(&mut buf, packet)?;
    Ok(buf)
}

/// Writes a packet's wire representation into `w`.
pub fn write_packet<W: io::Write>(w: &mut W, packet: &Packet) -> Result<(), ProtocolError> {
    for (key, value) in packet.iter() {
        if key.len() > MAX_KEY_LEN {
            return Err(ProtocolError::TooLong {
                field: "key",
                actual: key.len(),
                limit: MAX_KEY_LEN,
            });
        }
        if value.len() > MAX_VALUE_LEN {
            return Err(ProtocolError::TooLong {
                field: "value",
                actual: value.len(),
                limit: MAX_VALUE_LEN,
            });
        }

        w.write_u16::<NetworkEndian>(key.len() as u16)?;
        w.write_all(key.as_bytes())?;
        w.write_u16::<NetworkEndian>(value.len() as u16)?;
        w.write_all(value)?;
    }

    w.write_u16::<NetworkEndian>(0)?;
    Ok(())
}

/// Parses exactly one complete packet out of `buf`, starting at offset 0.
///
/// Used by tests and by callers who already have an entire frame in hand;
/// the [`crate::protocol::StreamParser`] is the incremental counterpart used
/// by the engine to handle arbitrarily chunked input.
pub fn deserialize_packet(buf: &[u8]) -> Result<Packet, ProtocolError> {
    let mut cursor = Cursor::new(buf);
    let mut packet = Packet::new();

    loop {
        let key_len = cursor.read_u16::<NetworkEndian>()? as usize;
        if key_len == 0 {
            return Ok(packet);
        }

        let mut key_bytes = vec![0u8; key_len];
        cursor.read_exact(&mut key_bytes)?;
        let key =
            String::from_utf8(key_bytes).map_err(|e| ProtocolError::InvalidKey(e.to_string()))?;
        if !key.is_ascii() {
            return Err(ProtocolError::InvalidKey(key));
        }

        let val_len = cursor.read_u16::<NetworkEndian>()? as usize;
        let mut value = vec![0u8; val_len];
        cursor.read_exact(&mut value)?;

        if packet.contains_key(&key) {
            return Err(ProtocolError::DuplicateKey(key));
        }
        packet.insert_unchecked(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn roundtrip_empty_packet() {
        let packet = Packet::new();
        let wire = serialize_packet(&packet).unwrap();
        assert_eq!(wire, vec![0, 0]);
        assert_eq!(deserialize_packet(&wire).unwrap(), packet);
    }

    #[test_log::test]
    fn roundtrip_multi_pair_packet() {
        let mut packet = Packet::new();
        packet.insert("_command", b"Echo".to_vec()).unwrap();
        packet.insert("_ask", b"1".to_vec()).unwrap();
        packet.insert("text", b"hello".to_vec()).unwrap();

        let wire = serialize_packet(&packet).unwrap();
        assert_eq!(deserialize_packet(&wire).unwrap(), packet);
    }

    #[test_log::test]
    fn rejects_oversize_key_at_serialize_time() {
        let mut packet = Packet::new();
        // Packet::insert already checks this, so go around it to exercise
        // the framer's own defense-in-depth check.
        packet.insert_unchecked("k".repeat(300), b"v".to_vec());
        assert!(matches!(
            serialize_packet(&packet),
            Err(ProtocolError::TooLong { field: "key", .. })
        ));
    }

    #[test_log::test]
    fn terminator_is_two_nul_bytes() {
        let packet = Packet::new();
        let wire = serialize_packet(&packet).unwrap();
        assert_eq!(&wire, &[0x00, 0x00]);
    }
}
