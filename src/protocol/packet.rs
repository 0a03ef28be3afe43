//! The AMP packet: an ordered, key-unique map of short ASCII keys to short
//! byte-string values (spec.md §3).

use super::ProtocolError;

/// Maximum key length allowed on the wire.
pub const MAX_KEY_LEN: usize = 255;
/// Maximum value length allowed on the wire.
pub const MAX_VALUE_LEN: usize = 65535;

/// Reserved envelope keys. A command schema's own argument keys must never
/// collide with these.
pub const KEY_COMMAND: &str = "_command";
pub const KEY_ASK: &str = "_ask";
pub const KEY_ANSWER: &str = "_answer";
pub const KEY_ERROR: &str = "_error";
pub const KEY_ERROR_CODE: &str = "_error_code";
pub const KEY_ERROR_DESCRIPTION: &str = "_error_description";

/// An ordered sequence of `(key, value)` pairs with unique keys.
///
/// Order is preserved on both insertion and iteration, since serialization
/// order is significant (spec.md §3: "Order of descriptors defines
/// deterministic serialization order"). A `Vec` is sufficient here — AMP
/// packets are small (a handful of reserved keys plus a schema's argument
/// list), so there is no need for a hash-indexed ordered map like
/// `indexmap`, which none of this crate's dependencies otherwise pull in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    pairs: Vec<(String, Vec<u8>)>,
}

impl Packet {
    /// Creates an empty packet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key/value pair, validating length and ASCII-ness, and
    /// rejecting a key already present in this packet.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Result<(), ProtocolError> {
        let key = key.into();
        let value = value.into();

        if key.is_empty() || key.len() > MAX_KEY_LEN || !key.is_ascii() {
            return Err(ProtocolError::InvalidKey(key));
        }
        if value.len() > MAX_VALUE_LEN {
            return Err(ProtocolError::TooLong {
                field: "value",
                actual: value.len(),
                limit: MAX_VALUE_LEN,
            });
        }
        if self.contains_key(&key) {
            return Err(ProtocolError::DuplicateKey(key));
        }

        self.pairs.push((key, value));
        Ok(())
    }

    /// Inserts a pair without validating it, trusting the caller (used by
    /// the stream parser, which has already checked key/value lengths while
    /// reading the header bytes off the wire).
    pub(crate) fn insert_unchecked(&mut self, key: String, value: Vec<u8>) {
        self.pairs.push((key, value));
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Removes and returns a value by key, preserving the order of the
    /// remaining pairs.
    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        let idx = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(idx).1)
    }

    /// True if `key` is present in this packet.
    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Iterates the pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of pairs in the packet.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True if the packet has no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl FromIterator<(String, Vec<u8>)> for Packet {
    fn from_iter<T: IntoIterator<Item = (String, Vec<u8>)>>(iter: T) -> Self {
        Packet {
            pairs: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn rejects_oversize_key() {
        let mut p = Packet::new();
        let key = "k".repeat(MAX_KEY_LEN + 1);
        assert!(p.insert(key, b"v".to_vec()).is_err());
    }

    #[test_log::test]
    fn rejects_oversize_value() {
        let mut p = Packet::new();
        let value = vec![b'x'; MAX_VALUE_LEN + 1];
        assert!(p.insert("k", value).is_err());
    }

    #[test_log::test]
    fn accepts_max_value_length() {
        let mut p = Packet::new();
        let value = vec![b'x'; MAX_VALUE_LEN];
        assert!(p.insert("text", value).is_ok());
    }

    #[test_log::test]
    fn rejects_duplicate_key() {
        let mut p = Packet::new();
        p.insert("k", b"v1".to_vec()).unwrap();
        assert!(p.insert("k", b"v2".to_vec()).is_err());
    }

    #[test_log::test]
    fn rejects_non_ascii_key() {
        let mut p = Packet::new();
        assert!(p.insert("k\u{00e9}y", b"v".to_vec()).is_err());
    }

    #[test_log::test]
    fn preserves_insertion_order() {
        let mut p = Packet::new();
        p.insert("b", b"2".to_vec()).unwrap();
        p.insert("a", b"1".to_vec()).unwrap();
        let keys: Vec<&str> = p.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
