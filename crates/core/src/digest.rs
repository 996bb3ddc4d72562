//! Streaming digest sink

use sha1::{Digest, Sha1};

use crate::hash::RuleKey;

/// The field separator absorbed between encoded atoms.
const SEPARATOR: u8 = 0;

/// Accumulates the canonical byte stream of a rule key and produces the
/// 160-bit digest on [`finalize`](DigestSink::finalize).
///
/// The sink is deliberately dumb: it knows nothing about value shapes or
/// field names. Disambiguation between shapes is the classifier's job; the
/// sink only guarantees a fixed byte encoding for each primitive it is
/// handed. Strings are absorbed as their UTF-8 bytes, numbers in big-endian
/// fixed-width form, floats as their IEEE-754 bit patterns.
pub struct DigestSink {
    hasher: Sha1,
}

impl DigestSink {
    pub fn new() -> Self {
        DigestSink { hasher: Sha1::new() }
    }

    /// Append raw bytes.
    pub fn absorb_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Append the UTF-8 bytes of a string.
    pub fn absorb_str(&mut self, s: &str) {
        self.hasher.update(s.as_bytes());
    }

    /// Append a single zero byte.
    pub fn absorb_separator(&mut self) {
        self.hasher.update([SEPARATOR]);
    }

    pub fn absorb_i8(&mut self, v: i8) {
        self.hasher.update(v.to_be_bytes());
    }

    pub fn absorb_i16(&mut self, v: i16) {
        self.hasher.update(v.to_be_bytes());
    }

    pub fn absorb_i32(&mut self, v: i32) {
        self.hasher.update(v.to_be_bytes());
    }

    pub fn absorb_i64(&mut self, v: i64) {
        self.hasher.update(v.to_be_bytes());
    }

    /// Append the big-endian IEEE-754 bit pattern.
    pub fn absorb_f32(&mut self, v: f32) {
        self.hasher.update(v.to_bits().to_be_bytes());
    }

    /// Append the big-endian IEEE-754 bit pattern.
    pub fn absorb_f64(&mut self, v: f64) {
        self.hasher.update(v.to_bits().to_be_bytes());
    }

    /// Consume the sink and produce the digest.
    pub fn finalize(self) -> RuleKey {
        RuleKey::from_bytes(self.hasher.finalize().into())
    }
}

impl Default for DigestSink {
    fn default() -> Self {
        DigestSink::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;

    #[test]
    fn matches_hash_of_equivalent_byte_stream() {
        let mut sink = DigestSink::new();
        sink.absorb_str("name");
        sink.absorb_separator();
        sink.absorb_i32(7);
        sink.absorb_separator();

        let expected = hash_bytes(b"name\x00\x00\x00\x00\x07\x00");
        assert_eq!(sink.finalize().as_bytes(), expected.as_bytes());
    }

    #[test]
    fn integers_are_big_endian_fixed_width() {
        let mut sink = DigestSink::new();
        sink.absorb_i16(0x0102);
        sink.absorb_i64(3);
        let expected = hash_bytes(&[0x01, 0x02, 0, 0, 0, 0, 0, 0, 0, 3]);
        assert_eq!(sink.finalize().as_bytes(), expected.as_bytes());
    }

    #[test]
    fn floats_absorb_bit_patterns() {
        let mut sink = DigestSink::new();
        sink.absorb_f64(1.5);
        let expected = hash_bytes(&1.5f64.to_bits().to_be_bytes());
        assert_eq!(sink.finalize().as_bytes(), expected.as_bytes());
    }

    #[test]
    fn separator_is_a_single_zero_byte() {
        let mut sink = DigestSink::new();
        sink.absorb_separator();
        let expected = hash_bytes(&[0]);
        assert_eq!(sink.finalize().as_bytes(), expected.as_bytes());
    }

    #[test]
    fn empty_sink_digests_empty_input() {
        let expected = hash_bytes(b"");
        assert_eq!(DigestSink::new().finalize().as_bytes(), expected.as_bytes());
    }
}
