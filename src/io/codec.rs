//! Text <-> byte conversion for PTY traffic.
//!
//! Encoding is plain UTF-8. Decoding is lossy but total: invalid
//! sequences become U+FFFD instead of failing the read.

/// Encode text for writing to the PTY.
pub fn encode(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Decode PTY output, replacing invalid sequences with U+FFFD.
pub fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Incremental decoder for output that arrives in arbitrary chunks.
///
/// A multi-byte character split across two reads is held back until the
/// rest of it arrives, so chunk boundaries never introduce U+FFFD.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    carry: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(bytes);
        let split = buf.len() - incomplete_tail_len(&buf);
        self.carry = buf.split_off(split);
        decode(&buf)
    }

    /// Flush whatever is held back (lossily).
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.carry);
        decode(&rest)
    }
}

/// Length of a trailing, not yet complete UTF-8 sequence.
fn incomplete_tail_len(buf: &[u8]) -> usize {
    let start = buf.len().saturating_sub(3);
    for i in (start..buf.len()).rev() {
        let byte = buf[i];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let width = match byte {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => 1,
        };
        let available = buf.len() - i;
        return if width > available { available } else { 0 };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trips_any_text() {
        proptest!(|(text in any::<String>())| {
            prop_assert_eq!(decode(&encode(&text)), text);
        });
    }

    #[test]
    fn stream_decoder_is_split_agnostic() {
        proptest!(|(
            text in any::<String>(),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
        )| {
            let bytes = encode(&text);
            let mut points: Vec<usize> =
                cuts.iter().map(|cut| cut.index(bytes.len() + 1)).collect();
            points.sort_unstable();
            points.dedup();

            let mut decoder = StreamDecoder::new();
            let mut out = String::new();
            let mut start = 0;
            for point in points {
                out.push_str(&decoder.decode(&bytes[start..point]));
                start = point;
            }
            out.push_str(&decoder.decode(&bytes[start..]));
            out.push_str(&decoder.finish());

            prop_assert_eq!(out, text);
        });
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let text = decode(&[b'o', b'k', 0xFF, b'!']);
        assert_eq!(text, "ok\u{FFFD}!");
    }

    #[test]
    fn stream_decoder_joins_split_characters() {
        let bytes = encode("a世b");
        let mut decoder = StreamDecoder::new();

        let first = decoder.decode(&bytes[..2]);
        let second = decoder.decode(&bytes[2..]);

        assert_eq!(first, "a");
        assert_eq!(second, "世b");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn stream_decoder_flushes_dangling_bytes() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.decode(&[0xE4, 0xB8]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }
}
