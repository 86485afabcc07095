//! Decoding of guest byte ranges into host strings.
//!
//! A strategy is picked once when the host is configured and then copied
//! into every run; it is never re-selected per call.

use serde::{Deserialize, Serialize};

/// How guest bytes are turned into text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Utf8Strategy {
    /// Standard UTF-8 decoding, malformed sequences become U+FFFD.
    #[default]
    Native,
    /// Lenient byte-pattern decoder that never rejects input.
    Manual,
}

impl Utf8Strategy {
    /// Decode `bytes` with this strategy.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Utf8Strategy::Native => String::from_utf8_lossy(bytes).into_owned(),
            Utf8Strategy::Manual => decode_manual(bytes),
        }
    }
}

// Lead byte picks the sequence length; missing continuation bytes read as 0.
fn decode_manual(data: &[u8]) -> String {
    let tail = |i: usize| u32::from(data.get(i).copied().unwrap_or(0) & 0x3F);

    let mut out = String::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let lead = u32::from(data[i]);
        let (code, width) = match lead {
            0x00..=0x7F => (lead, 1),
            0xC0..=0xDF => ((lead & 0x1F) << 6 | tail(i + 1), 2),
            0xE0..=0xEF => ((lead & 0x0F) << 12 | tail(i + 1) << 6 | tail(i + 2), 3),
            _ => (
                (lead & 0x07) << 18 | tail(i + 1) << 12 | tail(i + 2) << 6 | tail(i + 3),
                4,
            ),
        };
        out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
        i += width;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_and_manual_agree_on_valid_utf8() {
        let text = "Mario Kart: Double Dash!! ünïcödé ✓ 🍄";
        assert_eq!(Utf8Strategy::Native.decode(text.as_bytes()), text);
        assert_eq!(Utf8Strategy::Manual.decode(text.as_bytes()), text);
    }

    #[test]
    fn test_native_replaces_malformed_bytes() {
        assert_eq!(Utf8Strategy::Native.decode(b"ab\xFFcd"), "ab\u{FFFD}cd");
    }

    #[test]
    fn test_manual_reads_missing_tail_as_zero() {
        // 0xC3 alone decodes as if followed by 0x80.
        assert_eq!(Utf8Strategy::Manual.decode(b"\xC3"), "\u{C0}");
    }

    #[test]
    fn test_manual_treats_stray_continuation_as_four_byte_lead() {
        // 0x80 consumes itself plus three following bytes.
        let decoded = Utf8Strategy::Manual.decode(b"\x80abcZ");
        assert!(decoded.ends_with('Z'));
        assert_eq!(decoded.chars().count(), 2);
    }

    #[test]
    fn test_manual_replaces_surrogates() {
        assert_eq!(Utf8Strategy::Manual.decode(b"\xED\xA0\x80"), "\u{FFFD}");
    }

    #[test]
    fn test_strategy_is_lowercase_in_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            decoder: Utf8Strategy,
        }
        let parsed: Wrapper = toml::from_str("decoder = \"manual\"").unwrap();
        assert_eq!(parsed.decoder, Utf8Strategy::Manual);
    }
}
