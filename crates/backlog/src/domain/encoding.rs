//! Text normalization applied to everything that crosses an I/O boundary.
//!
//! Providers and uploads occasionally hand back bytes that are not valid
//! UTF-8. Input that is mostly UTF-8 with a few stray bytes is decoded
//! lossily; anything else is treated as Windows-1252 (a superset of the
//! printable Latin-1 range). Line endings and stray control characters are
//! cleaned up afterwards.

/// Windows-1252 code points for bytes 0x80..=0x9F. Undefined slots map to
/// the replacement character.
const CP1252_HIGH: [char; 32] = [
    '\u{20ac}', '\u{fffd}', '\u{201a}', '\u{0192}', '\u{201e}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02c6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{fffd}', '\u{017d}', '\u{fffd}',
    '\u{fffd}', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02dc}', '\u{2122}', '\u{0161}', '\u{203a}', '\u{0153}', '\u{fffd}', '\u{017e}', '\u{0178}',
];

fn decode_cp1252(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9f => CP1252_HIGH[usize::from(b - 0x80)],
            _ => char::from(b),
        })
        .collect()
}

/// True when valid multi-byte UTF-8 sequences outnumber invalid ones.
fn mostly_utf8(bytes: &[u8]) -> bool {
    let mut multibyte = 0usize;
    let mut invalid = 0usize;
    for chunk in bytes.utf8_chunks() {
        multibyte += chunk.valid().chars().filter(|c| !c.is_ascii()).count();
        if !chunk.invalid().is_empty() {
            invalid += 1;
        }
    }
    multibyte > invalid
}

/// Decode raw bytes into canonical text.
///
/// Valid UTF-8 round-trips unchanged.
pub fn normalize_bytes(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return normalize_text(text);
    }
    if mostly_utf8(bytes) {
        tracing::debug!(len = bytes.len(), "Input has stray invalid UTF-8 bytes, decoding lossily");
        normalize_text(&String::from_utf8_lossy(bytes))
    } else {
        tracing::debug!(len = bytes.len(), "Input is not UTF-8, re-decoding as Windows-1252");
        normalize_text(&decode_cp1252(bytes))
    }
}

/// Normalize already-decoded text: strip the BOM, unify line endings, drop
/// control characters other than newline and tab.
pub fn normalize_text(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_round_trips() {
        let input = "Intermédiaire — données";
        assert_eq!(normalize_bytes(input.as_bytes()), input);
    }

    #[test]
    fn test_latin1_is_redecoded() {
        // "Débutant" in ISO-8859-1
        let bytes = [0x44, 0xE9, 0x62, 0x75, 0x74, 0x61, 0x6E, 0x74];
        assert_eq!(normalize_bytes(&bytes), "Débutant");
    }

    #[test]
    fn test_windows_1252_punctuation_is_kept() {
        let bytes = b"l\x92application co\x96te 100\x80";
        assert_eq!(normalize_bytes(bytes), "l\u{2019}application co\u{2013}te 100\u{20ac}");
    }

    #[test]
    fn test_stray_byte_in_utf8_does_not_garble_accents() {
        let mut bytes = "Intermédiaire données ".as_bytes().to_vec();
        bytes.push(0xFF);
        assert_eq!(normalize_bytes(&bytes), "Intermédiaire données \u{fffd}");
    }

    #[test]
    fn test_line_endings_and_controls() {
        let input = "\u{feff}EPIC: Core\r\nFEATURE: Auth\rSTORY: x\u{0}\t| 1 | 1";
        assert_eq!(
            normalize_text(input),
            "EPIC: Core\nFEATURE: Auth\nSTORY: x\t| 1 | 1"
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize_bytes(b"a\r\nb\x00c");
        assert_eq!(normalize_text(&once), once);
    }
}
