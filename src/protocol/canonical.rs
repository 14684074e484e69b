//! Canonical JSON encoding for signed content
//!
//! Signatures are computed over the compact JSON form of an envelope's
//! content. Besides the fixed key order given by the wire struct, senders
//! escape `<`, `>`, `&`, U+2028 and U+2029 inside strings, so we do too.

use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;

/// Compact JSON formatter with HTML-safe string escaping
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;

        for (i, ch) in fragment.char_indices() {
            let escaped = match ch {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = i + ch.len_utf8();
        }

        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Serialize `value` with the canonical formatter
pub fn to_canonical_vec<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, CanonicalFormatter);
    value.serialize(&mut serializer)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_html_characters_escaped() {
        let bytes = to_canonical_vec("a<b>&c").unwrap();
        assert_eq!(bytes, br#""a\u003cb\u003e\u0026c""#.to_vec());
    }

    #[test]
    fn test_line_separators_escaped() {
        let bytes = to_canonical_vec("x\u{2028}y\u{2029}").unwrap();
        assert_eq!(bytes, br#""x\u2028y\u2029""#.to_vec());
    }

    #[test]
    fn test_standard_escapes_kept() {
        let bytes = to_canonical_vec("line\n\"quoted\"\\").unwrap();
        assert_eq!(bytes, br#""line\n\"quoted\"\\""#.to_vec());
    }

    #[test]
    fn test_compact_output() {
        let mut map = BTreeMap::new();
        map.insert("k", "v");
        map.insert("a", "<");

        let bytes = to_canonical_vec(&map).unwrap();
        assert_eq!(bytes, br#"{"a":"\u003c","k":"v"}"#.to_vec());
    }

    #[test]
    fn test_multibyte_text_untouched() {
        let bytes = to_canonical_vec("héllo ✓").unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "\"héllo ✓\"");
    }
}
