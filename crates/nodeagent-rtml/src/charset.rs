//! Wire encoding of RTML documents.
//!
//! Documents travel as bytes in whatever encoding their XML declaration
//! names; the node agent's own output declares ISO-8859-1. Text inside the
//! crate is always a Rust `String`, so these helpers sit at the transport
//! edge: [`decode_document`] on the way in, [`encode_document`] on the way
//! out.
//!
//! Detection order is byte order mark, then the `encoding` pseudo-attribute
//! of the declaration, then UTF-8. Labels are resolved with WHATWG rules,
//! so `ISO-8859-1` maps to windows-1252. Characters the target encoding
//! cannot represent are written as numeric character references, which an
//! XML parser turns back into the original character.

use encoding_rs::{Encoding, UTF_8};

/// Encoding a serialized document declares for itself.
pub fn declared_encoding(xml: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(xml) {
        return encoding;
    }
    declaration_label(xml)
        .and_then(Encoding::for_label)
        .unwrap_or(UTF_8)
}

/// Decodes wire bytes into document text.
///
/// Malformed sequences become U+FFFD rather than failing; the XML parser
/// reports anything that no longer makes sense.
pub fn decode_document(bytes: &[u8]) -> String {
    let (text, _, _) = declared_encoding(bytes).decode(bytes);
    text.into_owned()
}

/// Encodes document text in the encoding its declaration names.
pub fn encode_document(xml: &str) -> Vec<u8> {
    let (bytes, _, _) = declared_encoding(xml.as_bytes()).encode(xml);
    bytes.into_owned()
}

fn declaration_label(xml: &[u8]) -> Option<&[u8]> {
    let start = xml.iter().position(|b| !b.is_ascii_whitespace())?;
    let xml = &xml[start..];
    if !xml.starts_with(b"<?xml") {
        return None;
    }
    let end = find(xml, b"?>")?;
    let declaration = &xml[..end];

    let attr = find(declaration, b"encoding")?;
    let rest = &declaration[attr + b"encoding".len()..];
    let rest = trim_ascii_start(rest).strip_prefix(b"=")?;
    let rest = trim_ascii_start(rest);
    let quote = *rest.first().filter(|q| **q == b'"' || **q == b'\'')?;
    let value = &rest[1..];
    let close = value.iter().position(|b| *b == quote)?;
    Some(&value[..close])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}
