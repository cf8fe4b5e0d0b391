//! Filename decoding for archives written by tools that predate (or ignore)
//! the UTF-8 flag.
//!
//! Candidates are tried in order and the first one that accepts the bytes
//! wins. ISO-8859-1 maps every byte, so anything that is not UTF-8 stops
//! there and the later candidates only document the order.

use encoding_rs::{Encoding, MACINTOSH, SHIFT_JIS, WINDOWS_1252};

type Decoder = fn(&[u8]) -> Option<String>;

const DECODERS: &[(&str, Decoder)] = &[
    ("UTF-8", decode_utf8),
    ("ISO-8859-1", decode_latin1),
    ("Windows-1252", decode_windows_1252),
    ("Mac OS Roman", decode_mac_roman),
    ("Shift-JIS", decode_shift_jis),
    ("ASCII", decode_ascii),
];

/// Decode a raw filename, or `None` if no candidate accepts it.
pub fn decode_filename(bytes: &[u8]) -> Option<String> {
    DECODERS.iter().find_map(|(label, decode)| {
        let name = decode(bytes)?;
        tracing::trace!(encoding = label, %name, "decoded filename");
        Some(name)
    })
}

fn decode_utf8(bytes: &[u8]) -> Option<String> {
    // A literal U+FFFD in the name means some tool already substituted
    // bytes it could not map; a legacy code page reads those bytes better.
    std::str::from_utf8(bytes)
        .ok()
        .filter(|s| !s.contains(char::REPLACEMENT_CHARACTER))
        .map(str::to_owned)
}

/// Plain ISO-8859-1, except that bytes in the C1 range take their
/// Windows-1252 punctuation when every one of them has some.
fn decode_latin1(bytes: &[u8]) -> Option<String> {
    decode_windows_1252(bytes)
        .or_else(|| Some(encoding_rs::mem::decode_latin1(bytes).into_owned()))
}

fn decode_windows_1252(bytes: &[u8]) -> Option<String> {
    decode_strict(WINDOWS_1252, bytes).filter(|s| !has_c1_controls(s))
}

fn decode_mac_roman(bytes: &[u8]) -> Option<String> {
    decode_strict(MACINTOSH, bytes)
}

fn decode_shift_jis(bytes: &[u8]) -> Option<String> {
    decode_strict(SHIFT_JIS, bytes)
}

fn decode_ascii(bytes: &[u8]) -> Option<String> {
    bytes
        .is_ascii()
        .then(|| String::from_utf8_lossy(bytes).into_owned())
}

fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|s| s.into_owned())
}

/// encoding_rs maps the five bytes Windows-1252 leaves undefined to C1
/// controls instead of failing.
fn has_c1_controls(s: &str) -> bool {
    s.chars().any(|c| ('\u{80}'..='\u{9f}').contains(&c))
}
