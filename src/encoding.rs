//! Byte-level normalization of uploaded statement files.
//!
//! Bank exports are usually UTF-8, sometimes with a BOM, but Portuguese and
//! Spanish banks still ship Latin-1 files. Anything that is not valid UTF-8
//! is decoded byte-for-byte as Latin-1. No other encodings are attempted.

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Decode raw statement bytes into text.
///
/// Strips a leading UTF-8 byte order mark, then decodes as UTF-8 when valid
/// and as Latin-1 otherwise.
pub fn decode_statement_bytes(data: &[u8]) -> String {
    let data = data.strip_prefix(&UTF8_BOM).unwrap_or(data);

    match std::str::from_utf8(data) {
        Ok(text) => text.to_owned(),
        // Latin-1 maps each byte to the code point with the same value.
        Err(_) => data.iter().map(|&byte| byte as char).collect(),
    }
}
