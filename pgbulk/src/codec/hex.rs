/// Prefix of a bytea token in the COPY stream.
///
/// The backslash is doubled so the token carries the escaped `\x` form through the CSV layer.
pub const BYTEA_HEX_PREFIX: &str = "\\\\x";

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Appends `bytes` to `out` in Postgres hex bytea notation with lowercase digits.
pub fn write_bytea_hex(bytes: &[u8], out: &mut String) {
    out.reserve(BYTEA_HEX_PREFIX.len() + bytes.len() * 2);
    out.push_str(BYTEA_HEX_PREFIX);

    for byte in bytes {
        out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
        out.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
    }
}
