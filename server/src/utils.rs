use std::fmt::Write;

/// Bytes shown by [`hex_dump`] before it starts eliding.
const DUMP_LIMIT: usize = 32;

// Hex rendering of a frame for debug logs, e.g. "ab 02 00 06 01 00"
pub fn hex_dump(bytes: &[u8]) -> String {
    let shown = &bytes[..bytes.len().min(DUMP_LIMIT)];
    let mut out = String::with_capacity(shown.len() * 3 + 16);
    for (i, byte) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    if bytes.len() > DUMP_LIMIT {
        let _ = write!(out, " .. (+{} bytes)", bytes.len() - DUMP_LIMIT);
    }
    out
}
