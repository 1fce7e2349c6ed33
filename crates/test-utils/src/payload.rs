//! Deterministic byte payloads for I/O tests.

/// One mebibyte; large enough to overflow any OS pipe buffer.
pub const MIB: usize = 1024 * 1024;

/// `len` bytes of printable, newline-separated text.
///
/// Lines are 64 bytes long and numbered, so a truncated or reordered copy
/// never compares equal to the original.
pub fn text_payload(len: usize) -> String {
    let mut out = String::with_capacity(len + 64);
    let mut line = 0usize;
    while out.len() < len {
        let prefix = format!("{line:08} ");
        out.push_str(&prefix);
        for i in 0..(63 - prefix.len()) {
            out.push((b'a' + ((line + i) % 26) as u8) as char);
        }
        out.push('\n');
        line += 1;
    }
    out.truncate(len);
    out
}

/// `len` bytes covering every byte value, including NUL and invalid UTF-8.
pub fn binary_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(31) ^ (i >> 8)) as u8).collect()
}
