//! Trace-level hex dumps of packet regions.

use std::fmt::Write;
use tracing::{enabled, trace, Level};

/// Format bytes as offset-prefixed rows of 16, grouped in 16-bit words.
///
/// ```text
/// 0000:  6000 0000  04d8 3aff  2001 0db8  0000 0000
/// ```
pub fn hexdump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3 + 8);
    for (row, chunk) in bytes.chunks(16).enumerate() {
        if row > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:04x}: ", row * 16);
        for group in chunk.chunks(4) {
            out.push(' ');
            for word in group.chunks(2) {
                out.push_str(&hex::encode(word));
                out.push(' ');
            }
        }
        out.truncate(out.trim_end().len());
    }
    out
}

/// Emit a labelled hex dump at TRACE level.
pub fn trace_dump(label: &str, bytes: &[u8]) {
    if enabled!(Level::TRACE) {
        trace!(len = bytes.len(), "{}:\n{}", label, hexdump(bytes));
    }
}
