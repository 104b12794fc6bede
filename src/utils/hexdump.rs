//! Human-readable packet dumps for diagnostics.

use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Render `bytes` as offset, hex and ASCII columns under `title`
pub fn hexdump(title: &str, bytes: &[u8]) -> String {
    let mut out = String::with_capacity(title.len() + bytes.len() * 4 + 16);
    let _ = writeln!(out, "{title} ({} bytes)", bytes.len());

    for (line, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        let _ = write!(out, "{:04X}: ", line * BYTES_PER_LINE);
        for i in 0..BYTES_PER_LINE {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{b:02X} ");
                }
                None => out.push_str("   "),
            }
        }
        out.push(' ');
        for &b in chunk {
            out.push(if b.is_ascii_graphic() || b == b' ' {
                char::from(b)
            } else {
                '.'
            });
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let dump = hexdump("pkt", b"AB\x00");
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], "pkt (3 bytes)");
        assert!(lines[1].starts_with("0000: 41 42 00 "));
        assert!(lines[1].ends_with("AB."));
    }

    #[test]
    fn test_second_line_offset() {
        let dump = hexdump("t", &[0u8; 17]);
        assert!(dump.lines().nth(2).is_some_and(|l| l.starts_with("0010: 00")));
    }
}
