use std::fmt;

/// Write a hexdump of the provided byte slice, sixteen bytes per row with
/// the printable ASCII rendering alongside.
pub fn hexdump(f: &mut fmt::Formatter, prefix: &str, buffer: &[u8]) -> fmt::Result {
    const COLUMNS: usize = 16;
    if buffer.is_empty() {
        // At least print an offset instead of nothing.
        return write!(f, "{}{:04x}: ", prefix, 0);
    }
    for (row_index, row) in buffer.chunks(COLUMNS).enumerate() {
        if row_index > 0 {
            writeln!(f)?;
        }
        write!(f, "{}{:04x}: ", prefix, row_index * COLUMNS)?;
        for b in row {
            write!(f, "{:02x} ", b)?;
        }
        for _ in row.len()..COLUMNS {
            write!(f, "   ")?;
        }
        for b in row {
            let c = match *b {
                c @ 0x20..=0x7e => c as char,
                _ => '.',
            };
            write!(f, "{}", c)?;
        }
    }
    Ok(())
}

pub struct Hex<'a>(pub &'a [u8]);

impl<'a> fmt::Display for Hex<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        hexdump(f, "", self.0)
    }
}

pub fn hex(bytes: &[u8]) -> Hex {
    Hex(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hexdump() {
        let bytes: Vec<u8> = (0x41..0x41 + 18).collect();
        let dump = hex(&bytes).to_string();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "0000: 41 42 43 44 45 46 47 48 49 4a 4b 4c 4d 4e 4f 50 ABCDEFGHIJKLMNOP"
        );
        assert_eq!(lines[1], format!("0010: 51 52 {}QR", "   ".repeat(14)));
    }

    #[test]
    fn test_hexdump_unprintable() {
        assert_eq!(hex(&[0x00, 0x7f]).to_string(), format!("0000: 00 7f {}..", "   ".repeat(14)));
        assert_eq!(hex(&[]).to_string(), "0000: ");
    }
}
