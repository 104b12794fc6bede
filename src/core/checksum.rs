//! Rolling additive 16-bit checksum carried at the tail of every TCP frame.
//!
//! Two 8-bit accumulators start at `0x7E`; the first sums the bytes, the
//! second sums the running first accumulator. They are folded together as
//! `val2 - ((val1 + val2) << 8)` truncated to 16 bits.

const SEED: u8 = 0x7E;

/// Compute the checksum over `data` (header and payload, no trailer)
#[inline]
pub fn checksum(data: &[u8]) -> u16 {
    let mut val1 = SEED;
    let mut val2 = SEED;
    for &b in data {
        val1 = val1.wrapping_add(b);
        val2 = val2.wrapping_add(val1);
    }
    let (v1, v2) = (i32::from(val1), i32::from(val2));
    (v2 - ((v1 + v2) << 8)) as u16
}

/// Check a full frame whose last two bytes are the big-endian checksum.
///
/// Returns `(packet, calculated)` on mismatch.
pub fn verify_frame(frame: &[u8]) -> Result<(), (u16, u16)> {
    if frame.len() < 2 {
        return Err((0, checksum(frame)));
    }
    let (body, trailer) = frame.split_at(frame.len() - 2);
    let packet = u16::from_be_bytes([trailer[0], trailer[1]]);
    let calculated = checksum(body);
    if packet == calculated {
        Ok(())
    } else {
        Err((packet, calculated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_uses_seed() {
        // val1 = val2 = 0x7E -> 0x7E - (0xFC << 8)
        assert_eq!(checksum(&[]), (0x7Ei32 - (0xFCi32 << 8)) as u16);
    }

    #[test]
    fn test_accumulators_wrap() {
        let data = [0xFFu8; 600];
        // must not panic in debug builds and must be stable
        assert_eq!(checksum(&data), checksum(&data));
    }

    #[test]
    fn test_known_vector() {
        // val1: 0x7E+1=0x7F, +2=0x81 ; val2: 0x7E+0x7F=0xFD, +0x81=0x17E -> 0x7E
        let expected = (0x7Ei32 - ((0x81i32 + 0x7Ei32) << 8)) as u16;
        assert_eq!(checksum(&[1, 2]), expected);
    }

    #[test]
    fn test_verify_frame() {
        let mut frame = vec![0x00, 0x03, 0xA9, 0x00, 0x42];
        let sum = checksum(&frame);
        frame.extend_from_slice(&sum.to_be_bytes());
        assert!(verify_frame(&frame).is_ok());

        frame[4] ^= 0x01;
        let (packet, calculated) = verify_frame(&frame).unwrap_err();
        assert_eq!(packet, sum);
        assert_ne!(calculated, sum);
    }
}
