//! Bit-level helpers shared by the framing and recovery paths.
//!
//! The demodulated stream is one bit per byte with only the low bit
//! significant, matching the unpacked output of a GMSK demodulator chain.
//! All expansion and packing is MSB-first.

/// Expand bytes into one bit per output byte, MSB first.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 0x01);
        }
    }
    bits
}

/// Pack `bits[start..]` into bytes, MSB first. A trailing group of fewer
/// than 8 bits is discarded.
pub fn pack_bits(bits: &[u8], start: usize) -> Vec<u8> {
    if start >= bits.len() {
        return Vec::new();
    }
    bits[start..]
        .chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | (b & 0x01)))
        .collect()
}

/// Render bytes as an ASCII '0'/'1' string, MSB first. Used for the bit
/// columns of the persisted send/receive logs.
pub fn bit_string(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for shift in (0..8).rev() {
            s.push(if (byte >> shift) & 0x01 == 1 { '1' } else { '0' });
        }
    }
    s
}
