//! Frame Encoding and Bit Synchronization
//!
//! Wraps packets in a two-byte `0xAA 0xAA` preamble for transmission over
//! the simulated RF channel and recovers them from the demodulated bit
//! stream on the other side, tolerating small bit-phase offsets.

use thiserror::Error;

pub mod bits;
pub mod sync;

pub use bits::{bit_string, bytes_to_bits, pack_bits};
pub use sync::recover;

/// Frame preamble prepended to every transmitted packet.
pub const PREAMBLE: [u8; 2] = [0xAA, 0xAA];

/// The preamble as the bit pattern the synchronizer scans for.
pub const PREAMBLE_PATTERN: [u8; 16] = [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0];

/// Largest bit-phase offset the synchronizer compensates for.
pub const MAX_SHIFT: usize = 8;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SyncError {
    #[error("no preamble found in bit stream")]
    PreambleNotFound,
    #[error("recovered only {actual} bytes, too short for a primary header")]
    HeaderTooShort { actual: usize },
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Prepend the preamble to a packet, producing the frame bytes.
pub fn encode(packet: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(PREAMBLE.len() + packet.len());
    frame.extend_from_slice(&PREAMBLE);
    frame.extend_from_slice(packet);
    frame
}

/// Frame a packet and expand it to the one-bit-per-byte stream format the
/// modulator stage transmits.
pub fn encode_to_bits(packet: &[u8]) -> Vec<u8> {
    bits::bytes_to_bits(&encode(packet))
}
