//! Frame recovery from a demodulated bit stream.
//!
//! The receive chain cannot assume byte alignment: the demodulator may
//! deliver the stream offset by a few bits. Recovery tries bit shifts of
//! 0 through 8 and scans each shifted view for the 16-bit preamble pattern,
//! then reconstructs bytes from the first bit after the preamble and
//! reconciles the recovered length against the primary header.

use crate::bits::pack_bits;
use crate::{Result, SyncError, MAX_SHIFT, PREAMBLE_PATTERN};
use ccsds_packet::{Packet, PrimaryHeader, PRIMARY_HEADER_LEN};
use tracing::debug;

/// Recover one packet from a demodulated bit stream (one bit per byte, low
/// bit significant).
///
/// The lowest shift with any preamble match wins, regardless of where in
/// the stream that match sits. A higher shift could in principle hold an
/// earlier, correct sync point while a noise-induced pattern satisfies a
/// lower shift; that mis-lock is accepted as part of the channel model and
/// surfaces downstream as a corrupted or lost record.
///
/// Recovery is stateless: each call sees one datagram's bits, and nothing
/// carries over between calls.
pub fn recover(bit_stream: &[u8]) -> Result<Packet> {
    let (shift, idx) = find_preamble(bit_stream).ok_or(SyncError::PreambleNotFound)?;
    debug!(shift, idx, bits = bit_stream.len(), "preamble locked");

    let start = shift + idx + PREAMBLE_PATTERN.len();
    let mut restored = pack_bits(bit_stream, start);
    if restored.len() < PRIMARY_HEADER_LEN {
        return Err(SyncError::HeaderTooShort {
            actual: restored.len(),
        });
    }

    let header = PrimaryHeader::parse(&restored).map_err(|_| SyncError::HeaderTooShort {
        actual: restored.len(),
    })?;
    reconcile_length(&mut restored, &header);
    Ok(Packet::new(restored))
}

/// Find the lowest shift in `0..=MAX_SHIFT` whose shifted view contains the
/// preamble pattern. Returns `(shift, index_within_shifted_view)`.
fn find_preamble(bits: &[u8]) -> Option<(usize, usize)> {
    for shift in 0..=MAX_SHIFT {
        if shift >= bits.len() {
            break;
        }
        if let Some(idx) = scan_pattern(&bits[shift..]) {
            return Some((shift, idx));
        }
    }
    None
}

fn scan_pattern(bits: &[u8]) -> Option<usize> {
    bits.windows(PREAMBLE_PATTERN.len()).position(|window| {
        window
            .iter()
            .zip(PREAMBLE_PATTERN)
            .all(|(&b, p)| b & 0x01 == p)
    })
}

/// Force the recovered byte count to agree with the header's declared
/// payload length: pad short payloads with 0x00, truncate long ones. This
/// corrects the length only; padded or truncated content stays wrong and
/// is caught by the bit-error comparison downstream.
fn reconcile_length(restored: &mut Vec<u8>, header: &PrimaryHeader) {
    let expected = header.expected_payload_len();
    let actual = restored.len() - PRIMARY_HEADER_LEN;
    if actual < expected {
        debug!(pad = expected - actual, "padding short payload");
    } else if actual > expected {
        debug!(cut = actual - expected, "truncating excess payload");
    }
    restored.resize(PRIMARY_HEADER_LEN + expected, 0x00);
}
