//! Application field extraction from recovered packets.
//!
//! Command packets carry `"<id>:<text>"` at a fixed offset past the primary
//! and secondary command headers. Telemetry packets are recovered from a
//! noisy channel, so the field is located by scanning for the first `:` byte
//! immediately preceded by an ASCII digit run. Malformed application content
//! never fails hard: the parser degrades to opaque text (hex-encoded when the
//! bytes are not valid UTF-8) with no numeric id.

use crate::{Packet, PrimaryHeader, Result, COMMAND_CODE_OFFSET, COMMAND_TEXT_OFFSET};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Protocol identifiers and the embedded application payload of one packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFields {
    pub mid: u16,
    pub apid: u16,
    pub sequence_count: u16,
    /// Command code, present for command-class packets only.
    pub command_code: Option<u8>,
    /// Numeric sequence id from the `"<id>:"` prefix, when parseable.
    pub sequence_id: Option<u64>,
    /// Application text with the id prefix and trailing NUL padding removed.
    /// Falls back to the whole decoded (or hex-encoded) payload when no id
    /// prefix is found.
    pub text: String,
}

impl ParsedFields {
    fn from_header(header: &PrimaryHeader) -> Self {
        Self {
            mid: header.stream_id,
            apid: header.apid(),
            sequence_count: header.sequence_count(),
            command_code: None,
            sequence_id: None,
            text: String::new(),
        }
    }

    /// Correlation id for the record stores: the embedded sequence id when
    /// present, else a synthetic `"<apid>-<seq>"` fallback.
    pub fn record_id(&self) -> String {
        match self.sequence_id {
            Some(id) => id.to_string(),
            None => format!("{}-{}", self.apid, self.sequence_count),
        }
    }
}

/// Parse a command-class packet: command code at byte 6, `"<id>:<text>"` at
/// the fixed text offset.
pub fn parse_command(packet: &Packet) -> Result<ParsedFields> {
    let bytes = packet.as_bytes();
    let header = PrimaryHeader::parse(bytes)?;
    let mut fields = ParsedFields::from_header(&header);

    if bytes.len() > COMMAND_CODE_OFFSET {
        fields.command_code = Some(bytes[COMMAND_CODE_OFFSET]);
    }

    let app = if bytes.len() > COMMAND_TEXT_OFFSET {
        strip_trailing_nuls(&bytes[COMMAND_TEXT_OFFSET..])
    } else {
        &[]
    };

    match split_id_prefix(app) {
        Some((id, body)) => {
            fields.sequence_id = Some(id);
            fields.text = decode_text(body);
        }
        None => {
            debug!(mid = fields.mid, "command payload has no id prefix, treating as opaque");
            fields.text = decode_text(app);
        }
    }
    Ok(fields)
}

/// Parse a telemetry-class packet: the text field position may have drifted
/// through the channel, so scan the payload for the first `:` preceded by a
/// digit run instead of trusting a fixed offset.
pub fn parse_telemetry(packet: &Packet) -> Result<ParsedFields> {
    let bytes = packet.as_bytes();
    let header = PrimaryHeader::parse(bytes)?;
    let mut fields = ParsedFields::from_header(&header);

    let payload = strip_trailing_nuls(&bytes[crate::PRIMARY_HEADER_LEN..]);
    match scan_id_marker(payload) {
        Some((id, body)) => {
            fields.sequence_id = Some(id);
            fields.text = decode_text(body);
        }
        None => {
            debug!(mid = fields.mid, "no id marker in telemetry payload, treating as opaque");
            fields.text = decode_text(payload);
        }
    }
    Ok(fields)
}

fn strip_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0x00)
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}

/// Split a leading `"<digits>:"` prefix. The digits must start at byte zero;
/// anything else is not a command id prefix.
fn split_id_prefix(bytes: &[u8]) -> Option<(u64, &[u8])> {
    let colon = bytes.iter().position(|&b| b == b':')?;
    if colon == 0 || !bytes[..colon].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let id = std::str::from_utf8(&bytes[..colon]).ok()?.parse().ok()?;
    Some((id, &bytes[colon + 1..]))
}

/// Locate the first `:` byte immediately preceded by an ASCII digit run,
/// anywhere in the payload. Returns the digits as the id and everything after
/// the colon as the body.
fn scan_id_marker(bytes: &[u8]) -> Option<(u64, &[u8])> {
    for (sep, &b) in bytes.iter().enumerate() {
        if b != b':' {
            continue;
        }
        let start = bytes[..sep]
            .iter()
            .rposition(|b| !b.is_ascii_digit())
            .map_or(0, |pos| pos + 1);
        if start == sep {
            continue; // colon with no digits before it
        }
        if let Ok(id) = std::str::from_utf8(&bytes[start..sep]).unwrap_or("").parse() {
            return Some((id, &bytes[sep + 1..]));
        }
    }
    None
}

/// Decode payload bytes as UTF-8, hex-encoding when that fails, and strip
/// any trailing NUL padding that survived decoding.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.trim_end_matches('\0').to_string(),
        Err(_) => hex::encode(bytes),
    }
}

/// Convenience check used by the stage loops: does this look like at least a
/// headered packet?
pub fn has_primary_header(bytes: &[u8]) -> bool {
    bytes.len() >= crate::PRIMARY_HEADER_LEN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        build_command_packet, build_telemetry_packet, PacketError, SEND_TEXT_MID, TEXT_TLM_MID,
    };

    #[test]
    fn test_parse_command_fields() {
        let pkt = Packet::new(build_command_packet(5, 3, "64:hello world"));
        let fields = parse_command(&pkt).unwrap();
        assert_eq!(fields.mid, SEND_TEXT_MID);
        assert_eq!(fields.sequence_count, 5);
        assert_eq!(fields.command_code, Some(3));
        assert_eq!(fields.sequence_id, Some(64));
        assert_eq!(fields.text, "hello world");
    }

    #[test]
    fn test_parse_command_without_id_prefix_is_opaque() {
        let pkt = Packet::new(build_command_packet(1, 3, "no id here"));
        let fields = parse_command(&pkt).unwrap();
        assert_eq!(fields.sequence_id, None);
        assert_eq!(fields.text, "no id here");
        assert_eq!(fields.record_id(), format!("{}-1", fields.apid));
    }

    #[test]
    fn test_parse_telemetry_scans_for_marker() {
        let pkt = Packet::new(build_telemetry_packet(9, "42:pong"));
        let fields = parse_telemetry(&pkt).unwrap();
        assert_eq!(fields.mid, TEXT_TLM_MID);
        assert_eq!(fields.sequence_id, Some(42));
        assert_eq!(fields.text, "pong");
    }

    #[test]
    fn test_parse_telemetry_colon_without_digits_skipped() {
        let pkt = Packet::new(build_telemetry_packet(2, "note: 7:ok"));
        let fields = parse_telemetry(&pkt).unwrap();
        // The first colon has no digit run before it; the scan continues to
        // the "7:" marker.
        assert_eq!(fields.sequence_id, Some(7));
        assert_eq!(fields.text, "ok");
    }

    #[test]
    fn test_parse_telemetry_invalid_utf8_hex_fallback() {
        let mut raw = build_telemetry_packet(1, "");
        // Overwrite the payload with bytes that are not valid UTF-8 and
        // contain no id marker.
        raw[crate::TELEMETRY_TEXT_OFFSET] = 0xFF;
        raw[crate::TELEMETRY_TEXT_OFFSET + 1] = 0xFE;
        let fields = parse_telemetry(&Packet::new(raw)).unwrap();
        assert_eq!(fields.sequence_id, None);
        assert!(fields.text.contains("fffe"));
    }

    #[test]
    fn test_parse_rejects_headerless_packet() {
        let pkt = Packet::new(vec![0x18, 0x82]);
        assert!(matches!(
            parse_command(&pkt),
            Err(PacketError::HeaderTooShort { actual: 2 })
        ));
        assert!(matches!(
            parse_telemetry(&pkt),
            Err(PacketError::HeaderTooShort { actual: 2 })
        ));
    }

    #[test]
    fn test_trailing_nul_padding_stripped() {
        let pkt = Packet::new(build_command_packet(1, 3, "7:abc"));
        let fields = parse_command(&pkt).unwrap();
        assert_eq!(fields.text, "abc");
        assert!(!fields.text.contains('\0'));
    }
}
