//! CCSDS-Style Packet Library
//!
//! Primary header parsing and application field extraction for the SatLink
//! uplink/downlink simulator. The wire format follows the cFE software bus
//! convention: a 6-byte big-endian primary header, an optional secondary
//! header, and a NUL-padded ASCII application field carrying `"<id>:<text>"`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod fields;

pub use fields::{parse_command, parse_telemetry, ParsedFields};

/// Length of the primary header in bytes.
pub const PRIMARY_HEADER_LEN: usize = 6;

/// Byte offset of the command code in a command-class packet.
pub const COMMAND_CODE_OFFSET: usize = 6;

/// Byte offset of the application text field in a command-class packet
/// (primary header + 2-byte secondary command header).
pub const COMMAND_TEXT_OFFSET: usize = 8;

/// Byte offset of the `text_len` field in a telemetry-class packet
/// (primary header + 6-byte telemetry secondary header).
pub const TELEMETRY_TEXT_LEN_OFFSET: usize = 12;

/// Byte offset of the application text field in a telemetry-class packet.
pub const TELEMETRY_TEXT_OFFSET: usize = 14;

/// Maximum length of the application text field.
pub const TEXT_FIELD_LEN: usize = 128;

/// Message id of the SEND_TEXT command packet.
pub const SEND_TEXT_MID: u16 = 0x1882;

/// Message id of the text-echo telemetry packet.
pub const TEXT_TLM_MID: u16 = 0x08A9;

/// Sentinel value of the length field meaning "unknown/zero payload".
pub const LENGTH_FIELD_UNKNOWN: u16 = 0xFFFF;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet too short for primary header: {actual} bytes, need {PRIMARY_HEADER_LEN}")]
    HeaderTooShort { actual: usize },
}

pub type Result<T> = std::result::Result<T, PacketError>;

/// The 6-byte big-endian primary header.
///
/// `length_field` declares `payload_length - 1`; the sentinel `0xFFFF` means
/// the payload length is unknown and is treated as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryHeader {
    pub stream_id: u16,
    pub sequence_control: u16,
    pub length_field: u16,
}

impl PrimaryHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PRIMARY_HEADER_LEN {
            return Err(PacketError::HeaderTooShort {
                actual: bytes.len(),
            });
        }
        Ok(Self {
            stream_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            sequence_control: u16::from_be_bytes([bytes[2], bytes[3]]),
            length_field: u16::from_be_bytes([bytes[4], bytes[5]]),
        })
    }

    pub fn to_bytes(&self) -> [u8; PRIMARY_HEADER_LEN] {
        let mut out = [0u8; PRIMARY_HEADER_LEN];
        out[0..2].copy_from_slice(&self.stream_id.to_be_bytes());
        out[2..4].copy_from_slice(&self.sequence_control.to_be_bytes());
        out[4..6].copy_from_slice(&self.length_field.to_be_bytes());
        out
    }

    /// Application process identifier, low 11 bits of the stream id.
    pub fn apid(&self) -> u16 {
        self.stream_id & 0x07FF
    }

    /// Transport-level sequence count, low 14 bits of the sequence control.
    pub fn sequence_count(&self) -> u16 {
        self.sequence_control & 0x3FFF
    }

    /// Payload length the header declares: `length_field + 1`, with the
    /// `0xFFFF` sentinel mapped to zero.
    pub fn expected_payload_len(&self) -> usize {
        if self.length_field == LENGTH_FIELD_UNKNOWN {
            0
        } else {
            self.length_field as usize + 1
        }
    }
}

/// A transient recovered packet: the raw byte sequence, header included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet(Vec<u8>);

impl Packet {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn header(&self) -> Result<PrimaryHeader> {
        PrimaryHeader::parse(&self.0)
    }
}

impl From<Vec<u8>> for Packet {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Build a SEND_TEXT command packet carrying `"<id>:<text>"`, NUL-padded to
/// the fixed 128-byte field. Used by the simulator's self-tests and demo
/// senders; the real commanding GUI produces the identical layout.
pub fn build_command_packet(sequence_count: u16, command_code: u8, app_text: &str) -> Vec<u8> {
    let payload_len = 2 + TEXT_FIELD_LEN; // secondary header + text field
    let header = PrimaryHeader {
        stream_id: SEND_TEXT_MID,
        sequence_control: 0xC000 | (sequence_count & 0x3FFF),
        length_field: (payload_len - 1) as u16,
    };
    let mut pkt = Vec::with_capacity(PRIMARY_HEADER_LEN + payload_len);
    pkt.extend_from_slice(&header.to_bytes());
    pkt.push(command_code);
    pkt.push(0x00); // checksum, unused in the simulator
    let text = app_text.as_bytes();
    let take = text.len().min(TEXT_FIELD_LEN);
    pkt.extend_from_slice(&text[..take]);
    pkt.resize(PRIMARY_HEADER_LEN + payload_len, 0x00);
    pkt
}

/// Build a text-echo telemetry packet as the flight software emits it.
pub fn build_telemetry_packet(sequence_count: u16, app_text: &str) -> Vec<u8> {
    let payload_len = TELEMETRY_TEXT_OFFSET - PRIMARY_HEADER_LEN + TEXT_FIELD_LEN;
    let header = PrimaryHeader {
        stream_id: TEXT_TLM_MID,
        sequence_control: 0xC000 | (sequence_count & 0x3FFF),
        length_field: (payload_len - 1) as u16,
    };
    let text = app_text.as_bytes();
    let take = text.len().min(TEXT_FIELD_LEN);
    let mut pkt = Vec::with_capacity(PRIMARY_HEADER_LEN + payload_len);
    pkt.extend_from_slice(&header.to_bytes());
    pkt.extend_from_slice(&[0u8; TELEMETRY_TEXT_LEN_OFFSET - PRIMARY_HEADER_LEN]);
    pkt.extend_from_slice(&(take as u16).to_be_bytes());
    pkt.extend_from_slice(&text[..take]);
    pkt.resize(PRIMARY_HEADER_LEN + payload_len, 0x00);
    pkt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = PrimaryHeader {
            stream_id: 0x1882,
            sequence_control: 0xC001,
            length_field: 0x0081,
        };
        let parsed = PrimaryHeader::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.apid(), 0x0082);
        assert_eq!(parsed.sequence_count(), 1);
        assert_eq!(parsed.expected_payload_len(), 0x82);
    }

    #[test]
    fn test_header_too_short() {
        let err = PrimaryHeader::parse(&[0x18, 0x82, 0xC0]).unwrap_err();
        assert_eq!(err, PacketError::HeaderTooShort { actual: 3 });
    }

    #[test]
    fn test_length_field_sentinel_means_zero() {
        let header = PrimaryHeader {
            stream_id: 0x08A9,
            sequence_control: 0,
            length_field: LENGTH_FIELD_UNKNOWN,
        };
        assert_eq!(header.expected_payload_len(), 0);
    }

    #[test]
    fn test_build_command_packet_layout() {
        let pkt = build_command_packet(7, 3, "7:hello");
        assert_eq!(pkt.len(), PRIMARY_HEADER_LEN + 2 + TEXT_FIELD_LEN);

        let header = PrimaryHeader::parse(&pkt).unwrap();
        assert_eq!(header.stream_id, SEND_TEXT_MID);
        assert_eq!(header.sequence_count(), 7);
        assert_eq!(
            PRIMARY_HEADER_LEN + header.expected_payload_len(),
            pkt.len()
        );

        assert_eq!(pkt[COMMAND_CODE_OFFSET], 3);
        assert_eq!(&pkt[COMMAND_TEXT_OFFSET..COMMAND_TEXT_OFFSET + 7], b"7:hello");
        assert_eq!(pkt[COMMAND_TEXT_OFFSET + 7], 0x00);
    }

    #[test]
    fn test_build_telemetry_packet_layout() {
        let pkt = build_telemetry_packet(3, "7:hello");
        let header = PrimaryHeader::parse(&pkt).unwrap();
        assert_eq!(header.stream_id, TEXT_TLM_MID);
        assert_eq!(
            PRIMARY_HEADER_LEN + header.expected_payload_len(),
            pkt.len()
        );

        let text_len = u16::from_be_bytes([
            pkt[TELEMETRY_TEXT_LEN_OFFSET],
            pkt[TELEMETRY_TEXT_LEN_OFFSET + 1],
        ]);
        assert_eq!(text_len, 7);
        assert_eq!(
            &pkt[TELEMETRY_TEXT_OFFSET..TELEMETRY_TEXT_OFFSET + 7],
            b"7:hello"
        );
    }
}
