//! Pipeline Stage Library
//!
//! Shared plumbing for the four stage processes that make up the simulated
//! uplink/downlink chain:
//!
//! ```text
//! commanding GUI --50000--> command-uplink --8600--> modulator
//! demodulator    --8888---> frame-recovery --1234--> flight software
//! flight software --1235--> telemetry-tap  --8602--> modulator
//! demodulator    --8890---> telemetry-recovery --50001--> GUI
//! ```
//!
//! Each stage is an independent process with one blocking receive loop; the
//! UDP datagram boundary is the only synchronization point. The modulator
//! and demodulator are an external symbol codec consumed purely through
//! these port contracts.

use attack_channel::{apply, AttackMode, AttackOutcome};
use ccsds_packet::COMMAND_TEXT_OFFSET;
use rand::Rng;

pub mod config;

/// Commanding GUI to command-uplink.
pub const COMMAND_LISTEN_PORT: u16 = 50000;
/// Command-uplink to the uplink modulator.
pub const MODULATOR_UPLINK_PORT: u16 = 8600;
/// Uplink demodulator bit stream to frame-recovery.
pub const UPLINK_BITS_PORT: u16 = 8888;
/// Frame-recovery to the flight software's command ingest.
pub const FLIGHT_SOFTWARE_PORT: u16 = 1234;
/// Flight-software telemetry output to telemetry-tap.
pub const TELEMETRY_TAP_PORT: u16 = 1235;
/// Telemetry-tap to the downlink modulator.
pub const MODULATOR_DOWNLINK_PORT: u16 = 8602;
/// Downlink demodulator bit stream to telemetry-recovery.
pub const DOWNLINK_BITS_PORT: u16 = 8890;
/// Telemetry-recovery to the operator GUI.
pub const GUI_TELEMETRY_PORT: u16 = 50001;

/// All stages talk over loopback.
pub const LOCALHOST: &str = "127.0.0.1";

/// Datagram receive buffer size. Bit-stream datagrams are eight times the
/// byte length of the frame they carry.
pub const RECV_BUFFER_LEN: usize = 65536;

/// Run the channel attack over a command packet's application payload
/// (everything past the command headers) and splice the result back in.
/// `None` means the packet is dropped by the channel.
pub fn attack_command_packet<R: Rng + ?Sized>(
    packet: &[u8],
    mode: AttackMode,
    link_quality: f64,
    rng: &mut R,
) -> Option<Vec<u8>> {
    let split = packet.len().min(COMMAND_TEXT_OFFSET);
    match apply(&packet[split..], mode, link_quality, rng) {
        AttackOutcome::Drop => None,
        AttackOutcome::Deliver(payload) => {
            let mut out = packet[..split].to_vec();
            out.extend_from_slice(&payload);
            Some(out)
        }
    }
}

/// Initialize the stage's log subscriber. `default_filter` is used when
/// `RUST_LOG` is unset.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string()))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccsds_packet::{build_command_packet, parse_command, Packet};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_attack_splice_preserves_headers() {
        let packet = build_command_packet(3, 3, "11:payload under test");
        let mut rng = StdRng::seed_from_u64(1);
        let out = attack_command_packet(&packet, AttackMode::Noise, 0.2, &mut rng).unwrap();
        assert_eq!(out.len(), packet.len());
        assert_eq!(&out[..COMMAND_TEXT_OFFSET], &packet[..COMMAND_TEXT_OFFSET]);
        assert_ne!(out, packet);
    }

    #[test]
    fn test_attack_drop_suppresses_packet() {
        let packet = build_command_packet(3, 3, "11:gone");
        let mut rng = StdRng::seed_from_u64(1);
        assert!(attack_command_packet(&packet, AttackMode::Drop, 1.0, &mut rng).is_none());
    }

    #[test]
    fn test_clean_channel_round_trip() {
        // Uplink path with a lossless codec: frame, expand to bits, recover,
        // parse. Fields must survive unchanged.
        let packet = build_command_packet(12, 3, "64:hello world");
        let mut rng = StdRng::seed_from_u64(7);
        let sent = attack_command_packet(&packet, AttackMode::None, 1.0, &mut rng).unwrap();

        let bits = frame_sync::encode_to_bits(&sent);
        let recovered = frame_sync::recover(&bits).unwrap();
        let fields = parse_command(&recovered).unwrap();

        let original = parse_command(&Packet::new(packet)).unwrap();
        assert_eq!(fields, original);
    }
}
