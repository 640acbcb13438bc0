// Command Uplink Stage
// Receives command packets from the commanding GUI, applies the configured
// channel attack, logs the transmission, and forwards the framed packet to
// the uplink modulator.

use anyhow::Result;
use attack_channel::{link_quality, AttackMode, LinkParams};
use ccsds_packet::{parse_command, Packet};
use link_stages::{
    attack_command_packet, config, COMMAND_LISTEN_PORT, LOCALHOST, MODULATOR_UPLINK_PORT,
    RECV_BUFFER_LEN,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use telemetry_correlator::{RecordId, SentRecord, SentStore};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    link_stages::init_tracing("command_uplink=info");

    let sent_store = SentStore::open(config::sent_log_path())?;
    let mode_path = config::attack_mode_path();
    let params_path = config::link_params_path();

    let socket = UdpSocket::bind(("0.0.0.0", COMMAND_LISTEN_PORT)).await?;
    info!(
        listen = COMMAND_LISTEN_PORT,
        forward = MODULATOR_UPLINK_PORT,
        "command uplink ready"
    );

    let mut rng = StdRng::from_entropy();
    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                warn!(%e, "receive failed");
                continue;
            }
        };
        let data = &buf[..len];

        let fields = match parse_command(&Packet::new(data.to_vec())) {
            Ok(f) => f,
            Err(e) => {
                warn!(%e, %peer, "unparseable command packet");
                continue;
            }
        };

        // Both config values are polled per packet so operator edits take
        // effect on the next command.
        let mode = config::read_attack_mode(&mode_path).unwrap_or_else(|e| {
            warn!(%e, "attack mode unreadable, defaulting to none");
            AttackMode::None
        });
        let params = config::load_link_params(&params_path).unwrap_or_else(|e| {
            debug!(%e, "link parameters unreadable, using defaults");
            LinkParams::default()
        });
        let quality = link_quality(&params);

        // Every command is logged as sent, dropped ones included; a drop
        // later correlates as a lost record.
        let record = SentRecord::new(RecordId::parse(&fields.record_id()), &fields.text, mode);
        if let Err(e) = sent_store.append(&record) {
            warn!(%e, id = %record.id, "sent log append failed");
        }

        match attack_command_packet(data, mode, quality, &mut rng) {
            None => info!(id = %record.id, "packet dropped by channel"),
            Some(packet) => {
                let frame = frame_sync::encode(&packet);
                match socket.send_to(&frame, (LOCALHOST, MODULATOR_UPLINK_PORT)).await {
                    Ok(_) => debug!(id = %record.id, %mode, quality, "frame forwarded"),
                    Err(e) => warn!(%e, "forward to modulator failed"),
                }
            }
        }
    }
}
