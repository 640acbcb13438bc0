// Telemetry Recovery Stage
// Receives the demodulated downlink bit stream, recovers and parses the
// telemetry packet, logs the received payload for correlation, and forwards
// the text body to the operator GUI.

use anyhow::Result;
use ccsds_packet::parse_telemetry;
use link_stages::{config, DOWNLINK_BITS_PORT, GUI_TELEMETRY_PORT, LOCALHOST, RECV_BUFFER_LEN};
use telemetry_correlator::{RecvRecord, RecvStore};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    link_stages::init_tracing("telemetry_recovery=info");

    let recv_store = RecvStore::open(config::recv_log_path())?;

    let socket = UdpSocket::bind(("0.0.0.0", DOWNLINK_BITS_PORT)).await?;
    info!(
        listen = DOWNLINK_BITS_PORT,
        forward = GUI_TELEMETRY_PORT,
        "telemetry recovery ready"
    );

    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    loop {
        let (len, _) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                warn!(%e, "receive failed");
                continue;
            }
        };

        let packet = match frame_sync::recover(&buf[..len]) {
            Ok(p) => p,
            Err(e) => {
                warn!(%e, bits = len, "frame recovery failed");
                continue;
            }
        };

        let fields = match parse_telemetry(&packet) {
            Ok(f) => f,
            Err(e) => {
                warn!(%e, "telemetry parse failed");
                continue;
            }
        };

        // Only payloads with a recovered numeric id can be correlated back
        // to a sent record.
        match fields.sequence_id {
            Some(id) => {
                let record = RecvRecord::new(id.into(), &fields.text);
                if let Err(e) = recv_store.append(&record) {
                    warn!(%e, id, "recv log append failed");
                }
            }
            None => debug!(text = %fields.text, "telemetry without id, not logged"),
        }

        if let Err(e) = socket
            .send_to(fields.text.as_bytes(), (LOCALHOST, GUI_TELEMETRY_PORT))
            .await
        {
            warn!(%e, "forward to GUI failed");
        }
    }
}
