// Telemetry Tap Stage
// Receives flight-software telemetry, filters for the text-echo packet, and
// frames it for the downlink modulator. Other telemetry streams pass over
// this tap untouched.

use anyhow::Result;
use ccsds_packet::{PrimaryHeader, TEXT_TLM_MID};
use link_stages::{LOCALHOST, MODULATOR_DOWNLINK_PORT, RECV_BUFFER_LEN, TELEMETRY_TAP_PORT};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    link_stages::init_tracing("telemetry_tap=info");

    let socket = UdpSocket::bind(("0.0.0.0", TELEMETRY_TAP_PORT)).await?;
    info!(
        listen = TELEMETRY_TAP_PORT,
        forward = MODULATOR_DOWNLINK_PORT,
        "telemetry tap ready"
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
        let data = &buf[..len];

        let header = match PrimaryHeader::parse(data) {
            Ok(h) => h,
            Err(e) => {
                debug!(%e, "runt telemetry datagram");
                continue;
            }
        };
        if header.stream_id != TEXT_TLM_MID {
            continue;
        }

        let frame = frame_sync::encode(data);
        match socket
            .send_to(&frame, (LOCALHOST, MODULATOR_DOWNLINK_PORT))
            .await
        {
            Ok(_) => debug!(seq = header.sequence_count(), "telemetry framed"),
            Err(e) => warn!(%e, "forward to modulator failed"),
        }
    }
}
