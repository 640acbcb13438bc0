// Frame Recovery Stage
// Receives the demodulated uplink bit stream, locks onto the preamble,
// reconciles the recovered packet against its header length, and forwards
// it to the flight software.

use anyhow::Result;
use link_stages::{FLIGHT_SOFTWARE_PORT, LOCALHOST, RECV_BUFFER_LEN, UPLINK_BITS_PORT};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    link_stages::init_tracing("frame_recovery=info");

    let socket = UdpSocket::bind(("0.0.0.0", UPLINK_BITS_PORT)).await?;
    info!(
        listen = UPLINK_BITS_PORT,
        forward = FLIGHT_SOFTWARE_PORT,
        "frame recovery ready"
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
        debug!(bytes = packet.len(), "packet recovered");

        if let Err(e) = socket
            .send_to(packet.as_bytes(), (LOCALHOST, FLIGHT_SOFTWARE_PORT))
            .await
        {
            warn!(%e, "forward to flight software failed");
        }
    }
}
