use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::{debug, info};

use voxeld_protocol::connection::Connection;
use voxeld_protocol::framing::{PacketReader, ReaderEvent};

use crate::global::GlobalState;
use crate::session::Session;

/// Drives one accepted socket for its entire lifetime: registers a `Session`,
/// pumps bytes through a `PacketReader`, and dispatches decoded frames until
/// the peer disconnects or a handler rejects a packet.
pub async fn handle_connection(stream: TcpStream, global: Arc<GlobalState>) {
    let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| "unknown".into());
    if let Err(e) = stream.set_nodelay(true) {
        debug!("failed to set TCP_NODELAY for {peer}: {e}");
    }

    let mut conn = Connection::new(stream);
    let id = global.next_connection_id();
    let session = Session::new(id, global.clone(), conn.writer.clone());
    global.register_session(session.clone());

    info!("connection {} from {peer}", id.0);

    let mut reader = PacketReader::new();
    'pump: loop {
        let chunk = match conn.reader.read_chunk().await {
            Ok(chunk) if chunk.is_empty() => break 'pump,
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("read error on connection {}: {e}", id.0);
                break 'pump;
            }
        };

        for event in reader.on_bytes_received(&chunk) {
            match event {
                ReaderEvent::Frame { id: packet_id, payload } => {
                    if session.handle_frame(packet_id, &payload).is_err() {
                        break 'pump;
                    }
                }
                ReaderEvent::Error(e) => {
                    debug!("framing error on connection {}: {e}", id.0);
                    session.disconnect("malformed packet");
                    break 'pump;
                }
            }
        }
    }

    session.cleanup();
    conn.writer.disconnect();
    info!("connection {} closed", id.0);
}
