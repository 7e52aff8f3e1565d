use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::framing;

/// The read half of a connection. Owned by whatever task drives the
/// per-connection packet loop; has no knowledge of framing.
pub struct ConnectionReader {
    socket: OwnedReadHalf,
}

impl ConnectionReader {
    /// Reads whatever is available into a fresh buffer; `Ok(0)` means the
    /// peer closed the connection.
    pub async fn read_chunk(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; 4096];
        let n = self.socket.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }
}

enum WriterMsg {
    Data(Bytes),
    Close,
}

/// A cheap, cloneable, non-blocking handle for sending framed packets. Send
/// enqueues onto an unbounded channel drained by a dedicated writer task, so
/// callers (including tick/timeout code running on a different thread than
/// the reader) never block on socket I/O.
#[derive(Clone)]
pub struct ConnectionWriter {
    tx: mpsc::UnboundedSender<WriterMsg>,
}

impl ConnectionWriter {
    pub fn send_packet(&self, id: i32, payload: &[u8]) {
        let framed = framing::serialize_packet(id, payload).freeze();
        let _ = self.tx.send(WriterMsg::Data(framed));
    }

    /// Idempotent: extra calls after the first are silently ignored once the
    /// channel is gone.
    pub fn disconnect(&self) {
        let _ = self.tx.send(WriterMsg::Close);
    }
}

/// Bundles the split halves of an accepted socket plus the spawned writer
/// task that drains `ConnectionWriter` sends.
pub struct Connection {
    pub reader: ConnectionReader,
    pub writer: ConnectionWriter,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(write_half, rx));
        Self {
            reader: ConnectionReader { socket: read_half },
            writer: ConnectionWriter { tx },
        }
    }
}

async fn run_writer(mut socket: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<WriterMsg>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            WriterMsg::Data(bytes) => {
                if let Err(e) = socket.write_all(&bytes).await {
                    debug!("connection write failed: {e}");
                    break;
                }
            }
            WriterMsg::Close => break,
        }
    }
    let _ = socket.shutdown().await;
}
