//! TCP transport.
//!
//! Each item is one frame: a 4-byte big-endian length followed by the
//! MessagePack-encoded [`DataItem`].

use super::{Transport, TransportError};
use async_trait::async_trait;
use onefast_types::{DataItem, MAX_PAYLOAD_SIZE};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::debug;

/// A paired device reached over TCP.
#[derive(Debug)]
pub struct TcpTransport {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    peer: SocketAddr,
    connected: AtomicBool,
}

impl TcpTransport {
    /// Dial a peer, giving up after `timeout`.
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self, TransportError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::ConnectionFailed(format!("{}: {}", address, e)))?;
        Self::from_stream(stream)
    }

    /// Wait for the next peer on `listener`.
    pub async fn accept(listener: &TcpListener) -> Result<Self, TransportError> {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Self::from_stream(stream)
    }

    /// Wrap an established stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        let peer = stream
            .peer_addr()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        // Items are tiny and latency matters more than batching.
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        debug!(%peer, "tcp transport established");
        Ok(Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            peer,
            connected: AtomicBool::new(true),
        })
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn mark_closed(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, item: &DataItem) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let bytes = item
            .to_bytes()
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| TransportError::SendFailed("item too large".into()))?;

        let mut writer = self.writer.lock().await;
        let result: std::io::Result<()> = async {
            writer.write_all(&len.to_be_bytes()).await?;
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;

        result.map_err(|e| {
            self.mark_closed();
            TransportError::SendFailed(e.to_string())
        })
    }

    async fn recv(&self) -> Result<DataItem, TransportError> {
        let mut reader = self.reader.lock().await;

        let mut len_buf = [0u8; 4];
        if let Err(e) = reader.read_exact(&mut len_buf).await {
            self.mark_closed();
            return Err(match e.kind() {
                ErrorKind::UnexpectedEof => TransportError::ConnectionClosed,
                _ => TransportError::ReceiveFailed(e.to_string()),
            });
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_PAYLOAD_SIZE {
            // The stream is out of sync from here on.
            self.mark_closed();
            return Err(TransportError::ReceiveFailed(format!(
                "frame too large: {} > {}",
                len, MAX_PAYLOAD_SIZE
            )));
        }

        let mut buf = vec![0u8; len];
        if let Err(e) = reader.read_exact(&mut buf).await {
            self.mark_closed();
            return Err(TransportError::ReceiveFailed(e.to_string()));
        }

        DataItem::from_bytes(&buf).map_err(|e| TransportError::ReceiveFailed(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.mark_closed();
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected_pair() -> (TcpTransport, TcpTransport) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (client, server) = tokio::join!(
            TcpTransport::connect(&address, Duration::from_secs(5)),
            TcpTransport::accept(&listener)
        );
        (client.unwrap(), server.unwrap())
    }

    fn item(payload: Vec<u8>) -> DataItem {
        DataItem {
            path: "/fasting_state".into(),
            payload,
        }
    }

    #[tokio::test]
    async fn items_cross_the_socket() {
        let (client, server) = connected_pair().await;

        client.send(&item(vec![1, 2, 3])).await.unwrap();
        server.send(&item(vec![4])).await.unwrap();

        assert_eq!(server.recv().await.unwrap().payload, vec![1, 2, 3]);
        assert_eq!(client.recv().await.unwrap().payload, vec![4]);
    }

    #[tokio::test]
    async fn close_is_seen_as_connection_closed() {
        let (client, server) = connected_pair().await;
        client.close().await.unwrap();

        assert!(!client.is_connected());
        assert!(matches!(
            server.recv().await,
            Err(TransportError::ConnectionClosed)
        ));
        assert!(!server.is_connected());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let raw = tokio::spawn(async move {
            let mut stream = TcpStream::connect(address).await.unwrap();
            let len = (MAX_PAYLOAD_SIZE as u32 + 1).to_be_bytes();
            stream.write_all(&len).await.unwrap();
            stream
        });

        let server = TcpTransport::accept(&listener).await.unwrap();
        let _stream = raw.await.unwrap();
        assert!(matches!(
            server.recv().await,
            Err(TransportError::ReceiveFailed(_))
        ));
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TcpTransport::connect(&address, Duration::from_secs(5)).await;
        assert!(matches!(
            result,
            Err(TransportError::ConnectionFailed(_)) | Err(TransportError::Timeout)
        ));
    }
}
