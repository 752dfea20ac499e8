//! UDP datagram transport for development and SITL testing
//!
//! One datagram carries exactly one packet payload, which matches the
//! discrete-frame contract of the real radio, so no extra framing is needed.
//! Addressing collapses to a single configured peer: the broadcast sentinel
//! and `None` both go there.

use crate::transport::traits::{RadioTransport, RawFrame};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace, warn};

/// UDP transport configuration
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Local bind address
    pub bind: String,
    /// Peer to deliver frames to
    pub peer: String,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:47800".into(),
            peer: "127.0.0.1:47801".into(),
        }
    }
}

/// Datagram-per-frame transport simulating the radio link
pub struct UdpTransport {
    config: UdpConfig,
    socket: Mutex<Option<Arc<UdpSocket>>>,
}

impl UdpTransport {
    pub fn new(config: UdpConfig) -> Self {
        Self {
            config,
            socket: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RadioTransport for UdpTransport {
    async fn open(&self) -> Result<mpsc::Receiver<RawFrame>> {
        let socket = UdpSocket::bind(&self.config.bind)
            .await
            .map_err(|e| anyhow!("cannot bind {}: {}", self.config.bind, e))?;
        let socket = Arc::new(socket);

        debug!(
            "udp radio bound on {}, peer {}",
            self.config.bind, self.config.peer
        );

        *self.socket.lock().await = Some(socket.clone());

        let (frame_tx, frame_rx) = mpsc::channel::<RawFrame>(64);
        tokio::spawn(read_loop(socket, frame_tx));

        Ok(frame_rx)
    }

    async fn send_frame(&self, payload: Bytes, destination: Option<&str>) -> Result<()> {
        if let Some(dest) = destination {
            trace!("udp transport mapping destination {} to peer", dest);
        }

        let guard = self.socket.lock().await;
        let socket = guard.as_ref().ok_or_else(|| anyhow!("udp link not open"))?;
        socket.send_to(&payload, &self.config.peer).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // The read loop holds its own handle and exits once the link drops
        // the frame receiver; this just refuses further sends.
        self.socket.lock().await.take();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}

async fn read_loop(socket: Arc<UdpSocket>, frame_tx: mpsc::Sender<RawFrame>) {
    let mut read_buf = vec![0u8; 2048];

    loop {
        match socket.recv_from(&mut read_buf).await {
            Ok((n, addr)) => {
                let frame = RawFrame {
                    payload: Bytes::copy_from_slice(&read_buf[..n]),
                    source: Some(addr.to_string()),
                };
                if frame_tx.send(frame).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("udp read error: {}", e);
                return;
            }
        }
    }
}
