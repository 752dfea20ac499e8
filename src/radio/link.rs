//! Radio link: queues, sender loop, receive path, janitor
//!
//! The transport's frame notifications do decode + enqueue only; everything
//! heavier happens in a separate consumer of the inbound queue. The sender
//! loop drains the outbound queue one packet per tick so the
//! bandwidth-limited radio is never burst-flooded.

use crate::radio::queue::PacketQueue;
use crate::transport::{RadioTransport, RawFrame};
use anyhow::Result;
use skylink_shared::codec::{self, DecodeError};
use skylink_shared::{radio, Packet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};
use tracing::{debug, info, trace, warn};

/// Radio link configuration
#[derive(Debug, Clone)]
pub struct RadioConfig {
    /// Identifier this vehicle stamps on outbound packets
    pub local_id: String,
    /// Fixed cadence of the sender loop (one packet per tick)
    pub send_interval: Duration,
    /// Maximum queue age before the janitor evicts an entry
    pub retention_window: Duration,
    /// Cadence of the janitor loop
    pub janitor_interval: Duration,
    /// Soft payload size limit; exceeding it warns but still transmits
    pub max_payload: usize,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            local_id: "1".into(),
            send_interval: Duration::from_millis(radio::SEND_INTERVAL_MS),
            retention_window: Duration::from_millis(radio::RETENTION_WINDOW_MS),
            janitor_interval: Duration::from_millis(radio::JANITOR_INTERVAL_MS),
            max_payload: radio::MAX_FRAME_PAYLOAD,
        }
    }
}

/// An inbound queue entry: a decoded packet, or the surfaced decode failure.
/// Malformed traffic is kept so the consumer can log it, never dropped quietly.
#[derive(Debug, Clone)]
pub enum Received {
    Packet {
        packet: Packet,
        source: Option<String>,
    },
    Malformed {
        error: DecodeError,
        source: Option<String>,
    },
}

/// An outbound queue entry awaiting its send tick
#[derive(Debug, Clone)]
pub struct Outbound {
    pub packet: Packet,
    pub destination: Option<String>,
}

/// Owns the queues and the background loops around one radio transport
pub struct RadioLink {
    config: RadioConfig,
    transport: Arc<dyn RadioTransport>,
    inbound: Arc<PacketQueue<Received>>,
    outbound: Arc<PacketQueue<Outbound>>,
    connected: Arc<AtomicBool>,
}

impl RadioLink {
    pub fn new(config: RadioConfig, transport: Arc<dyn RadioTransport>) -> Self {
        Self {
            config,
            transport,
            inbound: Arc::new(PacketQueue::new()),
            outbound: Arc::new(PacketQueue::new()),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open the transport and start the sender, ingest, and janitor loops.
    /// Open failure is fatal to mission start and surfaces to the caller.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            debug!("radio link already connected");
            return Ok(());
        }

        let frames = self.transport.open().await?;
        self.connected.store(true, Ordering::SeqCst);

        tokio::spawn(ingest_loop(
            frames,
            self.inbound.clone(),
            self.connected.clone(),
        ));
        tokio::spawn(send_loop(
            self.transport.clone(),
            self.outbound.clone(),
            self.connected.clone(),
            self.config.send_interval,
            self.config.max_payload,
        ));
        tokio::spawn(janitor_loop(
            self.inbound.clone(),
            self.outbound.clone(),
            self.connected.clone(),
            self.config.janitor_interval,
            self.config.retention_window,
        ));

        info!("radio link up via {}", self.transport.name());
        Ok(())
    }

    /// Drop the connected flag and close the transport; every loop observes
    /// the flag and exits on its next iteration.
    pub async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.transport.close().await {
            warn!("error closing {} transport: {}", self.transport.name(), e);
        }
        info!("radio link down");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Queue a packet for transmission. Never blocks beyond the queue mutex;
    /// the actual send happens on the sender loop's next free tick.
    pub fn send(&self, packet: Packet, destination: Option<String>) {
        self.outbound.push(Outbound {
            packet,
            destination,
        });
    }

    /// Non-blocking poll of the inbound queue
    pub fn poll_received(&self) -> Option<Received> {
        self.inbound.pop()
    }

    pub fn local_id(&self) -> &str {
        &self.config.local_id
    }
}

/// Receive path: decode each raw frame and enqueue the result, nothing more.
/// State mutation happens in the inbound queue's consumer, never here.
async fn ingest_loop(
    mut frames: mpsc::Receiver<RawFrame>,
    inbound: Arc<PacketQueue<Received>>,
    connected: Arc<AtomicBool>,
) {
    loop {
        if !connected.load(Ordering::SeqCst) {
            break;
        }

        tokio::select! {
            maybe_frame = frames.recv() => {
                let Some(frame) = maybe_frame else {
                    debug!("transport frame channel closed");
                    break;
                };

                let received = match codec::decode(&frame.payload) {
                    Ok(packet) => {
                        trace!(
                            "received {} packet from {}",
                            packet.kind.code(),
                            frame.source.as_deref().unwrap_or("unknown")
                        );
                        Received::Packet {
                            packet,
                            source: frame.source,
                        }
                    }
                    Err(error) => Received::Malformed {
                        error,
                        source: frame.source,
                    },
                };
                inbound.push(received);
            }
            // Re-check the connected flag even when the link is quiet
            _ = sleep(Duration::from_millis(200)) => {}
        }
    }
    debug!("ingest loop stopped");
}

/// Sender loop: at most one outbound packet per tick. Transport failures are
/// logged and the packet is dropped; telemetry is interval-sensitive, so a
/// stale retry would be worse than the gap.
async fn send_loop(
    transport: Arc<dyn RadioTransport>,
    outbound: Arc<PacketQueue<Outbound>>,
    connected: Arc<AtomicBool>,
    send_interval: Duration,
    max_payload: usize,
) {
    let mut ticker = interval(send_interval);

    loop {
        ticker.tick().await;
        if !connected.load(Ordering::SeqCst) {
            break;
        }

        let Some(entry) = outbound.pop() else {
            continue;
        };

        match codec::encode_with_limit(&entry.packet, max_payload) {
            Ok(payload) => {
                if let Err(e) = transport
                    .send_frame(payload, entry.destination.as_deref())
                    .await
                {
                    warn!(
                        "send failed, dropping {} packet: {}",
                        entry.packet.kind.code(),
                        e
                    );
                }
            }
            Err(e) => {
                warn!("encode failed, dropping packet: {}", e);
            }
        }
    }
    debug!("sender loop stopped");
}

/// Janitor loop: evicts entries past the retention window from both queues
async fn janitor_loop(
    inbound: Arc<PacketQueue<Received>>,
    outbound: Arc<PacketQueue<Outbound>>,
    connected: Arc<AtomicBool>,
    janitor_interval: Duration,
    retention_window: Duration,
) {
    let mut ticker = interval(janitor_interval);

    loop {
        ticker.tick().await;
        if !connected.load(Ordering::SeqCst) {
            break;
        }

        let now = Instant::now();
        let evicted_in = inbound.evict_expired(now, retention_window);
        let evicted_out = outbound.evict_expired(now, retention_window);

        if evicted_in + evicted_out > 0 {
            debug!(
                "janitor evicted {} inbound / {} outbound stale packets",
                evicted_in, evicted_out
            );
        }
    }
    debug!("janitor loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;
    use bytes::Bytes;
    use skylink_shared::PacketKind;

    fn fast_config() -> RadioConfig {
        RadioConfig {
            local_id: "1".into(),
            send_interval: Duration::from_millis(5),
            retention_window: Duration::from_millis(10_000),
            janitor_interval: Duration::from_millis(5),
            max_payload: radio::MAX_FRAME_PAYLOAD,
        }
    }

    #[tokio::test]
    async fn test_sender_drains_in_order() {
        let transport = Arc::new(LoopbackTransport::new());
        let link = RadioLink::new(fast_config(), transport.clone());
        link.connect().await.expect("connect failed");

        for sender in ["A", "B", "C"] {
            link.send(
                Packet::new(PacketKind::Handshake, sender),
                Some(radio::BROADCAST_ADDR.to_string()),
            );
        }

        // Three ticks at 5ms each, plus slack
        sleep(Duration::from_millis(100)).await;

        let sent = transport.sent_frames().await;
        assert_eq!(sent.len(), 3);

        let senders: Vec<String> = sent
            .iter()
            .map(|frame| codec::decode(&frame.payload).expect("bad frame").sender)
            .collect();
        assert_eq!(senders, ["A", "B", "C"]);
        assert_eq!(sent[0].destination.as_deref(), Some(radio::BROADCAST_ADDR));

        link.disconnect().await;
    }

    #[tokio::test]
    async fn test_receive_path_decodes_and_enqueues() {
        let transport = Arc::new(LoopbackTransport::new());
        let link = RadioLink::new(fast_config(), transport.clone());
        link.connect().await.expect("connect failed");

        let good = codec::encode(&Packet::gps("2", 47.39, 8.54)).unwrap();
        transport.inject(good, Some("peer-2".into())).await.unwrap();
        transport
            .inject(Bytes::from_static(b"not json"), Some("peer-3".into()))
            .await
            .unwrap();

        sleep(Duration::from_millis(50)).await;

        match link.poll_received().expect("no first entry") {
            Received::Packet { packet, source } => {
                assert_eq!(packet.kind, PacketKind::Gps);
                assert_eq!(packet.sender, "2");
                assert_eq!(source.as_deref(), Some("peer-2"));
            }
            other => panic!("expected packet, got {:?}", other),
        }

        match link.poll_received().expect("no second entry") {
            Received::Malformed { error, source } => {
                assert!(!error.raw_hex().is_empty());
                assert_eq!(source.as_deref(), Some("peer-3"));
            }
            other => panic!("expected malformed entry, got {:?}", other),
        }

        link.disconnect().await;
    }

    #[tokio::test]
    async fn test_janitor_evicts_stale_inbound() {
        let transport = Arc::new(LoopbackTransport::new());
        let mut config = fast_config();
        config.retention_window = Duration::from_millis(20);
        let link = RadioLink::new(config, transport.clone());
        link.connect().await.expect("connect failed");

        let payload = codec::encode(&Packet::new(PacketKind::Handshake, "9")).unwrap();
        transport.inject(payload, None).await.unwrap();

        // Past the retention window plus several janitor ticks
        sleep(Duration::from_millis(100)).await;

        assert!(link.poll_received().is_none());
        link.disconnect().await;
    }

    #[tokio::test]
    async fn test_disconnect_stops_sender() {
        let transport = Arc::new(LoopbackTransport::new());
        let link = RadioLink::new(fast_config(), transport.clone());
        link.connect().await.expect("connect failed");
        link.disconnect().await;

        link.send(Packet::new(PacketKind::Handshake, "X"), None);
        sleep(Duration::from_millis(50)).await;

        assert!(transport.sent_frames().await.is_empty());
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_connect_twice_is_noop() {
        let transport = Arc::new(LoopbackTransport::new());
        let link = RadioLink::new(fast_config(), transport.clone());
        link.connect().await.expect("first connect failed");
        link.connect().await.expect("second connect failed");
        assert!(link.is_connected());
        link.disconnect().await;
    }
}
