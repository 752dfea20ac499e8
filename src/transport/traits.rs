//! Transport trait abstraction for pluggable radio backends

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// A raw frame delivered by the radio, with the source address when the
/// backend knows it (API-mode radios do, transparent serial links do not).
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub payload: Bytes,
    pub source: Option<String>,
}

/// A byte-oriented radio link.
///
/// The physical "frame received" notification is surfaced as an mpsc channel
/// returned from [`RadioTransport::open`]: the backend's I/O task pushes each
/// frame and the link layer drains them. Nothing heavier than decode-and-
/// enqueue may run on the backend's I/O path.
#[async_trait]
pub trait RadioTransport: Send + Sync {
    /// Open the physical link and return the inbound frame channel.
    /// Failure here is fatal to mission start.
    async fn open(&self) -> Result<mpsc::Receiver<RawFrame>>;

    /// Send one raw frame. `destination` is an opaque radio address
    /// (the broadcast sentinel for "all receivers"); backends without
    /// per-frame addressing ignore it.
    async fn send_frame(&self, payload: Bytes, destination: Option<&str>) -> Result<()>;

    /// Close the link. Loops observing the connected flag exit afterwards.
    async fn close(&self) -> Result<()>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
