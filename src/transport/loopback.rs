//! In-memory transport for exercising the link layer without hardware
//!
//! Captures every sent frame and lets callers inject inbound ones. Used by
//! the tests that drive the dispatch loops end to end.

use crate::transport::traits::{RadioTransport, RawFrame};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

/// A frame captured by [`LoopbackTransport::send_frame`]
#[derive(Debug, Clone)]
pub struct SentFrame {
    pub payload: Bytes,
    pub destination: Option<String>,
}

/// Transport that loops frames through memory
#[derive(Default)]
pub struct LoopbackTransport {
    sent: Mutex<Vec<SentFrame>>,
    inbound_tx: Mutex<Option<mpsc::Sender<RawFrame>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames sent so far, in send order
    pub async fn sent_frames(&self) -> Vec<SentFrame> {
        self.sent.lock().await.clone()
    }

    /// Deliver a frame as if it arrived over the air
    pub async fn inject(&self, payload: Bytes, source: Option<String>) -> Result<()> {
        let guard = self.inbound_tx.lock().await;
        let tx = guard.as_ref().ok_or_else(|| anyhow!("loopback not open"))?;
        tx.send(RawFrame { payload, source })
            .await
            .map_err(|_| anyhow!("loopback receiver dropped"))
    }
}

#[async_trait]
impl RadioTransport for LoopbackTransport {
    async fn open(&self) -> Result<mpsc::Receiver<RawFrame>> {
        let (tx, rx) = mpsc::channel::<RawFrame>(64);
        *self.inbound_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send_frame(&self, payload: Bytes, destination: Option<&str>) -> Result<()> {
        self.sent.lock().await.push(SentFrame {
            payload,
            destination: destination.map(str::to_string),
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inbound_tx.lock().await.take();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}
