//! Serial transport for a radio modem in transparent mode
//!
//! Transparent (AT) mode gives us a raw byte pipe with no per-frame
//! addressing, so packets are length-prefix framed on the wire and the
//! destination address is ignored.

use crate::transport::traits::{RadioTransport, RawFrame};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use skylink_shared::codec::{encode_frame, FrameDecoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, trace, warn};

/// Default baud rate for the radio modem
pub const DEFAULT_BAUD_RATE: u32 = 57600;

/// Serial port configuration
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial device path (e.g. "/dev/ttyUSB0")
    pub port: String,
    /// Baud rate
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud: DEFAULT_BAUD_RATE,
        }
    }
}

/// Radio modem attached over a serial port
pub struct SerialTransport {
    config: SerialConfig,
    writer: Mutex<Option<WriteHalf<SerialStream>>>,
}

impl SerialTransport {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            writer: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RadioTransport for SerialTransport {
    async fn open(&self) -> Result<mpsc::Receiver<RawFrame>> {
        let stream = tokio_serial::new(&self.config.port, self.config.baud)
            .open_native_async()
            .map_err(|e| anyhow!("cannot open serial port {}: {}", self.config.port, e))?;

        debug!(
            "serial radio open on {} at {} baud",
            self.config.port, self.config.baud
        );

        let (reader, writer) = tokio::io::split(stream);
        *self.writer.lock().await = Some(writer);

        let (frame_tx, frame_rx) = mpsc::channel::<RawFrame>(64);
        tokio::spawn(read_loop(reader, frame_tx));

        Ok(frame_rx)
    }

    async fn send_frame(&self, payload: Bytes, destination: Option<&str>) -> Result<()> {
        if let Some(dest) = destination {
            // Transparent mode has no per-frame addressing
            trace!("serial transport ignoring destination address {}", dest);
        }

        let framed = encode_frame(&payload)?;

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| anyhow!("serial link not open"))?;
        writer.write_all(&framed).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "serial"
    }
}

/// Reads the serial byte stream, reassembles frames, and pushes them to the
/// link layer. Exits when the port dies or the link drops its receiver.
async fn read_loop(mut reader: ReadHalf<SerialStream>, frame_tx: mpsc::Sender<RawFrame>) {
    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 1024];

    loop {
        match reader.read(&mut read_buf).await {
            Ok(0) => {
                warn!("serial port closed");
                break;
            }
            Ok(n) => {
                decoder.extend(&read_buf[..n]);

                loop {
                    match decoder.next_frame() {
                        Ok(Some(payload)) => {
                            let frame = RawFrame {
                                payload,
                                source: None,
                            };
                            if frame_tx.send(frame).await.is_err() {
                                return; // link went away
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            // Length prefix out of sync; the stream is
                            // unrecoverable from here.
                            error!("serial framing lost sync: {}", e);
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("serial read error: {}", e);
                break;
            }
        }
    }
}
