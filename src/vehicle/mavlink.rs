//! MAVLink implementation of the vehicle command seam
//!
//! Bridges to an ArduPilot/PX4 flight controller over serial, UDP, or TCP.
//! A background task owns the connection and keeps a small telemetry cache
//! current; commands go out as COMMAND_LONG / MISSION_ITEM_INT messages.

use super::traits::{VehicleCommands, VehiclePosition};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mavlink::ardupilotmega::{
    MavCmd, MavFrame, MavMessage, COMMAND_LONG_DATA, MISSION_ITEM_INT_DATA,
};
use mavlink::MavHeader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Connection type for the flight controller
#[derive(Debug, Clone)]
pub enum FcConnectionType {
    /// Serial port (e.g. "/dev/ttyACM0")
    Serial { port: String, baud: u32 },
    /// UDP listen address (e.g. "0.0.0.0:14540")
    Udp { address: String },
    /// TCP address (e.g. "127.0.0.1:5760")
    Tcp { address: String },
}

impl Default for FcConnectionType {
    fn default() -> Self {
        // SITL default for development
        Self::Udp {
            address: "0.0.0.0:14540".into(),
        }
    }
}

/// Flight controller connection configuration
#[derive(Debug, Clone)]
pub struct FcConfig {
    pub connection: FcConnectionType,
    /// System ID for this companion computer
    pub system_id: u8,
    /// Component ID for this companion computer
    pub component_id: u8,
    /// Target system ID (the autopilot)
    pub target_system: u8,
    /// Target component ID
    pub target_component: u8,
    /// How long `connect` waits for the link before failing mission start
    pub connect_timeout: Duration,
}

impl Default for FcConfig {
    fn default() -> Self {
        Self {
            connection: FcConnectionType::default(),
            system_id: 255,      // Companion computer
            component_id: 190,   // MAV_COMP_ID_ONBOARD_COMPUTER
            target_system: 1,    // Autopilot
            target_component: 1, // MAV_COMP_ID_AUTOPILOT1
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// ArduPilot Copter flight modes this mission uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FlightMode {
    Guided = 4,
    Loiter = 5,
}

/// Telemetry cache fed by the connection task
#[derive(Default)]
struct TelemetryCache {
    position: RwLock<Option<VehiclePosition>>,
    armed: RwLock<bool>,
    gps_fix: RwLock<bool>,
    home_alt_amsl: RwLock<Option<f32>>,
}

/// MAVLink-backed vehicle
pub struct MavVehicle {
    config: FcConfig,
    outbound_tx: mpsc::Sender<MavMessage>,
    cache: Arc<TelemetryCache>,
    connected: Arc<AtomicBool>,
}

impl MavVehicle {
    /// Create the vehicle and start its connection task
    pub fn new(config: FcConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<MavMessage>(100);
        let cache = Arc::new(TelemetryCache::default());
        let connected = Arc::new(AtomicBool::new(false));

        tokio::spawn(connection_loop(
            config.clone(),
            outbound_rx,
            cache.clone(),
            connected.clone(),
        ));

        Self {
            config,
            outbound_tx,
            cache,
            connected,
        }
    }

    async fn send(&self, msg: MavMessage) -> Result<()> {
        self.outbound_tx
            .send(msg)
            .await
            .map_err(|_| anyhow!("flight controller connection closed"))
    }

    fn command_long(&self, command: MavCmd, params: [f32; 7]) -> MavMessage {
        MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            target_system: self.config.target_system,
            target_component: self.config.target_component,
            command,
            confirmation: 0,
            param1: params[0],
            param2: params[1],
            param3: params[2],
            param4: params[3],
            param5: params[4],
            param6: params[5],
            param7: params[6],
        })
    }

    async fn set_mode(&self, mode: FlightMode) -> Result<()> {
        debug!("setting flight mode {:?}", mode);
        // param1 = MAV_MODE_FLAG_CUSTOM_MODE_ENABLED
        self.send(self.command_long(
            MavCmd::MAV_CMD_DO_SET_MODE,
            [1.0, mode as u32 as f32, 0.0, 0.0, 0.0, 0.0, 0.0],
        ))
        .await
    }
}

#[async_trait]
impl VehicleCommands for MavVehicle {
    async fn connect(&self) -> Result<()> {
        let deadline = self.config.connect_timeout;
        let connected = self.connected.clone();

        timeout(deadline, async move {
            while !connected.load(Ordering::SeqCst) {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await
        .map_err(|_| anyhow!("flight controller did not come up within {:?}", deadline))
    }

    async fn has_position_fix(&self) -> bool {
        *self.cache.gps_fix.read().await
            && self.cache.position.read().await.is_some()
            && self.cache.home_alt_amsl.read().await.is_some()
    }

    async fn home_altitude_amsl(&self) -> Option<f32> {
        *self.cache.home_alt_amsl.read().await
    }

    async fn arm(&self) -> Result<()> {
        info!("sending ARM command");
        self.set_mode(FlightMode::Guided).await?;
        self.send(self.command_long(
            MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ))
        .await
    }

    async fn takeoff(&self, altitude_m: f32) -> Result<()> {
        info!("sending TAKEOFF to {}m", altitude_m);
        self.send(self.command_long(
            MavCmd::MAV_CMD_NAV_TAKEOFF,
            // Yaw/lat/lon NAN = hold current
            [0.0, 0.0, 0.0, f32::NAN, f32::NAN, f32::NAN, altitude_m],
        ))
        .await
    }

    async fn goto(&self, lat: f64, lon: f64, alt_m: f32, heading_deg: f32) -> Result<()> {
        info!(
            "sending GOTO lat={:.6} lon={:.6} alt={}m heading={}",
            lat, lon, alt_m, heading_deg
        );

        self.send(MavMessage::MISSION_ITEM_INT(MISSION_ITEM_INT_DATA {
            target_system: self.config.target_system,
            target_component: self.config.target_component,
            seq: 0,
            frame: MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
            command: MavCmd::MAV_CMD_NAV_WAYPOINT,
            current: 2, // Guided-mode waypoint
            autocontinue: 0,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: heading_deg,
            x: (lat * 1e7) as i32,
            y: (lon * 1e7) as i32,
            z: alt_m,
        }))
        .await
    }

    async fn hold(&self) -> Result<()> {
        info!("entering LOITER");
        self.set_mode(FlightMode::Loiter).await
    }

    async fn land(&self) -> Result<()> {
        info!("sending LAND command");
        self.send(self.command_long(
            MavCmd::MAV_CMD_NAV_LAND,
            [0.0, 0.0, 0.0, f32::NAN, f32::NAN, f32::NAN, 0.0],
        ))
        .await
    }

    async fn position(&self) -> Option<VehiclePosition> {
        *self.cache.position.read().await
    }

    async fn is_armed(&self) -> bool {
        *self.cache.armed.read().await
    }
}

/// Owns the MAVLink connection, reconnecting with a fixed backoff
async fn connection_loop(
    config: FcConfig,
    mut outbound_rx: mpsc::Receiver<MavMessage>,
    cache: Arc<TelemetryCache>,
    connected: Arc<AtomicBool>,
) {
    let conn_str = match &config.connection {
        FcConnectionType::Serial { port, baud } => format!("serial:{}:{}", port, baud),
        FcConnectionType::Udp { address } => format!("udpin:{}", address),
        FcConnectionType::Tcp { address } => format!("tcpin:{}", address),
    };

    loop {
        debug!("connecting to flight controller via {}", conn_str);

        match mavlink::connect::<MavMessage>(&conn_str) {
            Ok(conn) => {
                info!("flight controller connected");
                connected.store(true, Ordering::SeqCst);

                if let Err(e) =
                    handle_connection(conn.as_ref(), &config, &mut outbound_rx, &cache).await
                {
                    warn!("flight controller link lost: {}", e);
                }

                connected.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                warn!("flight controller connect failed: {}", e);
            }
        }

        sleep(Duration::from_secs(2)).await;
    }
}

async fn handle_connection(
    conn: &(dyn mavlink::MavConnection<MavMessage> + Send + Sync),
    config: &FcConfig,
    outbound_rx: &mut mpsc::Receiver<MavMessage>,
    cache: &TelemetryCache,
) -> Result<()> {
    let header = MavHeader {
        system_id: config.system_id,
        component_id: config.component_id,
        sequence: 0,
    };

    loop {
        tokio::select! {
            // Forward outbound commands
            Some(msg) = outbound_rx.recv() => {
                conn.send(&header, &msg)?;
            }

            // Poll for incoming telemetry. On transports that leave the
            // socket blocking, recv can hold this worker until the next
            // message; an autopilot link streams at 1Hz+ so the stall is
            // bounded by the telemetry cadence.
            _ = sleep(Duration::from_millis(10)) => {
                match conn.recv() {
                    Ok((_header, msg)) => {
                        process_message(&msg, cache).await;
                    }
                    Err(mavlink::error::MessageReadError::Io(ref e))
                        if e.kind() == std::io::ErrorKind::WouldBlock => {
                        // No data available
                    }
                    Err(e) => {
                        return Err(anyhow!("read error: {}", e));
                    }
                }
            }
        }
    }
}

/// Fold one incoming message into the telemetry cache
async fn process_message(msg: &MavMessage, cache: &TelemetryCache) {
    match msg {
        MavMessage::GLOBAL_POSITION_INT(pos) => {
            *cache.position.write().await = Some(VehiclePosition {
                lat: pos.lat as f64 / 1e7,
                lon: pos.lon as f64 / 1e7,
                relative_alt_m: pos.relative_alt as f32 / 1000.0, // mm to m
                heading_deg: pos.hdg as f32 / 100.0,              // cdeg to deg
            });
        }

        MavMessage::GPS_RAW_INT(gps) => {
            // 3D fix or better
            *cache.gps_fix.write().await = gps.fix_type as u8 >= 3;
        }

        MavMessage::HOME_POSITION(home) => {
            *cache.home_alt_amsl.write().await = Some(home.altitude as f32 / 1000.0);
        }

        MavMessage::HEARTBEAT(hb) => {
            // MAV_MODE_FLAG_SAFETY_ARMED
            *cache.armed.write().await = (hb.base_mode.bits() & 0x80) != 0;
        }

        _ => {}
    }
}
