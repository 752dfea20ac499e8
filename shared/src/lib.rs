//! Skylink Shared Protocol Types
//!
//! This crate provides the packet types and codec shared between the vehicle
//! agent and the ground-side tools that speak the Skylink radio protocol.

pub mod codec;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Radio link parameters shared across the system
pub mod radio {
    /// Destination sentinel meaning "all receivers"
    pub const BROADCAST_ADDR: &str = "000000000000FFFF";

    /// Conservative maximum payload the radio can carry in one frame.
    /// Exceeding it is a policy violation (logged), not a codec error.
    pub const MAX_FRAME_PAYLOAD: usize = 70;

    /// Interval between outbound sends in milliseconds
    pub const SEND_INTERVAL_MS: u64 = 1000;

    /// Maximum age a queued packet may reach before the janitor evicts it
    pub const RETENTION_WINDOW_MS: u64 = 10_000;

    /// Interval between janitor eviction passes
    pub const JANITOR_INTERVAL_MS: u64 = 1000;

    /// Coordinates travel as integer degrees scaled by this factor
    pub const COORD_SCALE: f64 = 1_000_000.0;
}

/// Scale a coordinate in degrees to its integer wire representation
pub fn scale_coord(degrees: f64) -> i64 {
    (degrees * radio::COORD_SCALE).round() as i64
}

/// Recover a coordinate in degrees from its integer wire representation
pub fn unscale_coord(raw: i64) -> f64 {
    raw as f64 / radio::COORD_SCALE
}

/// Packet kind, carried on the wire as a short type code.
///
/// Unknown codes are preserved in `Other` so they can be logged downstream;
/// they are never rejected at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PacketKind {
    /// "G" - GPS telemetry (params `x`/`y` = lat/lon scaled by 10^6)
    Gps,
    /// "H" - handshake
    Handshake,
    /// "W" - add/overwrite a waypoint
    AddWaypoint,
    /// "w" - remove a waypoint
    RemoveWaypoint,
    /// "O" - mission order (reserved extension point)
    MissionOrder,
    /// "MC" - mission confirm (reserved extension point)
    MissionConfirm,
    /// Any other type code
    Other(String),
}

impl PacketKind {
    /// The wire type code for this kind
    pub fn code(&self) -> &str {
        match self {
            PacketKind::Gps => "G",
            PacketKind::Handshake => "H",
            PacketKind::AddWaypoint => "W",
            PacketKind::RemoveWaypoint => "w",
            PacketKind::MissionOrder => "O",
            PacketKind::MissionConfirm => "MC",
            PacketKind::Other(code) => code,
        }
    }
}

impl From<String> for PacketKind {
    fn from(code: String) -> Self {
        match code.as_str() {
            "G" => PacketKind::Gps,
            "H" => PacketKind::Handshake,
            "W" => PacketKind::AddWaypoint,
            "w" => PacketKind::RemoveWaypoint,
            "O" => PacketKind::MissionOrder,
            "MC" => PacketKind::MissionConfirm,
            _ => PacketKind::Other(code),
        }
    }
}

impl From<PacketKind> for String {
    fn from(kind: PacketKind) -> Self {
        kind.code().to_string()
    }
}

/// A typed, sender-tagged message exchanged over the radio link.
///
/// Wire form is compact JSON with fixed short keys:
/// `{"t": <type code>, "s": <sender id>, "p": {<key>: <scalar>, ...}}`
/// where `"p"` is omitted when there are no parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    #[serde(rename = "t")]
    pub kind: PacketKind,
    #[serde(rename = "s")]
    pub sender: String,
    #[serde(rename = "p", default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl Packet {
    /// Create a packet with no parameters
    pub fn new(kind: PacketKind, sender: impl Into<String>) -> Self {
        Self {
            kind,
            sender: sender.into(),
            params: Map::new(),
        }
    }

    /// Create a GPS telemetry packet from a position in degrees
    pub fn gps(sender: impl Into<String>, lat: f64, lon: f64) -> Self {
        let mut packet = Self::new(PacketKind::Gps, sender);
        packet.params.insert("x".into(), scale_coord(lat).into());
        packet.params.insert("y".into(), scale_coord(lon).into());
        packet
    }

    /// Add a scalar parameter, builder style
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Read an integer parameter
    pub fn param_i64(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(Value::as_i64)
    }

    /// Read a float parameter (integers coerce)
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(Value::as_f64)
    }

    /// Decode the scaled `x`/`y` coordinate pair, if both are present
    pub fn lat_lon(&self) -> Option<(f64, f64)> {
        let lat = self.param_i64("x")?;
        let lon = self.param_i64("y")?;
        Some((unscale_coord(lat), unscale_coord(lon)))
    }
}
