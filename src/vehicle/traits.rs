//! Vehicle command seam
//!
//! The flight-control connection is an external collaborator: the mission
//! controller only ever talks to this trait, so tests can drive the state
//! machine with a scripted vehicle and the binary plugs in the MAVLink
//! bridge.

use anyhow::Result;
use async_trait::async_trait;

/// Last known vehicle position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehiclePosition {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Altitude above the takeoff point in meters
    pub relative_alt_m: f32,
    /// Heading in degrees
    pub heading_deg: f32,
}

/// Async command surface of the flight controller
#[async_trait]
pub trait VehicleCommands: Send + Sync {
    /// Establish the flight-control link. Failure is fatal to mission start.
    async fn connect(&self) -> Result<()>;

    /// Whether the vehicle has a valid global and home position estimate
    async fn has_position_fix(&self) -> bool;

    /// Home position altitude above mean sea level, once known
    async fn home_altitude_amsl(&self) -> Option<f32>;

    /// Arm the motors. Rejection surfaces as an error, not a retry.
    async fn arm(&self) -> Result<()>;

    /// Take off to the given altitude above the home position
    async fn takeoff(&self, altitude_m: f32) -> Result<()>;

    /// Fly to a position at the given altitude and heading
    async fn goto(&self, lat: f64, lon: f64, alt_m: f32, heading_deg: f32) -> Result<()>;

    /// Hold/loiter at the current position
    async fn hold(&self) -> Result<()>;

    /// Land at the current position
    async fn land(&self) -> Result<()>;

    /// Latest position report, if any has arrived yet
    async fn position(&self) -> Option<VehiclePosition>;

    /// Whether the vehicle currently reports armed
    async fn is_armed(&self) -> bool;
}
