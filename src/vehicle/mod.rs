//! Flight controller bridge
//!
//! The mission controller sees only the [`VehicleCommands`] trait; the
//! MAVLink implementation talks to ArduPilot/PX4 over serial, UDP, or TCP.

mod mavlink;
mod traits;

pub use mavlink::{FcConfig, FcConnectionType, FlightMode, MavVehicle};
pub use traits::{VehicleCommands, VehiclePosition};
