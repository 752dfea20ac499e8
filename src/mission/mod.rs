//! Autonomous mission execution
//!
//! This module handles:
//! - The mission state machine (connect, fix, arm, takeoff, route, land)
//! - Arrival detection against stored waypoints
//! - Own-position telemetry broadcasts while enroute

pub mod controller;
pub mod state;

pub use controller::{MissionConfig, MissionController};
pub use state::{has_arrived, MissionState};
