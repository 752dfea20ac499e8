//! Waypoint table owned by the mission

mod store;

pub use store::{Waypoint, WaypointStore};
