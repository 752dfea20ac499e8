//! Waypoint store shared between the packet consumer and the mission loop

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A target position for the vehicle to reach
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Altitude in meters (absolute or relative, fixed per mission)
    pub alt: f32,
    /// Heading in degrees
    pub heading: f32,
}

/// The one mapping from waypoint id to record.
///
/// Instantiated once per mission and shared by handle; the inbound packet
/// consumer writes, the mission controller reads. All access goes through
/// the lock, and `add` on an existing id is last-writer-wins.
#[derive(Debug, Default)]
pub struct WaypointStore {
    points: RwLock<HashMap<String, Waypoint>>,
}

impl WaypointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert; overwrites any existing waypoint with the same id
    pub async fn add(&self, id: impl Into<String>, waypoint: Waypoint) {
        let id = id.into();
        debug!(
            "waypoint {} set: lat={:.6} lon={:.6} alt={:.1}m heading={:.0}",
            id, waypoint.lat, waypoint.lon, waypoint.alt, waypoint.heading
        );
        self.points.write().await.insert(id, waypoint);
    }

    /// Delete a waypoint. A missing id is a logged no-op, not an error.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.points.write().await.remove(id).is_some();
        if removed {
            debug!("waypoint {} removed", id);
        } else {
            warn!("waypoint {} not found, nothing removed", id);
        }
        removed
    }

    /// Read a waypoint by id. `None` is a normal outcome (stale references),
    /// not an exceptional condition.
    pub async fn read(&self, id: &str) -> Option<Waypoint> {
        self.points.read().await.get(id).copied()
    }

    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }
}
