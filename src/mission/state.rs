//! Mission states and transition predicates

use crate::vehicle::VehiclePosition;
use crate::waypoint::Waypoint;
use std::time::Instant;

/// The single mission state machine for one vehicle.
///
/// Mutated only by the mission controller's own run loop.
#[derive(Debug, Clone, PartialEq)]
pub enum MissionState {
    /// Establishing the flight-control link
    Connecting,
    /// Waiting for a valid global + home position estimate
    AwaitingPositionFix,
    /// Arm command issued, waiting for acknowledgment
    Arming,
    /// Takeoff issued, climbing to the target altitude
    TakingOff,
    /// Flying toward a waypoint
    Enroute { waypoint: String },
    /// Loitering at a waypoint until the deadline
    Holding { waypoint: String, until: Instant },
    /// Land command issued, waiting for disarm
    Landing,
    /// Mission finished, vehicle disarmed
    Complete,
    /// Unrecoverable command failure
    Failed { reason: String },
}

impl MissionState {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            MissionState::Connecting => "CONNECTING",
            MissionState::AwaitingPositionFix => "AWAITING_POSITION_FIX",
            MissionState::Arming => "ARMING",
            MissionState::TakingOff => "TAKING_OFF",
            MissionState::Enroute { .. } => "ENROUTE",
            MissionState::Holding { .. } => "HOLDING",
            MissionState::Landing => "LANDING",
            MissionState::Complete => "COMPLETE",
            MissionState::Failed { .. } => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionState::Complete | MissionState::Failed { .. })
    }
}

/// Coarse arrival test: both coordinate deltas strictly under epsilon.
///
/// This is a proximity heuristic in raw degrees, not a geodesic distance;
/// at mid latitudes the default epsilon of 1e-4 degrees is roughly 10 m
/// north-south and somewhat less east-west.
pub fn has_arrived(position: &VehiclePosition, target: &Waypoint, epsilon_deg: f64) -> bool {
    (position.lat - target.lat).abs() < epsilon_deg
        && (position.lon - target.lon).abs() < epsilon_deg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(lat: f64, lon: f64) -> VehiclePosition {
        VehiclePosition {
            lat,
            lon,
            relative_alt_m: 20.0,
            heading_deg: 0.0,
        }
    }

    fn target(lat: f64, lon: f64) -> Waypoint {
        Waypoint {
            lat,
            lon,
            alt: 20.0,
            heading: 0.0,
        }
    }

    #[test]
    fn test_arrival_inside_epsilon() {
        let wp = target(47.397606, 8.543060);
        assert!(has_arrived(&pos(47.397610, 8.543065), &wp, 1e-4));
    }

    #[test]
    fn test_arrival_requires_both_axes() {
        let wp = target(47.397606, 8.543060);

        // Latitude close, longitude still off
        assert!(!has_arrived(&pos(47.397606, 8.544060), &wp, 1e-4));
        // Longitude close, latitude still off
        assert!(!has_arrived(&pos(47.398606, 8.543060), &wp, 1e-4));
    }

    #[test]
    fn test_arrival_boundary_is_strict() {
        let wp = target(47.0, 8.0);
        assert!(!has_arrived(&pos(47.0 + 1e-4, 8.0), &wp, 1e-4));
        assert!(has_arrived(&pos(47.0 + 0.99e-4, 8.0), &wp, 1e-4));
    }

    #[test]
    fn test_terminal_states() {
        assert!(MissionState::Complete.is_terminal());
        assert!(MissionState::Failed { reason: "x".into() }.is_terminal());
        assert!(!MissionState::Connecting.is_terminal());
        assert!(!MissionState::Enroute { waypoint: "1".into() }.is_terminal());
    }
}
