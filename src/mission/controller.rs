//! Mission controller
//!
//! Drives a single vehicle through a fixed waypoint route:
//! connect, wait for a position fix, arm, take off, then visit each
//! route entry in order (fly, hold, advance), and finally land and
//! wait for disarm. Command failures are terminal; a missing waypoint
//! is skipped with a warning.
//!
//! While enroute the controller broadcasts the vehicle's own position
//! over the radio link at a fixed cadence.

use super::state::{has_arrived, MissionState};
use crate::radio::RadioLink;
use crate::vehicle::VehicleCommands;
use crate::waypoint::WaypointStore;
use skylink_shared::radio::BROADCAST_ADDR;
use skylink_shared::Packet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Fraction of the target takeoff altitude that counts as "airborne".
const TAKEOFF_COMPLETION: f32 = 0.95;

#[derive(Debug, Clone)]
pub struct MissionConfig {
    /// Waypoint ids to visit, in order
    pub route: Vec<String>,
    /// Takeoff altitude and waypoint altitude offset above home, meters
    pub target_altitude_m: f32,
    /// Arrival threshold per coordinate axis, degrees
    pub arrival_epsilon_deg: f64,
    /// Loiter time at each waypoint
    pub hold_duration: Duration,
    /// Vehicle state polling cadence
    pub poll_interval: Duration,
    /// Own-position broadcast cadence while enroute
    pub telemetry_interval: Duration,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            route: Vec::new(),
            target_altitude_m: 10.0,
            arrival_epsilon_deg: 1e-4,
            hold_duration: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            telemetry_interval: Duration::from_secs(1),
        }
    }
}

pub struct MissionController {
    config: MissionConfig,
    vehicle: Arc<dyn VehicleCommands>,
    store: Arc<WaypointStore>,
    link: Arc<RadioLink>,
    state: Arc<RwLock<MissionState>>,
}

impl MissionController {
    pub fn new(
        config: MissionConfig,
        vehicle: Arc<dyn VehicleCommands>,
        store: Arc<WaypointStore>,
        link: Arc<RadioLink>,
    ) -> Self {
        Self {
            config,
            vehicle,
            store,
            link,
            state: Arc::new(RwLock::new(MissionState::Connecting)),
        }
    }

    /// Current mission state
    pub async fn state(&self) -> MissionState {
        self.state.read().await.clone()
    }

    async fn set_state(&self, next: MissionState) {
        let mut state = self.state.write().await;
        if *state != next {
            info!("Mission state: {} -> {}", state.name(), next.name());
            *state = next;
        }
    }

    async fn fail(&self, reason: String) -> MissionState {
        error!("Mission failed: {}", reason);
        let state = MissionState::Failed { reason };
        self.set_state(state.clone()).await;
        state
    }

    /// Run the mission to completion. Returns the terminal state.
    pub async fn run(&self) -> MissionState {
        self.set_state(MissionState::Connecting).await;
        if let Err(e) = self.vehicle.connect().await {
            return self.fail(format!("flight controller connect failed: {}", e)).await;
        }

        self.set_state(MissionState::AwaitingPositionFix).await;
        while !self.vehicle.has_position_fix().await {
            sleep(self.config.poll_interval).await;
        }
        let home_alt_amsl = self.vehicle.home_altitude_amsl().await;
        match home_alt_amsl {
            Some(alt) => info!("Position fix acquired, home altitude {:.1} m AMSL", alt),
            None => warn!("Position fix acquired but home altitude unknown, flying relative altitudes"),
        }

        self.set_state(MissionState::Arming).await;
        if let Err(e) = self.vehicle.arm().await {
            return self.fail(format!("arm rejected: {}", e)).await;
        }

        self.set_state(MissionState::TakingOff).await;
        if let Err(e) = self.vehicle.takeoff(self.config.target_altitude_m).await {
            return self.fail(format!("takeoff rejected: {}", e)).await;
        }
        let takeoff_threshold = self.config.target_altitude_m * TAKEOFF_COMPLETION;
        loop {
            if let Some(pos) = self.vehicle.position().await {
                if pos.relative_alt_m >= takeoff_threshold {
                    info!("Takeoff complete at {:.1} m", pos.relative_alt_m);
                    break;
                }
            }
            sleep(self.config.poll_interval).await;
        }

        for id in self.config.route.clone() {
            let Some(waypoint) = self.store.read(&id).await else {
                warn!("Waypoint {} not in store, skipping", id);
                continue;
            };

            // Stored altitudes are relative to home; the flight controller
            // wants AMSL when we know where home is.
            let goto_alt = match home_alt_amsl {
                Some(home) => home + waypoint.alt,
                None => waypoint.alt,
            };

            self.set_state(MissionState::Enroute {
                waypoint: id.clone(),
            })
            .await;
            info!(
                "Flying to waypoint {} ({:.6}, {:.6}) at {:.1} m",
                id, waypoint.lat, waypoint.lon, goto_alt
            );
            if let Err(e) = self
                .vehicle
                .goto(waypoint.lat, waypoint.lon, goto_alt, waypoint.heading)
                .await
            {
                return self.fail(format!("goto waypoint {} rejected: {}", id, e)).await;
            }

            let mut last_telemetry: Option<Instant> = None;
            loop {
                if let Some(pos) = self.vehicle.position().await {
                    let due = last_telemetry
                        .map(|t| t.elapsed() >= self.config.telemetry_interval)
                        .unwrap_or(true);
                    if due {
                        self.link.send(
                            Packet::gps(self.link.local_id(), pos.lat, pos.lon),
                            Some(BROADCAST_ADDR.to_string()),
                        );
                        last_telemetry = Some(Instant::now());
                    }
                    if has_arrived(&pos, &waypoint, self.config.arrival_epsilon_deg) {
                        info!("Arrived at waypoint {}", id);
                        break;
                    }
                }
                sleep(self.config.poll_interval).await;
            }

            let until = Instant::now() + self.config.hold_duration;
            self.set_state(MissionState::Holding {
                waypoint: id.clone(),
                until,
            })
            .await;
            if let Err(e) = self.vehicle.hold().await {
                return self.fail(format!("hold at waypoint {} rejected: {}", id, e)).await;
            }
            tokio::time::sleep_until(until.into()).await;
        }

        self.set_state(MissionState::Landing).await;
        if let Err(e) = self.vehicle.land().await {
            return self.fail(format!("land rejected: {}", e)).await;
        }
        while self.vehicle.is_armed().await {
            sleep(self.config.poll_interval).await;
        }

        self.set_state(MissionState::Complete).await;
        info!("Mission complete");
        MissionState::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::RadioConfig;
    use crate::transport::LoopbackTransport;
    use crate::vehicle::VehiclePosition;
    use crate::waypoint::Waypoint;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use skylink_shared::{codec, PacketKind};
    use std::sync::Mutex;

    /// Scripted vehicle: commands succeed instantly and teleport the
    /// reported position so the controller's polls observe completion.
    struct MockVehicle {
        position: Mutex<VehiclePosition>,
        armed: Mutex<bool>,
        reject_arm: bool,
        calls: Mutex<Vec<String>>,
    }

    impl MockVehicle {
        fn new() -> Self {
            Self {
                position: Mutex::new(VehiclePosition {
                    lat: 47.0,
                    lon: 8.0,
                    relative_alt_m: 0.0,
                    heading_deg: 0.0,
                }),
                armed: Mutex::new(false),
                reject_arm: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VehicleCommands for MockVehicle {
        async fn connect(&self) -> Result<()> {
            self.record("connect");
            Ok(())
        }

        async fn has_position_fix(&self) -> bool {
            true
        }

        async fn home_altitude_amsl(&self) -> Option<f32> {
            Some(500.0)
        }

        async fn arm(&self) -> Result<()> {
            self.record("arm");
            if self.reject_arm {
                bail!("arming denied by autopilot");
            }
            *self.armed.lock().unwrap() = true;
            Ok(())
        }

        async fn takeoff(&self, altitude_m: f32) -> Result<()> {
            self.record(format!("takeoff {}", altitude_m));
            self.position.lock().unwrap().relative_alt_m = altitude_m;
            Ok(())
        }

        async fn goto(&self, lat: f64, lon: f64, _alt_m: f32, _heading_deg: f32) -> Result<()> {
            self.record(format!("goto {:.6} {:.6}", lat, lon));
            let mut pos = self.position.lock().unwrap();
            pos.lat = lat;
            pos.lon = lon;
            Ok(())
        }

        async fn hold(&self) -> Result<()> {
            self.record("hold");
            Ok(())
        }

        async fn land(&self) -> Result<()> {
            self.record("land");
            *self.armed.lock().unwrap() = false;
            Ok(())
        }

        async fn position(&self) -> Option<VehiclePosition> {
            Some(*self.position.lock().unwrap())
        }

        async fn is_armed(&self) -> bool {
            *self.armed.lock().unwrap()
        }
    }

    fn fast_mission_config(route: Vec<&str>) -> MissionConfig {
        MissionConfig {
            route: route.into_iter().map(String::from).collect(),
            target_altitude_m: 10.0,
            arrival_epsilon_deg: 1e-4,
            hold_duration: Duration::from_millis(10),
            poll_interval: Duration::from_millis(2),
            telemetry_interval: Duration::from_millis(2),
        }
    }

    async fn connected_link(transport: Arc<LoopbackTransport>) -> Arc<RadioLink> {
        let config = RadioConfig {
            local_id: "1".to_string(),
            send_interval: Duration::from_millis(2),
            retention_window: Duration::from_secs(10),
            janitor_interval: Duration::from_millis(50),
            ..RadioConfig::default()
        };
        let link = Arc::new(RadioLink::new(config, transport));
        link.connect().await.unwrap();
        link
    }

    #[tokio::test]
    async fn test_mission_runs_route_to_completion() {
        let vehicle = Arc::new(MockVehicle::new());
        let store = Arc::new(WaypointStore::new());
        store
            .add(
                "2",
                Waypoint {
                    lat: 47.1,
                    lon: 8.1,
                    alt: 10.0,
                    heading: 0.0,
                },
            )
            .await;
        store
            .add(
                "3",
                Waypoint {
                    lat: 47.2,
                    lon: 8.2,
                    alt: 10.0,
                    heading: 90.0,
                },
            )
            .await;

        let transport = Arc::new(LoopbackTransport::new());
        let link = connected_link(transport.clone()).await;
        let controller = MissionController::new(
            fast_mission_config(vec!["2", "3"]),
            vehicle.clone(),
            store,
            link.clone(),
        );

        let terminal = controller.run().await;
        assert_eq!(terminal, MissionState::Complete);
        assert!(!vehicle.is_armed().await);

        let calls = vehicle.calls();
        assert_eq!(
            calls,
            vec![
                "connect",
                "arm",
                "takeoff 10",
                "goto 47.100000 8.100000",
                "hold",
                "goto 47.200000 8.200000",
                "hold",
                "land",
            ]
        );

        link.disconnect().await;
    }

    #[tokio::test]
    async fn test_mission_broadcasts_position_while_enroute() {
        let vehicle = Arc::new(MockVehicle::new());
        let store = Arc::new(WaypointStore::new());
        store
            .add(
                "2",
                Waypoint {
                    lat: 47.1,
                    lon: 8.1,
                    alt: 10.0,
                    heading: 0.0,
                },
            )
            .await;

        let transport = Arc::new(LoopbackTransport::new());
        let link = connected_link(transport.clone()).await;
        let controller = MissionController::new(
            fast_mission_config(vec!["2"]),
            vehicle,
            store,
            link.clone(),
        );

        assert_eq!(controller.run().await, MissionState::Complete);

        // Give the sender loop a tick to drain the outbound queue
        sleep(Duration::from_millis(20)).await;
        let sent = transport.sent_frames().await;
        let gps: Vec<_> = sent
            .iter()
            .filter_map(|f| codec::decode(&f.payload).ok())
            .filter(|p| p.kind == PacketKind::Gps)
            .collect();
        assert!(!gps.is_empty());
        assert_eq!(gps[0].sender, "1");
        assert_eq!(sent[0].destination.as_deref(), Some(BROADCAST_ADDR));

        link.disconnect().await;
    }

    #[tokio::test]
    async fn test_mission_fails_when_arm_rejected() {
        let mut vehicle = MockVehicle::new();
        vehicle.reject_arm = true;
        let vehicle = Arc::new(vehicle);

        let transport = Arc::new(LoopbackTransport::new());
        let link = connected_link(transport).await;
        let controller = MissionController::new(
            fast_mission_config(vec![]),
            vehicle.clone(),
            Arc::new(WaypointStore::new()),
            link.clone(),
        );

        let terminal = controller.run().await;
        match terminal {
            MissionState::Failed { reason } => assert!(reason.contains("arm")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!vehicle.calls().contains(&"takeoff 10".to_string()));

        link.disconnect().await;
    }

    #[tokio::test]
    async fn test_mission_skips_missing_waypoint() {
        let vehicle = Arc::new(MockVehicle::new());
        let store = Arc::new(WaypointStore::new());
        store
            .add(
                "2",
                Waypoint {
                    lat: 47.1,
                    lon: 8.1,
                    alt: 10.0,
                    heading: 0.0,
                },
            )
            .await;

        let transport = Arc::new(LoopbackTransport::new());
        let link = connected_link(transport).await;
        let controller = MissionController::new(
            fast_mission_config(vec!["ghost", "2"]),
            vehicle.clone(),
            store,
            link.clone(),
        );

        assert_eq!(controller.run().await, MissionState::Complete);
        let gotos: Vec<_> = vehicle
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("goto"))
            .collect();
        assert_eq!(gotos, vec!["goto 47.100000 8.100000"]);

        link.disconnect().await;
    }
}
