mod handler;
mod mission;
mod radio;
mod transport;
mod vehicle;
mod waypoint;

use handler::{run_inbound_consumer, InboundContext};
use mission::{MissionConfig, MissionController};
use radio::{RadioConfig, RadioLink};
use transport::{RadioTransport, SerialConfig, SerialTransport, UdpConfig, UdpTransport};
use vehicle::{FcConfig, FcConnectionType, MavVehicle};
use waypoint::{Waypoint, WaypointStore};

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let local_id = std::env::var("SKYLINK_ID").unwrap_or_else(|_| "1".into());
    let radio_config = RadioConfig {
        local_id: local_id.clone(),
        ..Default::default()
    };

    info!("Skylink agent starting: {}", local_id);

    // Serial XBee when a port is configured, UDP loop for bench work
    let transport: Arc<dyn RadioTransport> = match std::env::var("SKYLINK_SERIAL") {
        Ok(port) => {
            info!("  Radio: serial {}", port);
            Arc::new(SerialTransport::new(SerialConfig {
                port,
                ..Default::default()
            }))
        }
        Err(_) => {
            let config = UdpConfig::default();
            info!("  Radio: UDP {} -> {}", config.bind, config.peer);
            Arc::new(UdpTransport::new(config))
        }
    };

    let link = Arc::new(RadioLink::new(radio_config, transport));
    if let Err(e) = link.connect().await {
        error!("Radio link failed to open: {}", e);
        return;
    }

    let mission_config = MissionConfig {
        route: vec!["2".into(), "3".into()],
        ..Default::default()
    };

    // Pre-seed the route with fallback coordinates; radio waypoint
    // packets overwrite these as peers report in.
    let store = Arc::new(WaypointStore::new());
    store
        .add(
            "2",
            Waypoint {
                lat: 41.085855,
                lon: 29.044510,
                alt: mission_config.target_altitude_m,
                heading: 0.0,
            },
        )
        .await;
    store
        .add(
            "3",
            Waypoint {
                lat: 41.086210,
                lon: 29.045126,
                alt: mission_config.target_altitude_m,
                heading: 0.0,
            },
        )
        .await;
    info!("Waypoint store seeded with {} entries", store.len().await);

    // Inbound radio consumer
    let ctx = InboundContext {
        store: store.clone(),
        waypoint_altitude_m: mission_config.target_altitude_m,
    };
    tokio::spawn(run_inbound_consumer(link.clone(), ctx));

    // Flight controller bridge
    let fc_config = FcConfig {
        connection: FcConnectionType::Udp {
            address: std::env::var("SKYLINK_FC").unwrap_or_else(|_| "0.0.0.0:14540".into()),
        },
        ..Default::default()
    };
    let vehicle = Arc::new(MavVehicle::new(fc_config));
    info!("Flight controller bridge initialized");

    let controller = MissionController::new(mission_config, vehicle, store, link.clone());

    tokio::select! {
        terminal = controller.run() => {
            info!("Mission ended in state {}", terminal.name());
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Ctrl-C received, shutting down");
        }
    }

    link.disconnect().await;
    info!("Radio link closed");
}
