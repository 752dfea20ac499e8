//! Consumer of the inbound queue
//!
//! Runs as its own task so no packet processing ever happens on the
//! transport's receive path. Waypoint mutations are applied regardless of
//! mission state; mission order/confirm packets are acknowledgment-only
//! hooks until a concrete contract is defined for them.

use crate::radio::{RadioLink, Received};
use crate::waypoint::{Waypoint, WaypointStore};
use skylink_shared::{Packet, PacketKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Context handed to the packet handlers
#[derive(Clone)]
pub struct InboundContext {
    pub store: Arc<WaypointStore>,
    /// Altitude assigned to waypoints added over the radio; the wire format
    /// carries no altitude, the mission's flying altitude applies.
    pub waypoint_altitude_m: f32,
}

/// Drain the inbound queue until the link goes down
pub async fn run_inbound_consumer(link: Arc<RadioLink>, ctx: InboundContext) {
    while link.is_connected() {
        match link.poll_received() {
            Some(Received::Packet { packet, source }) => {
                handle_packet(&ctx, &packet, source.as_deref()).await;
            }
            Some(Received::Malformed { error, source }) => {
                warn!(
                    "undecodable frame from {}: {}",
                    source.as_deref().unwrap_or("unknown"),
                    error
                );
            }
            None => sleep(Duration::from_millis(10)).await,
        }
    }
    debug!("inbound consumer stopped");
}

/// Dispatch one decoded packet
pub async fn handle_packet(ctx: &InboundContext, packet: &Packet, source: Option<&str>) {
    match &packet.kind {
        PacketKind::Gps => match packet.lat_lon() {
            Some((lat, lon)) => {
                info!(
                    "peer {} position: lat={:.6} lon={:.6}",
                    packet.sender, lat, lon
                );
            }
            None => warn!("GPS packet from {} missing x/y params", packet.sender),
        },

        PacketKind::Handshake => {
            info!("handshake from {}", packet.sender);
        }

        PacketKind::AddWaypoint => {
            handle_add_waypoint(ctx, packet).await;
        }

        PacketKind::RemoveWaypoint => {
            // Missing id is reported by the store and is a no-op
            ctx.store.remove(&packet.sender).await;
        }

        PacketKind::MissionOrder => {
            info!(
                "mission order received: id={} params={:?} (no action defined)",
                packet.sender, packet.params
            );
        }

        PacketKind::MissionConfirm => {
            info!(
                "mission confirm received from {}: mission={:?} (no action defined)",
                packet.sender,
                packet.params.get("id")
            );
        }

        PacketKind::Other(code) => {
            warn!(
                "unknown packet type {:?} from {} via {}",
                code,
                packet.sender,
                source.unwrap_or("unknown")
            );
        }
    }
}

/// `W` packets upsert a waypoint keyed by the sender id, with lat/lon from
/// the scaled x/y params and an optional heading
async fn handle_add_waypoint(ctx: &InboundContext, packet: &Packet) {
    let Some((lat, lon)) = packet.lat_lon() else {
        warn!(
            "add-waypoint packet from {} missing x/y params",
            packet.sender
        );
        return;
    };

    let heading = packet.param_f64("h").unwrap_or(0.0) as f32;

    ctx.store
        .add(
            packet.sender.clone(),
            Waypoint {
                lat,
                lon,
                alt: ctx.waypoint_altitude_m,
                heading,
            },
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylink_shared::scale_coord;

    fn test_ctx() -> InboundContext {
        InboundContext {
            store: Arc::new(WaypointStore::new()),
            waypoint_altitude_m: 20.0,
        }
    }

    #[tokio::test]
    async fn test_add_waypoint_packet_upserts_store() {
        let ctx = test_ctx();

        let packet = Packet::new(PacketKind::AddWaypoint, "3")
            .with_param("x", scale_coord(40.325757))
            .with_param("y", scale_coord(36.473615))
            .with_param("h", 90);
        handle_packet(&ctx, &packet, Some("ground")).await;

        let wp = ctx.store.read("3").await.expect("waypoint not stored");
        assert!((wp.lat - 40.325757).abs() < 1e-6);
        assert!((wp.lon - 36.473615).abs() < 1e-6);
        assert_eq!(wp.alt, 20.0);
        assert_eq!(wp.heading, 90.0);
    }

    #[tokio::test]
    async fn test_add_waypoint_without_heading_defaults_zero() {
        let ctx = test_ctx();

        let packet = Packet::new(PacketKind::AddWaypoint, "5")
            .with_param("x", scale_coord(47.39))
            .with_param("y", scale_coord(8.54));
        handle_packet(&ctx, &packet, None).await;

        assert_eq!(ctx.store.read("5").await.unwrap().heading, 0.0);
    }

    #[tokio::test]
    async fn test_add_waypoint_missing_coords_ignored() {
        let ctx = test_ctx();

        let packet = Packet::new(PacketKind::AddWaypoint, "3").with_param("x", 1);
        handle_packet(&ctx, &packet, None).await;

        assert!(ctx.store.read("3").await.is_none());
    }

    #[tokio::test]
    async fn test_remove_waypoint_packet() {
        let ctx = test_ctx();
        ctx.store
            .add(
                "2",
                Waypoint {
                    lat: 1.0,
                    lon: 2.0,
                    alt: 20.0,
                    heading: 0.0,
                },
            )
            .await;

        handle_packet(&ctx, &Packet::new(PacketKind::RemoveWaypoint, "2"), None).await;
        assert!(ctx.store.read("2").await.is_none());

        // Removing again must stay a no-op
        handle_packet(&ctx, &Packet::new(PacketKind::RemoveWaypoint, "2"), None).await;
    }

    #[tokio::test]
    async fn test_reserved_and_unknown_kinds_leave_store_alone() {
        let ctx = test_ctx();

        for packet in [
            Packet::new(PacketKind::MissionOrder, "7").with_param("task", 1),
            Packet::new(PacketKind::MissionConfirm, "7").with_param("id", 1),
            Packet::new(PacketKind::Other("Z9".into()), "7"),
            Packet::gps("7", 47.0, 8.0),
            Packet::new(PacketKind::Handshake, "7"),
        ] {
            handle_packet(&ctx, &packet, Some("peer")).await;
        }

        assert!(ctx.store.is_empty().await);
    }
}
