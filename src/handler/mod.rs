//! Inbound packet handling
//!
//! This module handles:
//! - Draining the inbound queue off the transport's I/O path
//! - Applying waypoint add/remove packets to the store
//! - Surfacing malformed frames and unknown type codes in the logs

mod inbound;

pub use inbound::{handle_packet, run_inbound_consumer, InboundContext};
