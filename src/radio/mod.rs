//! Radio messaging layer
//!
//! This module handles:
//! - FIFO queues with TTL eviction for inbound and outbound traffic
//! - The fixed-cadence sender loop
//! - The decode-and-enqueue receive path
//! - The janitor that evicts stale queue entries

mod link;
mod queue;

pub use link::{Outbound, RadioConfig, RadioLink, Received};
pub use queue::PacketQueue;
