pub mod loopback;
pub mod serial;
pub mod traits;
pub mod udp;

pub use loopback::LoopbackTransport;
pub use serial::{SerialConfig, SerialTransport, DEFAULT_BAUD_RATE};
pub use traits::{RadioTransport, RawFrame};
pub use udp::{UdpConfig, UdpTransport};
