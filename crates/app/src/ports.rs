//! Port definitions: traits that transports implement.
//!
//! Ports are the boundaries between the synchronizer and the network.
//! They are defined here (in `app`) so that both the engine and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod transport;

pub use transport::{DeviceClient, DeviceConnection, DeviceEvent, DeviceTransport};
