//! Transport port: discovery and per-device control of network switches.
//!
//! A transport bridges a concrete protocol (UPnP/SOAP, a simulator, …)
//! into the synchronizer. Discovery is best-effort and broadcast based;
//! every per-device call is asynchronous and may fail with a
//! [`TransportError`].

use std::future::Future;

use tokio::sync::mpsc;
use tokio_stream::Stream;

use threeway_domain::device::DeviceDescriptor;
use threeway_domain::error::TransportError;
use threeway_domain::state::BinaryState;

/// Notification pushed by a device over its event subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The device reports a new on/off state.
    BinaryState(BinaryState),
    /// A dimmer reports a new brightness percentage.
    Brightness(u8),
    /// The subscription or device reported an error.
    Error(TransportError),
}

/// An open connection to one device: a control handle plus its
/// notification channel.
///
/// Events for a device arrive on `events` in the order the device sent them.
#[derive(Debug)]
pub struct DeviceConnection<C> {
    pub client: C,
    pub events: mpsc::Receiver<DeviceEvent>,
}

/// Control handle for one device.
///
/// Handles are cheap to clone and shared between the event pump, the
/// refresh loop and peer writes.
pub trait DeviceClient: Clone + Send + Sync + 'static {
    /// Read the current on/off state.
    fn get_binary_state(
        &self,
    ) -> impl Future<Output = Result<BinaryState, TransportError>> + Send;

    /// Switch the device on or off.
    fn set_binary_state(
        &self,
        value: BinaryState,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read the brightness percentage of a dimmer.
    fn get_brightness(&self) -> impl Future<Output = Result<u8, TransportError>> + Send;
}

/// A device transport: finds devices and opens connections to them.
pub trait DeviceTransport: Send + Sync + 'static {
    /// Concrete control handle type.
    type Client: DeviceClient;

    /// Broadcast a discovery probe.
    ///
    /// Yields one item per responding device. Errors are per-response and
    /// do not end the stream; a connection reset is expected noise.
    fn discover(&self) -> impl Stream<Item = Result<DeviceDescriptor, TransportError>> + Send;

    /// Open a control handle and subscribe to the device's notifications.
    fn connect(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> impl Future<Output = Result<DeviceConnection<Self::Client>, TransportError>> + Send;
}
