//! # threeway-adapter-virtual
//!
//! Simulated transport exposing in-memory switches and dimmers. Used by
//! the daemon's demo mode and by end-to-end tests.
//!
//! ## Behaviour
//!
//! | Action | Effect |
//! |--------|--------|
//! | [`VirtualTransport::press`] | Toggles the device and notifies subscribers |
//! | [`VirtualTransport::drift`] | Changes state without any notification |
//! | remote write | Applies the state, echoes an event if it changed, records a [`VirtualWrite`] |
//! | [`VirtualTransport::set_online`] `false` | Streams end with `Closed`; calls fail |
//! | [`VirtualTransport::move_to`] | Changes the advertised address |
//! | discovery | Announces a device once, again after it moves or comes back online |
//!
//! ## Dependency rule
//!
//! Depends on `threeway-app` (port traits) and `threeway-domain` only.

mod client;
pub mod config;
mod device;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio_stream::Stream;

use threeway_app::ports::{DeviceConnection, DeviceTransport};
use threeway_domain::device::DeviceDescriptor;
use threeway_domain::error::TransportError;
use threeway_domain::id::SerialNumber;
use threeway_domain::state::BinaryState;

pub use client::VirtualClient;
use config::VirtualConfig;
use device::VirtualDevice;

const DEFAULT_PORT: u16 = 49153;

/// A remote write received by a simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualWrite {
    pub serial_number: SerialNumber,
    pub state: BinaryState,
}

/// In-memory transport over a set of simulated devices.
pub struct VirtualTransport {
    devices: Mutex<BTreeMap<SerialNumber, Arc<VirtualDevice>>>,
    writes: broadcast::Sender<VirtualWrite>,
}

impl Default for VirtualTransport {
    fn default() -> Self {
        let (writes, _) = broadcast::channel(256);
        Self {
            devices: Mutex::new(BTreeMap::new()),
            writes,
        }
    }
}

impl VirtualTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transport exposing the configured devices.
    #[must_use]
    pub fn from_config(config: &VirtualConfig) -> Self {
        let transport = Self::new();
        for (index, device) in config.devices.iter().enumerate() {
            let descriptor = DeviceDescriptor {
                serial_number: device.serial_number.clone(),
                friendly_name: device.friendly_name.clone(),
                model_name: device.model_name.clone(),
                hardware_version: device.hardware_version.clone(),
                address: default_address(index),
            };
            transport.add(descriptor, BinaryState::from(device.on), device.brightness);
        }
        transport
    }

    /// Add (or replace) a simulated device.
    pub fn add(&self, descriptor: DeviceDescriptor, state: BinaryState, brightness: u8) {
        let serial = descriptor.serial_number.clone();
        let device = Arc::new(VirtualDevice::new(descriptor, state, brightness));
        self.lock().insert(serial, device);
    }

    /// Simulate a physical button press: toggle and notify.
    ///
    /// Returns the new state.
    ///
    /// # Errors
    ///
    /// Fails with [`TransportError::HostUnreachable`] when the device is
    /// unknown or offline.
    pub fn press(&self, serial: &SerialNumber) -> Result<BinaryState, TransportError> {
        let device = self.device(serial)?;
        let next = device.state().toggled();
        device.apply(next, true)?;
        tracing::debug!(serial = %serial, state = %next, "virtual press");
        Ok(next)
    }

    /// Set the physical state and notify subscribers if it changed.
    ///
    /// # Errors
    ///
    /// Fails when the device is unknown or offline.
    pub fn set_physical(
        &self,
        serial: &SerialNumber,
        state: BinaryState,
    ) -> Result<(), TransportError> {
        self.device(serial)?.apply(state, true).map(|_| ())
    }

    /// Change state without notifying anyone, as a lost event would.
    ///
    /// # Errors
    ///
    /// Fails when the device is unknown or offline.
    pub fn drift(&self, serial: &SerialNumber, state: BinaryState) -> Result<(), TransportError> {
        self.device(serial)?.apply(state, false).map(|_| ())
    }

    /// Push an error notification on the device's subscriptions.
    ///
    /// # Errors
    ///
    /// Fails when the device is unknown.
    pub fn raise(&self, serial: &SerialNumber, err: TransportError) -> Result<(), TransportError> {
        self.device(serial)?.raise(err);
        Ok(())
    }

    /// Change a dimmer's brightness and notify subscribers.
    ///
    /// # Errors
    ///
    /// Fails when the device is unknown.
    pub fn set_brightness(&self, serial: &SerialNumber, percent: u8) -> Result<(), TransportError> {
        self.device(serial)?.set_brightness(percent);
        Ok(())
    }

    /// Take a device on or off the network. Going offline closes its
    /// subscriptions.
    ///
    /// # Errors
    ///
    /// Fails when the device is unknown.
    pub fn set_online(&self, serial: &SerialNumber, online: bool) -> Result<(), TransportError> {
        self.device(serial)?.set_online(online);
        Ok(())
    }

    /// Whether the device answers discovery probes.
    ///
    /// # Errors
    ///
    /// Fails when the device is unknown.
    pub fn set_discoverable(
        &self,
        serial: &SerialNumber,
        discoverable: bool,
    ) -> Result<(), TransportError> {
        self.device(serial)?.set_discoverable(discoverable);
        Ok(())
    }

    /// Change the address the device advertises.
    ///
    /// # Errors
    ///
    /// Fails when the device is unknown.
    pub fn move_to(
        &self,
        serial: &SerialNumber,
        address: impl Into<String>,
    ) -> Result<(), TransportError> {
        self.device(serial)?.set_address(address.into());
        Ok(())
    }

    /// Current physical state of a device.
    #[must_use]
    pub fn state_of(&self, serial: &SerialNumber) -> Option<BinaryState> {
        self.lock().get(serial).map(|device| device.state())
    }

    /// Follow every remote write made through a [`VirtualClient`].
    #[must_use]
    pub fn subscribe_writes(&self) -> broadcast::Receiver<VirtualWrite> {
        self.writes.subscribe()
    }

    fn device(&self, serial: &SerialNumber) -> Result<Arc<VirtualDevice>, TransportError> {
        self.lock()
            .get(serial)
            .cloned()
            .ok_or(TransportError::HostUnreachable)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SerialNumber, Arc<VirtualDevice>>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeviceTransport for VirtualTransport {
    type Client = VirtualClient;

    fn discover(&self) -> impl Stream<Item = Result<DeviceDescriptor, TransportError>> + Send {
        let found: Vec<_> = self
            .lock()
            .values()
            .filter_map(|device| device.announce())
            .map(Ok)
            .collect();
        tracing::trace!(count = found.len(), "virtual discovery");
        tokio_stream::iter(found)
    }

    async fn connect(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<DeviceConnection<VirtualClient>, TransportError> {
        let device = self.device(&descriptor.serial_number)?;
        let events = device.subscribe()?;
        Ok(DeviceConnection {
            client: VirtualClient::new(device, self.writes.clone()),
            events,
        })
    }
}

fn default_address(index: usize) -> String {
    format!("192.168.0.{}:{DEFAULT_PORT}", index + 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    use threeway_app::ports::{DeviceClient, DeviceEvent};
    use tokio_stream::StreamExt;

    use config::VirtualDeviceConfig;

    fn sn(value: &str) -> SerialNumber {
        SerialNumber::new(value).unwrap()
    }

    fn transport() -> VirtualTransport {
        let device = |serial: &str, model: &str, on: bool| VirtualDeviceConfig {
            serial_number: sn(serial),
            friendly_name: format!("Switch {serial}"),
            model_name: model.to_string(),
            hardware_version: None,
            on,
            brightness: 40,
        };
        VirtualTransport::from_config(&VirtualConfig {
            devices: vec![
                device("A", "LightSwitch", false),
                device("B", "Dimmer", true),
            ],
        })
    }

    async fn descriptors(transport: &VirtualTransport) -> Vec<DeviceDescriptor> {
        transport
            .discover()
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect()
    }

    #[tokio::test]
    async fn should_discover_configured_devices() {
        let transport = transport();

        let found = descriptors(&transport).await;

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].serial_number, sn("A"));
        assert_eq!(found[0].address, "192.168.0.10:49153");
        assert_eq!(found[1].address, "192.168.0.11:49153");
        assert!(found[1].is_dimmer());
    }

    #[tokio::test]
    async fn should_hide_undiscoverable_and_offline_devices() {
        let transport = transport();
        transport.set_discoverable(&sn("A"), false).unwrap();
        transport.set_online(&sn("B"), false).unwrap();

        assert!(descriptors(&transport).await.is_empty());
    }

    #[tokio::test]
    async fn should_advertise_new_address_after_move() {
        let transport = transport();
        transport.move_to(&sn("A"), "10.0.0.5:49154").unwrap();

        let found = descriptors(&transport).await;

        assert_eq!(found[0].address, "10.0.0.5:49154");
    }

    #[tokio::test]
    async fn should_announce_quiet_device_only_once() {
        let transport = transport();
        assert_eq!(descriptors(&transport).await.len(), 2);

        assert!(descriptors(&transport).await.is_empty());

        transport.move_to(&sn("A"), "10.0.0.5:49154").unwrap();
        transport.set_online(&sn("B"), false).unwrap();
        transport.set_online(&sn("B"), true).unwrap();
        let found = descriptors(&transport).await;

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].address, "10.0.0.5:49154");
    }

    #[tokio::test]
    async fn should_echo_remote_write_as_event() {
        let transport = transport();
        let descriptor = descriptors(&transport).await.remove(0);
        let mut writes = transport.subscribe_writes();
        let mut connection = transport.connect(&descriptor).await.unwrap();
        assert_eq!(
            connection.events.recv().await,
            Some(DeviceEvent::BinaryState(BinaryState::Off))
        );

        connection.client.set_binary_state(BinaryState::On).await.unwrap();

        assert_eq!(
            connection.events.recv().await,
            Some(DeviceEvent::BinaryState(BinaryState::On))
        );
        assert_eq!(
            writes.recv().await.unwrap(),
            VirtualWrite {
                serial_number: sn("A"),
                state: BinaryState::On,
            }
        );
        assert_eq!(transport.state_of(&sn("A")), Some(BinaryState::On));
    }

    #[tokio::test]
    async fn should_notify_on_press() {
        let transport = transport();
        let descriptor = descriptors(&transport).await.remove(1);
        let mut connection = transport.connect(&descriptor).await.unwrap();
        assert_eq!(
            connection.events.recv().await,
            Some(DeviceEvent::BinaryState(BinaryState::On))
        );

        let state = transport.press(&sn("B")).unwrap();

        assert_eq!(state, BinaryState::Off);
        assert_eq!(
            connection.events.recv().await,
            Some(DeviceEvent::BinaryState(BinaryState::Off))
        );
    }

    #[tokio::test]
    async fn should_read_brightness_only_from_dimmers() {
        let transport = transport();
        let found = descriptors(&transport).await;
        let switch = transport.connect(&found[0]).await.unwrap();
        let dimmer = transport.connect(&found[1]).await.unwrap();

        assert!(switch.client.get_brightness().await.is_err());
        assert_eq!(dimmer.client.get_brightness().await, Ok(40));
    }

    #[tokio::test]
    async fn should_refuse_connection_to_offline_device() {
        let transport = transport();
        let descriptor = descriptors(&transport).await.remove(0);
        transport.set_online(&sn("A"), false).unwrap();

        let result = transport.connect(&descriptor).await;

        assert_eq!(result.err(), Some(TransportError::HostUnreachable));
    }

    #[tokio::test]
    async fn should_fail_reads_once_device_goes_offline() {
        let transport = transport();
        let descriptor = descriptors(&transport).await.remove(0);
        let connection = transport.connect(&descriptor).await.unwrap();

        transport.set_online(&sn("A"), false).unwrap();

        assert_eq!(
            connection.client.get_binary_state().await,
            Err(TransportError::HostUnreachable)
        );
    }

    #[test]
    fn should_change_state_silently_on_drift() {
        let transport = transport();
        transport.drift(&sn("A"), BinaryState::On).unwrap();
        assert_eq!(transport.state_of(&sn("A")), Some(BinaryState::On));
    }
}
