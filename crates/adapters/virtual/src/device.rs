//! Virtual device: a simulated switch or dimmer.
//!
//! Holds its own on/off state and pushes notifications to every open
//! subscription whenever that state changes, as a real device does after a
//! button press or a remote write. A new subscription first receives the
//! current state. Discovery sees a device once; it is announced again only
//! after it moves or comes back online.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use threeway_app::ports::DeviceEvent;
use threeway_domain::device::DeviceDescriptor;
use threeway_domain::error::TransportError;
use threeway_domain::state::BinaryState;

struct Inner {
    descriptor: DeviceDescriptor,
    state: BinaryState,
    brightness: u8,
    online: bool,
    discoverable: bool,
    announced: bool,
    subscribers: Vec<mpsc::Sender<DeviceEvent>>,
}

/// A simulated network switch.
pub struct VirtualDevice {
    inner: Mutex<Inner>,
}

impl VirtualDevice {
    pub(crate) fn new(descriptor: DeviceDescriptor, state: BinaryState, brightness: u8) -> Self {
        Self {
            inner: Mutex::new(Inner {
                descriptor,
                state,
                brightness: brightness.min(100),
                online: true,
                discoverable: true,
                announced: false,
                subscribers: Vec::new(),
            }),
        }
    }

    pub(crate) fn descriptor(&self) -> DeviceDescriptor {
        self.lock().descriptor.clone()
    }

    /// Descriptor, if the device is reachable and has not been announced
    /// since it last appeared or moved.
    pub(crate) fn announce(&self) -> Option<DeviceDescriptor> {
        let mut inner = self.lock();
        if !inner.online || !inner.discoverable || inner.announced {
            return None;
        }
        inner.announced = true;
        Some(inner.descriptor.clone())
    }

    pub(crate) fn state(&self) -> BinaryState {
        self.lock().state
    }

    pub(crate) fn subscribe(&self) -> Result<mpsc::Receiver<DeviceEvent>, TransportError> {
        let mut inner = self.lock();
        if !inner.online {
            return Err(TransportError::HostUnreachable);
        }
        inner.subscribers.retain(|tx| !tx.is_closed());
        let (tx, rx) = mpsc::channel(32);
        // a new subscription starts with the current state, on a channel with room
        let _ = tx.try_send(DeviceEvent::BinaryState(inner.state));
        inner.subscribers.push(tx);
        Ok(rx)
    }

    pub(crate) fn read_state(&self) -> Result<BinaryState, TransportError> {
        let inner = self.lock();
        if inner.online {
            Ok(inner.state)
        } else {
            Err(TransportError::HostUnreachable)
        }
    }

    pub(crate) fn read_brightness(&self) -> Result<u8, TransportError> {
        let inner = self.lock();
        if !inner.online {
            return Err(TransportError::HostUnreachable);
        }
        if !inner.descriptor.is_dimmer() {
            return Err(TransportError::Protocol {
                code: "UnsupportedAction".to_string(),
            });
        }
        Ok(inner.brightness)
    }

    /// Apply a state change and notify subscribers when it changed.
    ///
    /// `notify = false` models a change the device never reports.
    pub(crate) fn apply(&self, value: BinaryState, notify: bool) -> Result<bool, TransportError> {
        let mut inner = self.lock();
        if !inner.online {
            return Err(TransportError::HostUnreachable);
        }
        let changed = inner.state != value;
        inner.state = value;
        if changed && notify {
            inner.broadcast(&DeviceEvent::BinaryState(value));
        }
        Ok(changed)
    }

    pub(crate) fn set_brightness(&self, percent: u8) {
        let mut inner = self.lock();
        inner.brightness = percent.min(100);
        let event = DeviceEvent::Brightness(inner.brightness);
        inner.broadcast(&event);
    }

    /// Going offline tells every subscription the stream is closed, then
    /// drops it.
    pub(crate) fn set_online(&self, online: bool) {
        let mut inner = self.lock();
        if inner.online && !online {
            inner.broadcast(&DeviceEvent::Error(TransportError::Closed));
            inner.subscribers.clear();
            inner.announced = false;
        }
        inner.online = online;
    }

    pub(crate) fn set_discoverable(&self, discoverable: bool) {
        let mut inner = self.lock();
        inner.discoverable = discoverable;
        if !discoverable {
            inner.announced = false;
        }
    }

    pub(crate) fn set_address(&self, address: String) {
        let mut inner = self.lock();
        if inner.descriptor.address != address {
            inner.descriptor.address = address;
            inner.announced = false;
        }
    }

    /// Push an error notification on every subscription.
    pub(crate) fn raise(&self, err: TransportError) {
        self.lock().broadcast(&DeviceEvent::Error(err));
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn broadcast(&mut self, event: &DeviceEvent) {
        self.subscribers.retain(|tx| !tx.is_closed());
        for tx in &self.subscribers {
            if tx.try_send(event.clone()).is_err() {
                tracing::warn!(
                    serial = %self.descriptor.serial_number,
                    "virtual subscriber lagging, event dropped"
                );
            }
        }
    }
}
