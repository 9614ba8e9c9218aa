//! Device registry: the single authority on known devices.
//!
//! Each serial number maps to its latest [`DeviceEntry`]. An entry guards
//! its [`Device`] with its own lock, so different devices are updated
//! independently; the map lock is only held to look up or replace entries.
//!
//! Replacing an entry signals [`DeviceEntry::retired`], which ends the old
//! record's event pump and refresh loop right away.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use threeway_domain::device::{Device, DeviceDescriptor};
use threeway_domain::id::SerialNumber;
use threeway_domain::state::BinaryState;

use crate::ports::DeviceClient;
use crate::sync_engine::bounded;

/// A registered device record together with its control handle.
pub struct DeviceEntry<C> {
    serial_number: SerialNumber,
    device: Mutex<Device>,
    client: C,
    retired: watch::Sender<bool>,
    writes: Mutex<Option<mpsc::UnboundedSender<BinaryState>>>,
}

impl<C> DeviceEntry<C> {
    fn new(device: Device, client: C) -> Self {
        Self {
            serial_number: device.serial_number.clone(),
            device: Mutex::new(device),
            client,
            retired: watch::Sender::new(false),
            writes: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn serial_number(&self) -> &SerialNumber {
        &self.serial_number
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Copy of the record as it is right now.
    #[must_use]
    pub fn snapshot(&self) -> Device {
        self.lock().clone()
    }

    /// Apply a mutation atomically with respect to other readers and
    /// writers of this device.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut Device) -> R) -> R {
        mutate(&mut self.lock())
    }

    #[must_use]
    pub fn is_superseded(&self) -> bool {
        self.lock().superseded
    }

    #[must_use]
    pub fn label(&self) -> String {
        self.lock().label()
    }

    /// Resolves once a newer record replaced this one.
    pub async fn retired(&self) {
        let mut retired = self.retired.subscribe();
        // the sender lives as long as `self`
        let _ = retired.wait_for(|done| *done).await;
    }

    fn supersede(&self) {
        self.lock().superseded = true;
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.retired.send_replace(true);
    }

    fn lock(&self) -> MutexGuard<'_, Device> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: DeviceClient> DeviceEntry<C> {
    /// Queue a state write to this device.
    ///
    /// Writes to one device are issued one after the other, in the order
    /// they were queued; a failure is logged and does not stop the queue.
    /// Must be called from within a tokio runtime.
    pub fn queue_write(&self, value: BinaryState, limit: Duration) {
        let label = self.label();
        if *self.retired.borrow() {
            tracing::warn!(device = %label, "record replaced, write dropped");
            return;
        }
        let mut writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = match writes.as_ref().filter(|queue| !queue.is_closed()) {
            Some(queue) => queue.clone(),
            None => {
                let (queue, pending) = mpsc::unbounded_channel();
                tokio::spawn(write_in_order(
                    self.client.clone(),
                    label.clone(),
                    pending,
                    limit,
                ));
                *writes = Some(queue.clone());
                queue
            }
        };
        if queue.send(value).is_err() {
            tracing::warn!(device = %label, "write queue closed, write dropped");
        }
    }
}

async fn write_in_order<C: DeviceClient>(
    client: C,
    label: String,
    mut pending: mpsc::UnboundedReceiver<BinaryState>,
    limit: Duration,
) {
    while let Some(value) = pending.recv().await {
        if let Err(err) = bounded(limit, client.set_binary_state(value)).await {
            tracing::error!(
                device = %label,
                code = err.code(),
                %err,
                "failed to set peer state"
            );
        }
    }
}

/// In-memory store of discovered devices, keyed by serial number.
pub struct DeviceRegistry<C> {
    devices: RwLock<HashMap<SerialNumber, Arc<DeviceEntry<C>>>>,
}

impl<C> Default for DeviceRegistry<C> {
    fn default() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }
}

impl<C> DeviceRegistry<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly discovered device.
    ///
    /// A prior record for the same serial is marked superseded and replaced;
    /// the new record starts unseen, without state.
    pub fn upsert(&self, descriptor: &DeviceDescriptor, client: C) -> Arc<DeviceEntry<C>> {
        let entry = Arc::new(DeviceEntry::new(Device::from_descriptor(descriptor), client));
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = devices.insert(descriptor.serial_number.clone(), Arc::clone(&entry))
        {
            previous.supersede();
            tracing::trace!(
                device = %previous.label(),
                old_record = %previous.snapshot().record,
                new_record = %entry.snapshot().record,
                "old device replaced by new discovery"
            );
        }
        entry
    }

    /// Latest record for `serial`, if it was ever discovered.
    #[must_use]
    pub fn get(&self, serial: &SerialNumber) -> Option<Arc<DeviceEntry<C>>> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(serial)
            .cloned()
    }

    /// Snapshot of every current record.
    #[must_use]
    pub fn all(&self) -> Vec<Device> {
        let entries: Vec<_> = self
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        entries.iter().map(|entry| entry.snapshot()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(serial: &str, address: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            serial_number: SerialNumber::new(serial).unwrap(),
            friendly_name: format!("Switch {serial}"),
            model_name: "LightSwitch".to_string(),
            hardware_version: None,
            address: address.to_string(),
        }
    }

    #[test]
    fn should_register_unknown_device_as_unseen() {
        let registry = DeviceRegistry::new();
        let entry = registry.upsert(&descriptor("A", "10.0.0.1:49153"), ());
        let device = entry.snapshot();
        assert!(!device.seen);
        assert!(!device.superseded);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn should_return_none_for_unknown_serial() {
        let registry: DeviceRegistry<()> = DeviceRegistry::new();
        assert!(registry.get(&SerialNumber::new("A").unwrap()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn should_supersede_previous_record_on_rediscovery() {
        let registry = DeviceRegistry::new();
        let old = registry.upsert(&descriptor("A", "10.0.0.1:49153"), ());
        old.update(|device| device.observe(BinaryState::On));

        let new = registry.upsert(&descriptor("A", "10.0.0.7:49153"), ());

        assert!(old.is_superseded());
        assert!(!new.is_superseded());
        let device = new.snapshot();
        assert_eq!(device.binary_state, None);
        assert!(!device.seen);
        assert_eq!(device.address, "10.0.0.7:49153");

        let current = registry.get(&SerialNumber::new("A").unwrap()).unwrap();
        assert!(Arc::ptr_eq(&current, &new));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn should_signal_retirement_when_replaced() {
        let registry = DeviceRegistry::new();
        let old = registry.upsert(&descriptor("A", "10.0.0.1:49153"), ());
        let waiter = tokio::spawn({
            let old = Arc::clone(&old);
            async move { old.retired().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        registry.upsert(&descriptor("A", "10.0.0.1:49153"), ());

        waiter.await.unwrap();
        old.retired().await;
    }

    #[test]
    fn should_snapshot_all_devices() {
        let registry = DeviceRegistry::new();
        registry.upsert(&descriptor("A", "10.0.0.1:49153"), ());
        registry.upsert(&descriptor("B", "10.0.0.2:49153"), ());

        let mut serials: Vec<_> = registry
            .all()
            .into_iter()
            .map(|d| d.serial_number.to_string())
            .collect();
        serials.sort();
        assert_eq!(serials, vec!["A", "B"]);
    }

    #[test]
    fn should_keep_record_consistent_under_concurrent_updates() {
        let registry = Arc::new(DeviceRegistry::new());
        let entry = registry.upsert(&descriptor("D", "10.0.0.4:49153"), ());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let entry = Arc::clone(&entry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        entry.update(|device| device.observe(BinaryState::On));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let device = entry.snapshot();
        assert!(device.seen);
        assert!(device.is_on());
    }
}
