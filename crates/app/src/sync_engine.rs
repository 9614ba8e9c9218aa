//! Synchronization engine: keeps every switch of a group in the same state.
//!
//! The engine is fed by two sources: push events from a device's
//! notification channel, and the device's refresh loop. For a grouped
//! device, an event-sourced change is mirrored on every peer; a polled
//! value from a group *primary* is reasserted on every peer, which heals
//! silent drift. Each propagated write opens a [race window](crate::race)
//! on its target so the echo of that write is not propagated back.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use threeway_domain::error::TransportError;
use threeway_domain::group::GroupTopology;
use threeway_domain::id::SerialNumber;
use threeway_domain::state::BinaryState;

use crate::config::SyncConfig;
use crate::ports::{DeviceClient, DeviceEvent};
use crate::race::RaceWindows;
use crate::registry::{DeviceEntry, DeviceRegistry};

/// Where an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Pushed by the device.
    Event,
    /// Read by the refresh loop.
    Refresh,
}

/// What the engine did with an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// First observation of the record, stored silently.
    Initial,
    /// Nothing to act on.
    Unchanged,
    /// Changed, but the device is not part of a group.
    Changed,
    /// Echo of a propagated write, swallowed.
    Suppressed,
    /// Mirrored on the group's peers.
    Propagated,
    /// Primary's polled value reasserted on the group's peers.
    Reasserted,
}

/// Result of synchronizing a single peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerSync {
    /// Peer never discovered or replaced; nothing written.
    Unknown,
    /// Peer already in the requested state.
    InSync,
    /// A write was issued and a race window opened.
    Written,
}

/// Run a transport call with an upper bound, mapping expiry to
/// [`TransportError::TimedOut`].
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(TransportError::TimedOut))
}

/// Cross-device state synchronization.
pub struct SyncEngine<C> {
    registry: Arc<DeviceRegistry<C>>,
    topology: Arc<GroupTopology>,
    races: RaceWindows,
    race_timeout: Duration,
    rpc_timeout: Duration,
}

impl<C: DeviceClient> SyncEngine<C> {
    /// Create an engine over a shared registry and topology.
    pub fn new(
        registry: Arc<DeviceRegistry<C>>,
        topology: Arc<GroupTopology>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            registry,
            topology,
            races: RaceWindows::new(),
            race_timeout: config.race_timeout(),
            rpc_timeout: config.rpc_timeout(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry<C>> {
        &self.registry
    }

    #[must_use]
    pub fn topology(&self) -> &Arc<GroupTopology> {
        &self.topology
    }

    #[must_use]
    pub fn races(&self) -> &RaceWindows {
        &self.races
    }

    #[must_use]
    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    /// Handle one binary-state observation for `entry`.
    ///
    /// Peer writes and brightness reads are spawned, never awaited here.
    pub fn on_state_observed(
        &self,
        entry: &Arc<DeviceEntry<C>>,
        value: BinaryState,
        source: Source,
    ) -> Reaction {
        let (observation, label, is_dimmer) = entry.update(|device| {
            (device.observe(value), device.label(), device.is_dimmer())
        });
        let serial = entry.serial_number();

        let reaction = if observation.first {
            Reaction::Initial
        } else {
            match source {
                Source::Event if observation.changed => {
                    tracing::info!(device = %label, state = %value, "state changed");
                    self.propagate_change(serial, &label, value)
                }
                Source::Refresh if self.topology.is_primary(serial) => {
                    for peer in self.topology.peers_of(serial) {
                        self.sync_peer(peer, value, Source::Refresh);
                    }
                    Reaction::Reasserted
                }
                Source::Event | Source::Refresh => Reaction::Unchanged,
            }
        };

        if is_dimmer && value.is_on() && observation.changed {
            self.read_brightness(entry);
        }

        reaction
    }

    fn propagate_change(
        &self,
        serial: &SerialNumber,
        label: &str,
        value: BinaryState,
    ) -> Reaction {
        if !self.topology.contains(serial) {
            return Reaction::Changed;
        }
        if self.races.is_active(serial) {
            tracing::trace!(device = %label, "race detected, ignoring");
            return Reaction::Suppressed;
        }
        for peer in self.topology.peers_of(serial) {
            self.sync_peer(peer, value, Source::Event);
        }
        Reaction::Propagated
    }

    /// Bring one peer to `value`.
    ///
    /// Writes only when the peer's last known state differs, opening (or
    /// replacing) the peer's race window before the write is queued. The
    /// write itself is not awaited: a failure is logged and left for the
    /// next primary reassertion to correct.
    pub fn sync_peer(
        &self,
        serial: &SerialNumber,
        value: BinaryState,
        source: Source,
    ) -> PeerSync {
        let Some(peer) = self
            .registry
            .get(serial)
            .filter(|entry| !entry.is_superseded())
        else {
            tracing::warn!(serial = %serial, "peer offline or not discovered");
            return PeerSync::Unknown;
        };

        let device = peer.snapshot();
        let label = device.label();
        if device.binary_state == Some(value) {
            if source == Source::Event {
                tracing::trace!(device = %label, state = %value, "peer already in state");
            }
            return PeerSync::InSync;
        }
        if source == Source::Refresh {
            tracing::warn!(device = %label, "mis-sync detected, correcting");
        }

        self.races.start(serial, self.race_timeout);
        peer.queue_write(value, self.rpc_timeout);

        tracing::info!(device = %label, state = %value, "set 3-way");
        PeerSync::Written
    }

    fn read_brightness(&self, entry: &Arc<DeviceEntry<C>>) {
        let entry = Arc::clone(entry);
        let limit = self.rpc_timeout;
        tokio::spawn(async move {
            match bounded(limit, entry.client().get_brightness()).await {
                Ok(percent) => {
                    entry.update(|device| device.set_brightness(percent));
                    tracing::info!(
                        device = %entry.label(),
                        brightness = percent,
                        "brightness read"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        device = %entry.label(),
                        code = err.code(),
                        "brightness read failed while handling state"
                    );
                }
            }
        });
    }

    /// Dispatch one pushed event.
    ///
    /// Returns the [`Reaction`] for binary-state events.
    pub fn on_event(&self, entry: &Arc<DeviceEntry<C>>, event: DeviceEvent) -> Option<Reaction> {
        match event {
            DeviceEvent::BinaryState(value) => {
                Some(self.on_state_observed(entry, value, Source::Event))
            }
            DeviceEvent::Brightness(percent) => {
                if entry.update(|device| device.set_brightness(percent)) {
                    tracing::info!(
                        device = %entry.label(),
                        brightness = percent,
                        "brightness changed"
                    );
                }
                None
            }
            DeviceEvent::Error(err) => {
                tracing::error!(device = %entry.label(), code = err.code(), "device error");
                None
            }
        }
    }

    /// Consume a device's notification channel in order until it closes or
    /// the record is superseded.
    pub async fn pump_events(
        self: Arc<Self>,
        entry: Arc<DeviceEntry<C>>,
        mut events: mpsc::Receiver<DeviceEvent>,
    ) {
        loop {
            tokio::select! {
                biased;
                () = entry.retired() => {
                    tracing::trace!(
                        device = %entry.label(),
                        record = %entry.snapshot().record,
                        "old device removed from event stream"
                    );
                    return;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        self.on_event(&entry, event);
                    }
                    None => break,
                },
            }
        }
        tracing::trace!(device = %entry.label(), "event stream closed");
    }

    /// Log the members of `serial`'s group by name, as far as they are known.
    pub fn log_group_status(&self, serial: &SerialNumber) {
        let Some(entry) = self.registry.get(serial) else {
            return;
        };
        let peers: Vec<String> = self
            .topology
            .peers_of(serial)
            .map(|peer| {
                self.registry
                    .get(peer)
                    .map_or_else(|| peer.to_string(), |e| e.snapshot().friendly_name)
            })
            .collect();
        if !peers.is_empty() {
            tracing::info!(device = %entry.label(), peers = %peers.join(", "), "in a 3-way set");
        }
    }
}
