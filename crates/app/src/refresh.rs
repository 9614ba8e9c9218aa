//! Refresh scheduler: per-device polling loop.
//!
//! Each discovered record gets one loop. A cycle sleeps for the refresh
//! interval, polls the device's binary state and hands the value to the
//! [`SyncEngine`] as a refresh observation. The loop retires for good when
//! the record is superseded or the device proves unreachable; rediscovery
//! starts a fresh loop for the new record.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::ports::DeviceClient;
use crate::registry::DeviceEntry;
use crate::sync_engine::{Reaction, Source, SyncEngine, bounded};

/// Result of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The device answered; the engine reacted as described.
    Observed(Reaction),
    /// Transient failure; poll again next interval.
    Retry,
    /// Stop polling this record.
    Retired,
}

/// Polling loop for one device record.
pub struct RefreshScheduler<C> {
    engine: Arc<SyncEngine<C>>,
    entry: Arc<DeviceEntry<C>>,
    interval: Duration,
}

impl<C: DeviceClient> RefreshScheduler<C> {
    #[must_use]
    pub fn new(engine: Arc<SyncEngine<C>>, entry: Arc<DeviceEntry<C>>, interval: Duration) -> Self {
        Self {
            engine,
            entry,
            interval,
        }
    }

    /// Spawn the loop. The first poll happens one interval from now.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        loop {
            tokio::select! {
                biased;
                () = self.entry.retired() => {
                    tracing::trace!(
                        device = %self.entry.label(),
                        "old device removed from refresh"
                    );
                    return;
                }
                () = tokio::time::sleep(self.interval) => {}
            }
            if self.poll_once().await == PollOutcome::Retired {
                return;
            }
        }
    }

    /// Run one poll cycle.
    pub async fn poll_once(&self) -> PollOutcome {
        if self.entry.is_superseded() {
            tracing::trace!(device = %self.entry.label(), "old device removed from refresh");
            return PollOutcome::Retired;
        }

        let result = bounded(
            self.engine.rpc_timeout(),
            self.entry.client().get_binary_state(),
        )
        .await;

        match result {
            Ok(value) => {
                let device = self.entry.snapshot();
                if let Some(previous) = device.binary_state.filter(|known| *known != value) {
                    tracing::warn!(
                        device = %device.label(),
                        from = %previous,
                        to = %value,
                        "state changed without notification"
                    );
                }
                PollOutcome::Observed(self.engine.on_state_observed(
                    &self.entry,
                    value,
                    Source::Refresh,
                ))
            }
            Err(err) if err.is_unreachable() => {
                self.entry.update(|device| device.online = false);
                tracing::trace!(
                    device = %self.entry.label(),
                    code = err.code(),
                    "device removed from refresh"
                );
                PollOutcome::Retired
            }
            Err(err) => {
                tracing::debug!(
                    device = %self.entry.label(),
                    code = err.code(),
                    "refresh failed, retrying next interval"
                );
                PollOutcome::Retry
            }
        }
    }
}
