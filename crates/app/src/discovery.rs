//! Discovery scheduler: finds devices and brings them under management.
//!
//! Discovery runs front-loaded: a handful of passes at a short interval
//! so devices are found quickly after boot, then a long interval for the
//! rest of the process lifetime. Each descriptor that passes the filters
//! is registered, its notification channel is pumped into the engine, and
//! its refresh loop is started.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

use threeway_domain::device::DeviceDescriptor;
use threeway_domain::error::ThreeWayError;

use crate::config::SyncConfig;
use crate::ports::DeviceTransport;
use crate::refresh::RefreshScheduler;
use crate::registry::DeviceEntry;
use crate::sync_engine::{SyncEngine, bounded};

/// Periodic discovery driver.
pub struct DiscoveryScheduler<T: DeviceTransport> {
    transport: Arc<T>,
    engine: Arc<SyncEngine<T::Client>>,
    config: SyncConfig,
    attempts: u32,
}

impl<T: DeviceTransport> DiscoveryScheduler<T> {
    pub fn new(transport: Arc<T>, engine: Arc<SyncEngine<T::Client>>, config: SyncConfig) -> Self {
        Self {
            transport,
            engine,
            config,
            attempts: 0,
        }
    }

    /// Spawn the discovery loop. The first pass runs immediately.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        loop {
            self.tick().await;
            let delay = self.next_delay();
            tokio::time::sleep(delay).await;
        }
    }

    /// Delay before the next pass; advances the attempt counter.
    ///
    /// The counter never resets, so once the initial attempts are spent the
    /// steady interval applies for good.
    fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts < self.config.discover_initial_attempts {
            self.config.discover_initial_interval()
        } else {
            self.config.discover_interval()
        }
    }

    /// Run one discovery pass, returning how many devices were registered.
    pub async fn tick(&self) -> usize {
        tracing::debug!("discovering devices");
        let mut responses = pin!(self.transport.discover());
        let mut registered = 0;

        while let Some(response) = responses.next().await {
            match response {
                Ok(descriptor) => match self.register(&descriptor).await {
                    Ok(Some(_)) => registered += 1,
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(
                            serial = %descriptor.serial_number,
                            %err,
                            "failed to connect to discovered device"
                        );
                    }
                },
                Err(err) if err.is_noise() => {}
                Err(err) => {
                    tracing::warn!(code = err.code(), %err, "discovery response failed");
                }
            }
        }

        registered
    }

    /// Bring one discovered device under management.
    ///
    /// Returns `None` when the device is filtered out (ignored, or not
    /// grouped while only switches are managed).
    ///
    /// # Errors
    ///
    /// Returns [`ThreeWayError::Transport`] when the connection to the device
    /// cannot be opened; nothing is registered in that case.
    pub async fn register(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<Option<Arc<DeviceEntry<T::Client>>>, ThreeWayError> {
        let serial = &descriptor.serial_number;
        if self.config.is_ignored(serial) {
            tracing::trace!(serial = %serial, "ignored device skipped");
            return Ok(None);
        }
        let grouped = self.engine.topology().contains(serial);
        if self.config.switches_only && !grouped {
            tracing::trace!(serial = %serial, "device outside any group skipped");
            return Ok(None);
        }

        let connection = bounded(
            self.engine.rpc_timeout(),
            self.transport.connect(descriptor),
        )
        .await?;
        let entry = self.engine.registry().upsert(descriptor, connection.client);
        tracing::info!(device = %entry.label(), address = %descriptor.address, "discovered");

        tokio::spawn(Arc::clone(&self.engine).pump_events(Arc::clone(&entry), connection.events));

        if self.config.refresh_enabled {
            RefreshScheduler::new(
                Arc::clone(&self.engine),
                Arc::clone(&entry),
                self.config.refresh_interval(),
            )
            .start();
        }

        if grouped {
            let engine = Arc::clone(&self.engine);
            let serial = serial.clone();
            let delay = self.config.group_status_delay();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                engine.log_group_status(&serial);
            });
        }

        Ok(Some(entry))
    }
}
