//! Coordinator: builds the engine from configuration and owns its
//! background tasks.

use std::sync::Arc;

use tokio::task::JoinHandle;

use threeway_domain::error::ValidationError;
use threeway_domain::group::GroupTopology;

use crate::config::SyncConfig;
use crate::discovery::DiscoveryScheduler;
use crate::ports::DeviceTransport;
use crate::registry::DeviceRegistry;
use crate::report::DebugReporter;
use crate::sync_engine::SyncEngine;

/// A running synchronizer instance.
///
/// Instances are fully isolated: each owns its registry, race windows and
/// topology, so several can run side by side (as the tests do).
pub struct Coordinator<T: DeviceTransport> {
    engine: Arc<SyncEngine<T::Client>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<T: DeviceTransport> Coordinator<T> {
    /// Build the topology, then spawn discovery and (if enabled) the reporter.
    ///
    /// Invalid groups are logged and skipped; startup never fails because of
    /// them.
    pub fn start(transport: Arc<T>, config: SyncConfig) -> Self {
        let (topology, rejected) = GroupTopology::build(&config.groups);
        for err in &rejected {
            match err {
                ValidationError::NoGroups => tracing::error!(
                    "no switch groups defined, ensure at least one set of 3-way switches is configured by serial number"
                ),
                other => tracing::error!(%other, "skipping switch group"),
            }
        }
        tracing::info!(groups = topology.groups().len(), "switch groups loaded");

        let engine = Arc::new(SyncEngine::new(
            Arc::new(DeviceRegistry::new()),
            Arc::new(topology),
            &config,
        ));

        let mut tasks = Vec::with_capacity(2);
        if config.report_enabled {
            tasks.push(
                DebugReporter::new(Arc::clone(engine.registry()), config.report_interval()).start(),
            );
        }
        tasks.push(DiscoveryScheduler::new(transport, Arc::clone(&engine), config).start());

        Self { engine, tasks }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<SyncEngine<T::Client>> {
        &self.engine
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry<T::Client>> {
        self.engine.registry()
    }

    /// Stop discovery and reporting.
    ///
    /// Per-device loops end when their record is superseded, their device
    /// becomes unreachable, or the runtime shuts down.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        tracing::info!("synchronizer stopped");
    }
}
