//! Debug reporter: periodic, read-only snapshot of devices that are on.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use threeway_domain::device::Device;

use crate::registry::DeviceRegistry;

/// One device that is currently on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub label: String,
    /// Present for dimmers whose brightness has been read.
    pub brightness: Option<u8>,
}

/// Snapshot of the registry for an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub total: usize,
    pub offline: usize,
    pub on: Vec<ReportLine>,
}

impl Report {
    /// Build a report from device snapshots. Superseded records are skipped.
    #[must_use]
    pub fn from_devices(devices: &[Device]) -> Self {
        let current: Vec<&Device> = devices.iter().filter(|d| !d.superseded).collect();
        let mut on: Vec<ReportLine> = current
            .iter()
            .filter(|d| d.is_on())
            .map(|d| ReportLine {
                label: d.label(),
                brightness: d.brightness(),
            })
            .collect();
        on.sort_by(|a, b| a.label.cmp(&b.label));

        Self {
            total: current.len(),
            offline: current.iter().filter(|d| !d.online).count(),
            on,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total devices: {} ({} offline)", self.total, self.offline)?;
        write!(f, "Devices currently on:")?;
        for line in &self.on {
            write!(f, "\n  {}", line.label)?;
            if let Some(brightness) = line.brightness {
                write!(f, ": {brightness}% brightness")?;
            }
        }
        Ok(())
    }
}

/// Logs a [`Report`] at debug level on a fixed cadence.
pub struct DebugReporter<C> {
    registry: Arc<DeviceRegistry<C>>,
    interval: Duration,
}

impl<C: Send + Sync + 'static> DebugReporter<C> {
    #[must_use]
    pub fn new(registry: Arc<DeviceRegistry<C>>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    #[must_use]
    pub fn snapshot(&self) -> Report {
        Report::from_devices(&self.registry.all())
    }

    /// Spawn the reporting loop; the first report is one interval from now.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.interval).await;
                let report = self.snapshot();
                tracing::debug!(total = report.total, offline = report.offline, "\n{report}");
            }
        })
    }
}
