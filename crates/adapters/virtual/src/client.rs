use std::sync::Arc;

use tokio::sync::broadcast;

use threeway_app::ports::DeviceClient;
use threeway_domain::error::TransportError;
use threeway_domain::state::BinaryState;

use crate::VirtualWrite;
use crate::device::VirtualDevice;

/// Control handle for one simulated device.
#[derive(Clone)]
pub struct VirtualClient {
    device: Arc<VirtualDevice>,
    writes: broadcast::Sender<VirtualWrite>,
}

impl VirtualClient {
    pub(crate) fn new(device: Arc<VirtualDevice>, writes: broadcast::Sender<VirtualWrite>) -> Self {
        Self { device, writes }
    }
}

impl std::fmt::Debug for VirtualClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualClient")
            .field("serial_number", &self.device.descriptor().serial_number)
            .finish_non_exhaustive()
    }
}

impl DeviceClient for VirtualClient {
    async fn get_binary_state(&self) -> Result<BinaryState, TransportError> {
        self.device.read_state()
    }

    async fn set_binary_state(&self, value: BinaryState) -> Result<(), TransportError> {
        self.device.apply(value, true)?;
        // no receiver is fine
        let _ = self.writes.send(VirtualWrite {
            serial_number: self.device.descriptor().serial_number,
            state: value,
        });
        Ok(())
    }

    async fn get_brightness(&self) -> Result<u8, TransportError> {
        self.device.read_brightness()
    }
}
