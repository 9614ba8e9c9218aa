//! Device: one network-controllable switch or dimmer.
//!
//! A [`Device`] is created from the [`DeviceDescriptor`] a discovery pass
//! returns. Its attributes are mutated in place as state observations
//! arrive; it is never deleted, only marked superseded when a newer record
//! for the same serial number replaces it.

use serde::{Deserialize, Serialize};

use crate::id::{RecordId, SerialNumber};
use crate::state::BinaryState;

const DIMMER_MODEL: &str = "Dimmer";

/// What a discovery pass reports about a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub serial_number: SerialNumber,
    pub friendly_name: String,
    pub model_name: String,
    pub hardware_version: Option<String>,
    /// Network location (`host:port`). May change between discoveries while
    /// the serial number stays stable.
    pub address: String,
}

impl DeviceDescriptor {
    /// Whether the model reports brightness.
    #[must_use]
    pub fn is_dimmer(&self) -> bool {
        self.model_name.eq_ignore_ascii_case(DIMMER_MODEL)
    }
}

/// Capability-specific state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Capability {
    Switch,
    Dimmer {
        /// Last read brightness, `None` until the first successful read.
        brightness: Option<u8>,
    },
}

/// Outcome of recording a binary-state observation on a [`Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Value differs from the previous known value.
    pub changed: bool,
    /// This was the first observation for the record.
    pub first: bool,
}

/// A discovered switch or dimmer with its last known attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub record: RecordId,
    pub serial_number: SerialNumber,
    pub friendly_name: String,
    pub model_name: String,
    pub hardware_version: Option<String>,
    pub address: String,
    pub capability: Capability,
    pub binary_state: Option<BinaryState>,
    /// At least one state observation has been processed.
    pub seen: bool,
    /// A newer discovery record for the same serial replaced this one.
    pub superseded: bool,
    /// Cleared when polling finds the device unreachable.
    pub online: bool,
}

impl Device {
    /// Create a fresh record from a discovery descriptor.
    ///
    /// No state is carried over from any earlier record: binary state and
    /// brightness are re-learned.
    #[must_use]
    pub fn from_descriptor(descriptor: &DeviceDescriptor) -> Self {
        let capability = if descriptor.is_dimmer() {
            Capability::Dimmer { brightness: None }
        } else {
            Capability::Switch
        };
        Self {
            record: RecordId::new(),
            serial_number: descriptor.serial_number.clone(),
            friendly_name: descriptor.friendly_name.clone(),
            model_name: descriptor.model_name.clone(),
            hardware_version: descriptor.hardware_version.clone(),
            address: descriptor.address.clone(),
            capability,
            binary_state: None,
            seen: false,
            superseded: false,
            online: true,
        }
    }

    /// Human-readable label: `[SERIAL hw Model] Friendly Name`.
    #[must_use]
    pub fn label(&self) -> String {
        let model = self.model_name.replace("LightSwitch", "Switch");
        format!(
            "[{} {} {}] {}",
            self.serial_number,
            self.hardware_version.as_deref().unwrap_or("v1"),
            model,
            self.friendly_name
        )
    }

    #[must_use]
    pub fn is_dimmer(&self) -> bool {
        matches!(self.capability, Capability::Dimmer { .. })
    }

    /// Last read brightness, for dimmers only.
    #[must_use]
    pub fn brightness(&self) -> Option<u8> {
        match self.capability {
            Capability::Dimmer { brightness } => brightness,
            Capability::Switch => None,
        }
    }

    /// Record a brightness reading, clamped to 100 %.
    ///
    /// Returns `false` (and records nothing) for plain switches.
    pub fn set_brightness(&mut self, percent: u8) -> bool {
        match &mut self.capability {
            Capability::Dimmer { brightness } => {
                *brightness = Some(percent.min(100));
                true
            }
            Capability::Switch => false,
        }
    }

    /// Whether the last known state is on.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.binary_state.is_some_and(BinaryState::is_on)
    }

    /// Record a binary-state observation.
    ///
    /// The value is stored unconditionally; the returned [`Observation`]
    /// tells the caller whether it changed and whether it was the record's
    /// first.
    pub fn observe(&mut self, value: BinaryState) -> Observation {
        let changed = self.binary_state != Some(value);
        self.binary_state = Some(value);
        let first = !self.seen;
        self.seen = true;
        Observation { changed, first }
    }
}
