//! Identifiers: manufacturer serial numbers and per-discovery record ids.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identity of one discovery record.
///
/// A device rediscovered under the same serial number gets a fresh record,
/// so two records of the same serial are told apart by this id in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(uuid::Uuid);

impl RecordId {
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    /// Short form: the first eight hex digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let simple = self.0.simple().to_string();
        f.write_str(&simple[..8])
    }
}

/// Manufacturer serial number: the stable identity of a device.
///
/// Normalised on construction (trimmed, upper-cased) so configuration and
/// discovery results compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerialNumber(String);

impl SerialNumber {
    /// Normalise and wrap a serial number.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptySerial`] when the value is blank.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySerial);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Borrow the normalised serial.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SerialNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SerialNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SerialNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SerialNumber> for String {
    fn from(value: SerialNumber) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_record_ids() {
        assert_ne!(RecordId::new(), RecordId::new());
    }

    #[test]
    fn should_display_record_id_in_short_form() {
        let id = RecordId::new();
        let shown = id.to_string();
        assert_eq!(shown.len(), 8);
        assert!(id.0.simple().to_string().starts_with(&shown));
    }

    #[test]
    fn should_normalise_case_and_whitespace() {
        let serial = SerialNumber::new("  221517k0101769 ").unwrap();
        assert_eq!(serial.as_str(), "221517K0101769");
        assert_eq!(serial, "221517K0101769".parse().unwrap());
    }

    #[test]
    fn should_reject_blank_serial() {
        assert!(matches!(
            SerialNumber::new("   "),
            Err(ValidationError::EmptySerial)
        ));
    }

    #[test]
    fn should_deserialize_with_normalisation() {
        let serial: SerialNumber = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(serial.to_string(), "ABC123");
    }

    #[test]
    fn should_fail_to_deserialize_blank_serial() {
        let result: Result<SerialNumber, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}
