//! Virtual transport configuration.

use serde::Deserialize;

use threeway_domain::id::SerialNumber;

/// Simulated devices to expose.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    pub devices: Vec<VirtualDeviceConfig>,
}

/// One simulated device.
#[derive(Debug, Clone, Deserialize)]
pub struct VirtualDeviceConfig {
    pub serial_number: SerialNumber,
    pub friendly_name: String,
    /// `LightSwitch` or `Dimmer`.
    #[serde(default = "default_model")]
    pub model_name: String,
    #[serde(default)]
    pub hardware_version: Option<String>,
    /// Initial state.
    #[serde(default)]
    pub on: bool,
    /// Initial brightness, dimmers only.
    #[serde(default = "default_brightness")]
    pub brightness: u8,
}

fn default_model() -> String {
    "LightSwitch".to_string()
}

fn default_brightness() -> u8 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_no_devices() {
        assert!(VirtualConfig::default().devices.is_empty());
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            [[devices]]
            serial_number = "221517k0101769"
            friendly_name = "Stairs Bottom"

            [[devices]]
            serial_number = "221517K0101770"
            friendly_name = "Stairs Top"
            model_name = "Dimmer"
            hardware_version = "v2"
            on = true
            brightness = 60
        "#;
        let config: VirtualConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].serial_number.as_str(), "221517K0101769");
        assert_eq!(config.devices[0].model_name, "LightSwitch");
        assert!(!config.devices[0].on);
        assert_eq!(config.devices[1].model_name, "Dimmer");
        assert_eq!(config.devices[1].brightness, 60);
        assert!(config.devices[1].on);
    }
}
