//! Synchronizer configuration.

use std::time::Duration;

use serde::Deserialize;

use threeway_domain::id::SerialNumber;

/// Tunables for discovery, refresh, race suppression and reporting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of discovery passes run at the fast initial cadence.
    pub discover_initial_attempts: u32,
    /// Delay between the initial discovery passes, in seconds.
    pub discover_initial_interval_secs: u64,
    /// Delay between discovery passes once the initial ones are done, in seconds.
    pub discover_interval_secs: u64,
    /// Poll every discovered device periodically.
    pub refresh_enabled: bool,
    /// Delay between two polls of the same device, in seconds.
    pub refresh_interval_secs: u64,
    /// Serial numbers never registered, even when discovered.
    pub ignored_devices: Vec<SerialNumber>,
    /// Periodically log the devices that are on.
    pub report_enabled: bool,
    /// Delay between two reports, in seconds.
    pub report_interval_secs: u64,
    /// Switch groups; the first serial of each group is its primary.
    ///
    /// Kept raw so a malformed group is rejected on its own when the
    /// topology is built.
    pub groups: Vec<Vec<String>>,
    /// Only register devices that belong to a group.
    pub switches_only: bool,
    /// How long a propagated write suppresses echoes from its target, in seconds.
    pub race_timeout_secs: u64,
    /// Delay before logging a grouped device's peers, in seconds.
    pub group_status_delay_secs: u64,
    /// Upper bound for any single transport call, in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            discover_initial_attempts: 6,
            discover_initial_interval_secs: 15,
            discover_interval_secs: 120,
            refresh_enabled: true,
            refresh_interval_secs: 60,
            ignored_devices: Vec::new(),
            report_enabled: false,
            report_interval_secs: 5,
            groups: Vec::new(),
            switches_only: false,
            race_timeout_secs: 5,
            group_status_delay_secs: 5,
            rpc_timeout_secs: 10,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn discover_initial_interval(&self) -> Duration {
        Duration::from_secs(self.discover_initial_interval_secs)
    }

    #[must_use]
    pub fn discover_interval(&self) -> Duration {
        Duration::from_secs(self.discover_interval_secs)
    }

    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    #[must_use]
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    #[must_use]
    pub fn race_timeout(&self) -> Duration {
        Duration::from_secs(self.race_timeout_secs)
    }

    #[must_use]
    pub fn group_status_delay(&self) -> Duration {
        Duration::from_secs(self.group_status_delay_secs)
    }

    #[must_use]
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// Whether discovery results for `serial` are dropped.
    #[must_use]
    pub fn is_ignored(&self, serial: &SerialNumber) -> bool {
        self.ignored_devices.contains(serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use threeway_domain::error::ValidationError;
    use threeway_domain::group::GroupTopology;

    #[test]
    fn should_have_sensible_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.discover_initial_attempts, 6);
        assert_eq!(config.discover_initial_interval(), Duration::from_secs(15));
        assert_eq!(config.discover_interval(), Duration::from_secs(120));
        assert!(config.refresh_enabled);
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert!(!config.report_enabled);
        assert_eq!(config.race_timeout(), Duration::from_secs(5));
        assert!(config.groups.is_empty());
        assert!(!config.switches_only);
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            refresh_interval_secs = 30
            switches_only = true
            ignored_devices = ["deadbeef"]
            groups = [["221517K0101769", "221517K0101770"], ["A1", "B2", "C3"]]
        "#;
        let config: SyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert!(config.switches_only);
        assert_eq!(config.groups.len(), 2);
        assert_eq!(config.groups[1].len(), 3);
        assert_eq!(config.discover_initial_attempts, 6);
    }

    #[test]
    fn should_match_ignored_devices_case_insensitively() {
        let toml = r#"ignored_devices = ["deadbeef"]"#;
        let config: SyncConfig = toml::from_str(toml).unwrap();
        assert!(config.is_ignored(&SerialNumber::new("DEADBEEF").unwrap()));
        assert!(!config.is_ignored(&SerialNumber::new("CAFE").unwrap()));
    }

    #[test]
    fn should_keep_groups_with_blank_serial_for_topology_validation() {
        let toml = r#"groups = [["A", " "], ["B", "C"]]"#;
        let config: SyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.groups.len(), 2);

        let (topology, rejected) = GroupTopology::build(&config.groups);
        assert_eq!(rejected, vec![ValidationError::EmptySerial]);
        assert!(topology.is_primary(&SerialNumber::new("B").unwrap()));
        assert!(!topology.contains(&SerialNumber::new("A").unwrap()));
    }
}
