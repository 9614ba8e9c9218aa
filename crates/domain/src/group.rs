//! Switch groups: sets of devices wired to one physical circuit.
//!
//! A [`GroupTopology`] is built once from configuration and never changes
//! afterwards. The first member of each group is its *primary*: during
//! refresh the primary's polled state is authoritative for the whole group.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::ValidationError;
use crate::id::SerialNumber;

/// One 3-way (or n-way) switch group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    members: Vec<SerialNumber>,
}

impl Group {
    /// Members in configuration order; the first is the primary.
    #[must_use]
    pub fn members(&self) -> &[SerialNumber] {
        &self.members
    }

    #[must_use]
    pub fn primary(&self) -> &SerialNumber {
        &self.members[0]
    }
}

/// Immutable lookup from a device to its group peers.
#[derive(Debug, Clone, Default)]
pub struct GroupTopology {
    groups: Vec<Group>,
    index: HashMap<SerialNumber, usize>,
}

impl GroupTopology {
    /// Build the topology from ordered group definitions.
    ///
    /// Invalid groups are skipped and reported rather than aborting the
    /// build: a group with a blank serial, with fewer than two members, or
    /// one that repeats a serial (within itself or from an earlier group),
    /// is rejected as a whole. An empty definition list yields an empty
    /// topology and a [`ValidationError::NoGroups`] report.
    #[must_use]
    pub fn build<S: AsRef<str>>(definitions: &[Vec<S>]) -> (Self, Vec<ValidationError>) {
        let mut topology = Self::default();
        let mut rejected = Vec::new();

        if definitions.is_empty() {
            rejected.push(ValidationError::NoGroups);
        }

        for raw in definitions {
            let checked = raw
                .iter()
                .map(SerialNumber::new)
                .collect::<Result<Vec<_>, _>>()
                .and_then(|members| topology.check(&members).map(|()| members));
            match checked {
                Ok(members) => topology.push(members),
                Err(err) => rejected.push(err),
            }
        }

        (topology, rejected)
    }

    fn check(&self, members: &[SerialNumber]) -> Result<(), ValidationError> {
        if members.len() < 2 {
            return Err(ValidationError::GroupTooSmall {
                members: members.len(),
            });
        }
        for (pos, serial) in members.iter().enumerate() {
            if self.index.contains_key(serial) || members[..pos].contains(serial) {
                return Err(ValidationError::DuplicateMember {
                    serial: serial.clone(),
                });
            }
        }
        Ok(())
    }

    fn push(&mut self, members: Vec<SerialNumber>) {
        let position = self.groups.len();
        for serial in &members {
            self.index.insert(serial.clone(), position);
        }
        self.groups.push(Group { members });
    }

    /// The group containing `serial`, if any.
    #[must_use]
    pub fn group_of(&self, serial: &SerialNumber) -> Option<&Group> {
        self.index.get(serial).map(|&position| &self.groups[position])
    }

    #[must_use]
    pub fn contains(&self, serial: &SerialNumber) -> bool {
        self.index.contains_key(serial)
    }

    /// Other members of `serial`'s group, in configuration order.
    ///
    /// Empty when the device is not grouped.
    pub fn peers_of<'a>(
        &'a self,
        serial: &'a SerialNumber,
    ) -> impl Iterator<Item = &'a SerialNumber> + 'a {
        self.group_of(serial)
            .into_iter()
            .flat_map(move |group| group.members.iter().filter(move |m| *m != serial))
    }

    /// Whether `serial` is the first member of its group.
    #[must_use]
    pub fn is_primary(&self, serial: &SerialNumber) -> bool {
        self.group_of(serial)
            .is_some_and(|group| group.primary() == serial)
    }

    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sn(value: &str) -> SerialNumber {
        SerialNumber::new(value).unwrap()
    }

    fn group(values: &[&str]) -> Vec<SerialNumber> {
        values.iter().map(|v| sn(v)).collect()
    }

    #[test]
    fn should_return_peers_in_configuration_order() {
        let (topology, rejected) = GroupTopology::build(&[group(&["A", "B", "C"])]);
        assert!(rejected.is_empty());

        let peers: Vec<_> = topology.peers_of(&sn("B")).cloned().collect();
        assert_eq!(peers, vec![sn("A"), sn("C")]);
    }

    #[test]
    fn should_return_no_peers_for_ungrouped_device() {
        let (topology, _) = GroupTopology::build(&[group(&["A", "B"])]);
        assert_eq!(topology.peers_of(&sn("Z")).count(), 0);
        assert!(!topology.contains(&sn("Z")));
    }

    #[test]
    fn should_designate_first_member_as_primary() {
        let (topology, _) = GroupTopology::build(&[group(&["A", "B"]), group(&["C", "D"])]);
        assert!(topology.is_primary(&sn("A")));
        assert!(!topology.is_primary(&sn("B")));
        assert!(topology.is_primary(&sn("C")));
        assert!(!topology.is_primary(&sn("Z")));
    }

    #[test]
    fn should_skip_group_with_single_member() {
        let (topology, rejected) = GroupTopology::build(&[group(&["A"]), group(&["B", "C"])]);
        assert_eq!(
            rejected,
            vec![ValidationError::GroupTooSmall { members: 1 }]
        );
        assert_eq!(topology.groups().len(), 1);
        assert!(!topology.contains(&sn("A")));
        assert!(topology.contains(&sn("B")));
    }

    #[test]
    fn should_reject_device_shared_across_groups() {
        let (topology, rejected) =
            GroupTopology::build(&[group(&["A", "B"]), group(&["B", "C"])]);
        assert_eq!(
            rejected,
            vec![ValidationError::DuplicateMember { serial: sn("B") }]
        );
        assert!(!topology.contains(&sn("C")));
        let peers: Vec<_> = topology.peers_of(&sn("B")).cloned().collect();
        assert_eq!(peers, vec![sn("A")]);
    }

    #[test]
    fn should_reject_device_repeated_within_group() {
        let (topology, rejected) = GroupTopology::build(&[group(&["A", "A"])]);
        assert_eq!(
            rejected,
            vec![ValidationError::DuplicateMember { serial: sn("A") }]
        );
        assert!(topology.is_empty());
    }

    #[test]
    fn should_skip_only_the_group_with_a_blank_serial() {
        let definitions = vec![
            vec!["a".to_string(), " ".to_string()],
            vec!["b".to_string(), "c".to_string()],
        ];
        let (topology, rejected) = GroupTopology::build(&definitions);
        assert_eq!(rejected, vec![ValidationError::EmptySerial]);
        assert_eq!(topology.groups().len(), 1);
        assert!(!topology.contains(&sn("A")));
        assert!(topology.is_primary(&sn("B")));
    }

    #[test]
    fn should_normalise_serials_from_configuration() {
        let (topology, rejected) = GroupTopology::build(&[vec![" aa1 ", "Bb2"]]);
        assert!(rejected.is_empty());
        assert_eq!(topology.groups()[0].members(), &[sn("AA1"), sn("BB2")]);
    }

    #[test]
    fn should_report_missing_groups() {
        let (topology, rejected) = GroupTopology::build::<String>(&[]);
        assert!(topology.is_empty());
        assert_eq!(rejected, vec![ValidationError::NoGroups]);
    }
}
