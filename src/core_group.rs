//! Core groups and the capacity-bounded group table.
//!
//! A core group is a named set of processor cores monitored as a single
//! unit. The table guarantees that no core is monitored by two groups:
//! groups sharing any core are rejected, whether they overlap partially or
//! contain exactly the same cores.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::events::EventMask;
use crate::platform::CpuCore;

/// Maximum number of sockets supported.
pub const MAX_SOCKETS: usize = 8;
/// Maximum number of cores per socket.
pub const MAX_SOCKET_CORES: usize = 64;
/// Maximum number of cores in the system, and in a single group.
pub const MAX_CORES: usize = MAX_SOCKET_CORES * MAX_SOCKETS;
/// Maximum number of groups in a table.
pub const MAX_GROUPS: usize = MAX_CORES;

/// Index of a group inside its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GroupId(pub usize);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relationship between the cores of two groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOverlap {
    /// No core in common.
    Disjoint,
    /// Exactly the same cores.
    Identical,
    /// Some, but not all, cores in common.
    PartialOverlap,
}

/// A named set of cores with the events monitored for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreGroup {
    description: String,
    cores: Vec<u32>,
    events: EventMask,
}

impl CoreGroup {
    /// Creates a group with no events assigned yet.
    pub fn new(description: impl Into<String>, cores: Vec<u32>) -> Self {
        Self {
            description: description.into(),
            cores,
            events: EventMask::empty(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn cores(&self) -> &[u32] {
        &self.cores
    }

    pub fn events(&self) -> EventMask {
        self.events
    }

    /// Classifies how the cores of `self` relate to the cores of `other`.
    ///
    /// Counts the cores of `self` found anywhere in `other`. Both groups are
    /// expected to hold unique cores, which makes the result symmetric.
    pub fn compare(&self, other: &CoreGroup) -> GroupOverlap {
        let found = self
            .cores
            .iter()
            .filter(|core| other.cores.contains(core))
            .count();

        if found == 0 {
            GroupOverlap::Disjoint
        } else if self.cores.len() == other.cores.len() && other.cores.len() == found {
            GroupOverlap::Identical
        } else {
            GroupOverlap::PartialOverlap
        }
    }
}

/// Errors returned when adding a group to a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("core group '{description}' has no cores")]
    EmptyGroup { description: String },

    #[error("core group '{description}' has {count} cores, at most {max} are supported")]
    TooManyCores {
        description: String,
        count: usize,
        max: usize,
    },

    #[error(
        "cannot monitor same cores in different groups: '{description}' and '{existing}' ({overlap:?})"
    )]
    Overlap {
        description: String,
        existing: String,
        overlap: GroupOverlap,
    },

    #[error("too many core groups configured, at most {capacity} are supported")]
    Full { capacity: usize },
}

/// Capacity-bounded collection of pairwise-disjoint core groups.
#[derive(Debug, Clone, Serialize)]
pub struct CoreGroupTable {
    groups: Vec<CoreGroup>,
    #[serde(skip)]
    capacity: usize,
}

impl Default for CoreGroupTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreGroupTable {
    /// Creates an empty table holding at most [`MAX_GROUPS`] groups.
    pub fn new() -> Self {
        Self::with_capacity(MAX_GROUPS)
    }

    /// Creates an empty table with a custom group limit.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            groups: Vec::new(),
            capacity,
        }
    }

    /// Builds a table from candidate groups, assigning `events` to each.
    ///
    /// Any overlapping pair rejects the whole batch. Candidates beyond the
    /// table capacity are dropped with a warning and the table keeps the
    /// groups accepted so far.
    pub fn build(
        groups: impl IntoIterator<Item = CoreGroup>,
        events: EventMask,
        capacity: usize,
    ) -> Result<Self, TableError> {
        let mut table = Self::with_capacity(capacity);

        for group in groups {
            if table.is_full() {
                warn!(
                    "Too many core groups configured, keeping the first {}",
                    table.capacity
                );
                break;
            }
            table.add_group(group.description, group.cores, events)?;
        }

        Ok(table)
    }

    /// Adds a group after checking it against every accepted group.
    pub fn add_group(
        &mut self,
        description: impl Into<String>,
        cores: Vec<u32>,
        events: EventMask,
    ) -> Result<GroupId, TableError> {
        let description = description.into();

        if self.is_full() {
            return Err(TableError::Full {
                capacity: self.capacity,
            });
        }
        if cores.is_empty() {
            return Err(TableError::EmptyGroup { description });
        }
        if cores.len() > MAX_CORES {
            return Err(TableError::TooManyCores {
                description,
                count: cores.len(),
                max: MAX_CORES,
            });
        }

        let candidate = CoreGroup {
            description,
            cores,
            events,
        };

        for existing in &self.groups {
            let overlap = existing.compare(&candidate);
            if overlap != GroupOverlap::Disjoint {
                return Err(TableError::Overlap {
                    description: candidate.description,
                    existing: existing.description.clone(),
                    overlap,
                });
            }
        }

        let id = GroupId(self.groups.len());
        debug!(
            "Core group [{}] accepted as #{} with {} cores",
            candidate.description,
            id,
            candidate.cores.len()
        );
        self.groups.push(candidate);
        Ok(id)
    }

    pub fn get(&self, id: GroupId) -> Option<&CoreGroup> {
        self.groups.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoreGroup> {
        self.groups.iter()
    }

    pub fn groups(&self) -> &[CoreGroup] {
        &self.groups
    }

    /// Number of valid groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.groups.len() >= self.capacity
    }

    /// Drops every group.
    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

/// Builds one single-core group per platform core, in enumeration order.
///
/// Used only when the configuration defines no groups at all. Each group is
/// described by the logical core index.
pub fn default_groups(cores: &[CpuCore]) -> Vec<CoreGroup> {
    cores
        .iter()
        .map(|core| CoreGroup::new(core.lcore.to_string(), vec![core.lcore]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(cores: &[u32]) -> CoreGroup {
        CoreGroup::new(format!("{cores:?}"), cores.to_vec())
    }

    #[test]
    fn compare_classifies_pairs() {
        assert_eq!(group(&[0, 1]).compare(&group(&[1, 2])), GroupOverlap::PartialOverlap);
        assert_eq!(group(&[0, 1]).compare(&group(&[0, 1])), GroupOverlap::Identical);
        assert_eq!(group(&[0, 1]).compare(&group(&[2, 3])), GroupOverlap::Disjoint);
    }

    #[test]
    fn compare_identical_ignores_order() {
        assert_eq!(group(&[3, 1, 2]).compare(&group(&[1, 2, 3])), GroupOverlap::Identical);
    }

    #[test]
    fn compare_subset_is_partial() {
        assert_eq!(group(&[1]).compare(&group(&[1, 2])), GroupOverlap::PartialOverlap);
        assert_eq!(group(&[1, 2]).compare(&group(&[1])), GroupOverlap::PartialOverlap);
    }

    #[test]
    fn compare_is_symmetric() {
        let groups = [
            group(&[0, 1]),
            group(&[1, 2]),
            group(&[0, 1]),
            group(&[2, 3]),
            group(&[1]),
            group(&[0, 1, 2, 3]),
            group(&[7]),
        ];
        for a in &groups {
            for b in &groups {
                assert_eq!(a.compare(b), b.compare(a), "{:?} vs {:?}", a.cores(), b.cores());
            }
        }
    }

    #[test]
    fn build_accepts_disjoint_groups() {
        let table = CoreGroupTable::build(
            vec![group(&[0, 1]), group(&[2, 3]), group(&[4])],
            EventMask::L3_OCCUP,
            MAX_GROUPS,
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert!(table.iter().all(|g| g.events() == EventMask::L3_OCCUP));
        assert_eq!(table.get(GroupId(1)).unwrap().cores(), &[2, 3]);
    }

    #[test]
    fn build_rejects_partial_overlap() {
        let err = CoreGroupTable::build(
            vec![group(&[0, 1]), group(&[4]), group(&[1, 2])],
            EventMask::L3_OCCUP,
            MAX_GROUPS,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            TableError::Overlap {
                overlap: GroupOverlap::PartialOverlap,
                ..
            }
        ));
    }

    #[test]
    fn build_rejects_identical_groups() {
        let err = CoreGroupTable::build(
            vec![CoreGroup::new("a", vec![0, 1]), CoreGroup::new("b", vec![1, 0])],
            EventMask::empty(),
            MAX_GROUPS,
        )
        .unwrap_err();

        assert_eq!(
            err,
            TableError::Overlap {
                description: "b".to_string(),
                existing: "a".to_string(),
                overlap: GroupOverlap::Identical,
            }
        );
    }

    #[test]
    fn build_truncates_at_capacity() {
        let groups = (0..5).map(|i| group(&[i]));
        let table = CoreGroupTable::build(groups, EventMask::empty(), 3).unwrap();

        assert_eq!(table.len(), 3);
        assert!(table.is_full());
        assert_eq!(table.groups()[2].cores(), &[2]);
    }

    #[test]
    fn build_ignores_overlap_past_capacity() {
        let groups = vec![group(&[0]), group(&[1]), group(&[0])];
        let table = CoreGroupTable::build(groups, EventMask::empty(), 2).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn add_group_reports_full() {
        let mut table = CoreGroupTable::with_capacity(1);
        assert_eq!(table.add_group("0", vec![0], EventMask::empty()), Ok(GroupId(0)));
        assert_eq!(
            table.add_group("1", vec![1], EventMask::empty()),
            Err(TableError::Full { capacity: 1 })
        );
    }

    #[test]
    fn add_group_rejects_empty_and_oversized() {
        let mut table = CoreGroupTable::new();
        assert!(matches!(
            table.add_group("none", vec![], EventMask::empty()),
            Err(TableError::EmptyGroup { .. })
        ));

        let huge: Vec<u32> = (0..=MAX_CORES as u32).collect();
        assert!(matches!(
            table.add_group("huge", huge, EventMask::empty()),
            Err(TableError::TooManyCores { .. })
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn default_groups_one_per_core() {
        let cores: Vec<CpuCore> = (0..4)
            .map(|lcore| CpuCore {
                lcore,
                socket: lcore / 2,
            })
            .collect();

        let groups = default_groups(&cores);
        assert_eq!(groups.len(), 4);
        for (i, g) in groups.iter().enumerate() {
            assert_eq!(g.cores(), &[i as u32]);
            assert_eq!(g.description(), i.to_string());
            assert!(g.events().is_empty());
        }

        let table = CoreGroupTable::build(groups, EventMask::PERF_IPC, MAX_GROUPS).unwrap();
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn default_groups_keep_enumeration_order() {
        let cores = [
            CpuCore { lcore: 4, socket: 1 },
            CpuCore { lcore: 0, socket: 0 },
        ];
        let groups = default_groups(&cores);
        assert_eq!(groups[0].description(), "4");
        assert_eq!(groups[1].cores(), &[0]);
    }
}
