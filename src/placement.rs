//! Placement of a newly created output surface.
//!
//! Placement is a strategy: the lifecycle asks a [`PlacementPolicy`] for a
//! [`Location`] given a snapshot of the window layout, the location of the
//! surface that launched the build, and the [`PlacementRecord`] of where
//! the user last left an output surface.

use crate::host::{Host, Location};

/// Shape of one group at the time of placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupTopology {
    /// Number of surfaces in the group
    pub len: usize,
    /// Index of the active surface, if any
    pub active: Option<usize>,
}

/// Snapshot of the window layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowTopology {
    pub groups: Vec<GroupTopology>,
}

impl WindowTopology {
    pub fn new(groups: Vec<GroupTopology>) -> Self {
        Self { groups }
    }

    /// Read the current layout from the host
    pub fn capture(host: &dyn Host) -> Self {
        let groups = (0..host.group_count())
            .map(|group| {
                let surfaces = host.surfaces_in_group(group);
                let active = host
                    .active_surface_in_group(group)
                    .and_then(|id| surfaces.iter().position(|s| *s == id));
                GroupTopology {
                    len: surfaces.len(),
                    active,
                }
            })
            .collect();
        Self { groups }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Whether `location` can be addressed: the group exists and the index
    /// is at most one past its last surface
    pub fn is_valid(&self, location: Location) -> bool {
        self.groups
            .get(location.group)
            .is_some_and(|g| location.index <= g.len)
    }

    fn clamp(&self, location: Location) -> Location {
        let len = self.groups.get(location.group).map_or(0, |g| g.len);
        Location::new(location.group, location.index.min(len))
    }
}

/// Where the output surface was when it was last closed.
///
/// Lives as long as the dispatcher; it is not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementRecord {
    pub last_placed: Option<Location>,
}

impl PlacementRecord {
    pub fn record(&mut self, location: Location) {
        tracing::debug!("Remembering output location {}", location);
        self.last_placed = Some(location);
    }
}

/// Strategy deciding where a new output surface goes
pub trait PlacementPolicy: std::fmt::Debug {
    fn choose_location(
        &self,
        topology: &WindowTopology,
        source: Option<Location>,
        record: &PlacementRecord,
    ) -> Location;
}

/// Default strategy:
///
/// 1. the remembered location, when it is still valid;
/// 2. otherwise, with several groups, after the active surface of the
///    lowest-numbered group other than the source's;
/// 3. otherwise right after the source surface in its own group.
///
/// The index is always clamped to the size of the target group.
#[derive(Debug, Clone, Copy, Default)]
pub struct SideBySide {
    /// Ignore a remembered location that falls in the source's group
    pub avoid_source_group: bool,
}

impl SideBySide {
    pub fn new(avoid_source_group: bool) -> Self {
        Self { avoid_source_group }
    }

    fn remembered(
        &self,
        topology: &WindowTopology,
        source: Option<Location>,
        record: &PlacementRecord,
    ) -> Option<Location> {
        let last = record.last_placed?;
        if !topology.is_valid(last) {
            return None;
        }
        let in_source_group = source.is_some_and(|s| s.group == last.group);
        if self.avoid_source_group && in_source_group && topology.group_count() > 1 {
            return None;
        }
        Some(last)
    }
}

impl PlacementPolicy for SideBySide {
    fn choose_location(
        &self,
        topology: &WindowTopology,
        source: Option<Location>,
        record: &PlacementRecord,
    ) -> Location {
        if let Some(last) = self.remembered(topology, source, record) {
            return last;
        }

        let source_group = source.map_or(0, |s| s.group);

        if topology.group_count() > 1 {
            let other = topology
                .groups
                .iter()
                .enumerate()
                .find(|(index, _)| *index != source_group);
            if let Some((group, shape)) = other {
                let index = shape.active.map_or(shape.len, |active| active + 1);
                return topology.clamp(Location::new(group, index));
            }
        }

        let index = match source {
            Some(source) => source.index + 1,
            None => topology.groups.first().map_or(0, |g| g.len),
        };
        topology.clamp(Location::new(source_group, index))
    }
}
