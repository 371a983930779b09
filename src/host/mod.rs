//! Host collaborator contract.
//!
//! The mirror never owns editor surfaces. Everything it does to the
//! outside world goes through [`Host`]: reading the source panel, writing
//! the output surface, moving it between groups and scrolling it.
//! Offsets are character offsets into the surface text.
//!
//! [`MemoryHost`] is a complete in-memory implementation used by the
//! tests and by the replay binary.

pub mod memory;

pub use memory::MemoryHost;

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Unique identifier for a surface (a buffer shown in a view, or a panel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub usize);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Surface-{}", self.0)
    }
}

/// A (group, index) position inside a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub group: usize,
    pub index: usize,
}

impl Location {
    pub fn new(group: usize, index: usize) -> Self {
        Self { group, index }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.group, self.index)
    }
}

/// Scroll position of a view, as the first visible line and column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub top_line: usize,
    pub left_column: usize,
}

/// Notifications the host delivers to the mirror
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The text of a surface changed
    Modified { surface: SurfaceId },

    /// A surface was closed. `location` is where it sat just before closing
    /// (`None` for panels).
    Closed {
        surface: SurfaceId,
        location: Option<Location>,
    },

    /// A build was started from `launched_from`; its output goes to `source`
    BuildLaunched {
        source: SurfaceId,
        launched_from: SurfaceId,
    },

    /// A value in the settings store changed. `key` is either a full
    /// setting key or a whole namespace.
    SettingChanged { key: String },
}

/// Errors returned by host operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The surface no longer exists (closed by the user or never created)
    SurfaceGone(SurfaceId),
    /// The surface is not placed in any group (e.g. an output panel)
    NotPlaced(SurfaceId),
    /// A range or location does not fit the current state
    OutOfRange(String),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::SurfaceGone(id) => write!(f, "{id} no longer exists"),
            HostError::NotPlaced(id) => write!(f, "{id} is not placed in a group"),
            HostError::OutOfRange(msg) => write!(f, "Out of range: {msg}"),
        }
    }
}

impl std::error::Error for HostError {}

pub type HostResult<T> = Result<T, HostError>;

/// Everything the mirror needs from the editor it runs in.
///
/// Implementations deliver [`HostEvent`]s separately; none of these
/// methods may call back into the mirror.
pub trait Host {
    // ========================================================================
    // Surface text
    // ========================================================================

    fn surface_len(&self, id: SurfaceId) -> HostResult<usize>;

    fn read(&self, id: SurfaceId, range: Range<usize>) -> HostResult<String>;

    /// Replace `range` with `text`. The end of `range` may not exceed the
    /// surface length.
    fn replace(&mut self, id: SurfaceId, range: Range<usize>, text: &str) -> HostResult<()>;

    fn insert(&mut self, id: SurfaceId, offset: usize, text: &str) -> HostResult<()>;

    fn erase(&mut self, id: SurfaceId, range: Range<usize>) -> HostResult<()>;

    // ========================================================================
    // Surface metadata
    // ========================================================================

    fn exists(&self, id: SurfaceId) -> bool;

    fn display_name(&self, id: SurfaceId) -> Option<String>;

    fn set_display_name(&mut self, id: SurfaceId, name: &str) -> HostResult<()>;

    /// When suppressed, closing the surface never prompts to save changes
    fn set_dirty_suppressed(&mut self, id: SurfaceId, suppressed: bool) -> HostResult<()>;

    fn syntax(&self, id: SurfaceId) -> Option<String>;

    fn set_syntax(&mut self, id: SurfaceId, syntax: &str) -> HostResult<()>;

    /// Per-surface setting, e.g. the regexes used to jump from an error
    /// line to `file:line`
    fn surface_setting(&self, id: SurfaceId, key: &str) -> Option<serde_json::Value>;

    fn set_surface_setting(
        &mut self,
        id: SurfaceId,
        key: &str,
        value: serde_json::Value,
    ) -> HostResult<()>;

    fn close(&mut self, id: SurfaceId) -> HostResult<()>;

    // ========================================================================
    // Position
    // ========================================================================

    fn location(&self, id: SurfaceId) -> HostResult<Location>;

    fn set_location(&mut self, id: SurfaceId, location: Location) -> HostResult<()>;

    // ========================================================================
    // Viewport
    // ========================================================================

    fn viewport(&self, id: SurfaceId) -> HostResult<ScrollPosition>;

    fn set_viewport(&mut self, id: SurfaceId, position: ScrollPosition) -> HostResult<()>;

    fn selection(&self, id: SurfaceId) -> HostResult<Vec<Range<usize>>>;

    fn set_selection(&mut self, id: SurfaceId, selection: Vec<Range<usize>>) -> HostResult<()>;

    /// Scroll so that `offset` is visible
    fn show_offset(&mut self, id: SurfaceId, offset: usize) -> HostResult<()>;

    // ========================================================================
    // Window
    // ========================================================================

    /// Create an empty surface. Where it lands is up to the host.
    fn create_surface(&mut self) -> SurfaceId;

    fn group_count(&self) -> usize;

    fn surfaces_in_group(&self, group: usize) -> Vec<SurfaceId>;

    fn active_surface_in_group(&self, group: usize) -> Option<SurfaceId>;

    /// All open surfaces in the window, panels included
    fn surfaces(&self) -> Vec<SurfaceId>;

    fn focus(&mut self, id: SurfaceId) -> HostResult<()>;

    /// Hide the output panel the host shows when a build starts
    fn hide_panel(&mut self);
}
