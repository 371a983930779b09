//! Mirror sessions.
//!
//! A [`MirrorSession`] binds one source stream to its output surface for
//! the duration of a build. Its behavior is spread over a few files:
//! - `sync`: the incremental copy pass run on every source modification
//! - `lifecycle`: deferred creation, reuse and loss of the output surface
//! - `scroll`: how the output follows new content

#[cfg(test)]
pub(crate) mod fixture;
mod lifecycle;
mod scroll;
mod sync;

pub use sync::{HostSnapshot, SourceSnapshot, SyncOutcome};

use std::cell::Cell;
use std::ops::Range;
use std::rc::Rc;

use crate::config::MirrorConfig;
use crate::host::{Host, ScrollPosition, SurfaceId};
use crate::placement::{PlacementPolicy, PlacementRecord};
use crate::services::scheduler::DeferredQueue;
use crate::settings::MirrorSettings;

use scroll::ScrollFollow;

/// Everything a session borrows from its owner for the length of one call
pub struct MirrorContext<'a> {
    pub host: &'a mut dyn Host,
    pub scheduler: &'a mut DeferredQueue,
    pub config: &'a MirrorConfig,
    pub placement: &'a dyn PlacementPolicy,
    pub record: &'a mut PlacementRecord,
    /// Output surfaces of other live sessions; stale cleanup leaves them alone
    pub foreign_outputs: &'a [SurfaceId],
}

/// The live binding between one source stream and its output surface
#[derive(Debug)]
pub struct MirrorSession {
    source: SurfaceId,

    /// Characters of the source already applied to `output` or `pending`
    source_cursor: usize,

    /// The output surface, once created. The host owns it; the user may
    /// close it at any time.
    output: Option<SurfaceId>,

    /// Source text received while the output surface does not exist yet
    pending: String,

    creation_in_flight: bool,

    /// Set while a sync pass runs
    running: Rc<Cell<bool>>,

    /// Viewport and selection of the output before it was cleared for the
    /// current build
    last_scroll: Option<ScrollPosition>,
    last_selection: Vec<Range<usize>>,

    /// Surface the current build was launched from
    launched_from: Option<SurfaceId>,

    settings: MirrorSettings,

    scroll: ScrollFollow,
}

impl MirrorSession {
    pub fn new(source: SurfaceId, settings: MirrorSettings) -> Self {
        Self {
            source,
            source_cursor: 0,
            output: None,
            pending: String::new(),
            creation_in_flight: false,
            running: Rc::new(Cell::new(false)),
            last_scroll: None,
            last_selection: Vec::new(),
            launched_from: None,
            settings,
            scroll: ScrollFollow::default(),
        }
    }

    pub fn source(&self) -> SurfaceId {
        self.source
    }

    pub fn source_cursor(&self) -> usize {
        self.source_cursor
    }

    /// The output surface as last known; it may have been closed since
    pub fn output(&self) -> Option<SurfaceId> {
        self.output
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn creation_in_flight(&self) -> bool {
        self.creation_in_flight
    }

    pub fn launched_from(&self) -> Option<SurfaceId> {
        self.launched_from
    }

    pub fn last_scroll(&self) -> Option<ScrollPosition> {
        self.last_scroll
    }

    pub fn last_selection(&self) -> &[Range<usize>] {
        &self.last_selection
    }

    pub fn settings(&self) -> &MirrorSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut MirrorSettings {
        &mut self.settings
    }
}
