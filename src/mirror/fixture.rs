//! Test harness for mirror session tests: a one-group window with a
//! launcher surface and a source panel, plus everything a
//! [`MirrorContext`] borrows.

use std::sync::Arc;
use std::time::Duration;

use super::{MirrorContext, MirrorSession};
use crate::config::MirrorConfig;
use crate::host::{MemoryHost, SurfaceId};
use crate::placement::{PlacementRecord, SideBySide};
use crate::services::scheduler::{DeferredQueue, DeferredTask};
use crate::services::time_source::TestTimeSource;
use crate::settings::{MemorySettingsStore, MirrorSettings};

pub(crate) struct Fixture {
    pub host: MemoryHost,
    /// Surface the build is launched from, at (0, 0)
    pub launcher: SurfaceId,
    /// The build output panel being mirrored
    pub source: SurfaceId,
    pub clock: Arc<TestTimeSource>,
    pub scheduler: DeferredQueue,
    pub config: MirrorConfig,
    pub placement: SideBySide,
    pub record: PlacementRecord,
    pub foreign: Vec<SurfaceId>,
}

impl Fixture {
    pub fn new() -> Self {
        let mut host = MemoryHost::new(1);
        let launcher = host.open_surface(0, "fn main() {}\n");
        let source = host.open_panel();
        let clock = TestTimeSource::shared();
        let scheduler = DeferredQueue::new(clock.clone());
        Self {
            host,
            launcher,
            source,
            clock,
            scheduler,
            config: MirrorConfig::default(),
            placement: SideBySide::default(),
            record: PlacementRecord::default(),
            foreign: Vec::new(),
        }
    }

    pub fn cx(&mut self) -> MirrorContext<'_> {
        MirrorContext {
            host: &mut self.host,
            scheduler: &mut self.scheduler,
            config: &self.config,
            placement: &self.placement,
            record: &mut self.record,
            foreign_outputs: &self.foreign,
        }
    }

    /// A session right after a build launch from the launcher
    pub fn launched_session(&mut self) -> MirrorSession {
        let settings = MirrorSettings::from_store(
            &self.config.settings_namespace,
            &MemorySettingsStore::new(),
        );
        let mut session = MirrorSession::new(self.source, settings);
        let launcher = self.launcher;
        session.prepare_copy(Some(launcher), &mut self.cx());
        session
    }

    /// Append build output to the source panel
    pub fn append(&mut self, text: &str) {
        self.host
            .append(self.source, text)
            .expect("source panel is open");
    }

    /// Let the creation delay pass and run the queued creation, if any
    pub fn run_creation(&mut self, session: &mut MirrorSession) -> Option<SurfaceId> {
        self.clock
            .advance(Duration::from_millis(self.config.creation_delay_ms));
        let mut created = None;
        while let Some(task) = self.scheduler.pop_due() {
            if let DeferredTask::CreateDestination { .. } = task {
                created = session.create_deferred(&mut self.cx());
            }
        }
        created
    }
}
