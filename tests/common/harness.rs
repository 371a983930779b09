//! Drives an [`EventDispatcher`] against an in-memory window the way a host
//! editor would: notifications go in, deferred tasks run as time passes.

use buildview::host::{Host, HostEvent, Location, MemoryHost, SurfaceId};
use buildview::services::time_source::TestTimeSource;
use buildview::settings::MemorySettingsStore;
use buildview::{EventDispatcher, MirrorConfig, MirrorSession};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a [`MirrorTestHarness`]
pub struct HarnessOptions {
    pub groups: usize,
    pub config: MirrorConfig,
    pub store: MemorySettingsStore,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            groups: 1,
            config: MirrorConfig::default(),
            store: MemorySettingsStore::new(),
        }
    }
}

impl HarnessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_config(mut self, config: MirrorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, store: MemorySettingsStore) -> Self {
        self.store = store;
        self
    }
}

pub struct MirrorTestHarness {
    pub host: MemoryHost,
    pub clock: Arc<TestTimeSource>,
    pub dispatcher: EventDispatcher,
    /// Code surface builds are launched from, first in group 0
    pub launcher: SurfaceId,
    /// The output panel the build writes to
    pub source: SurfaceId,
}

impl MirrorTestHarness {
    pub fn new() -> Self {
        Self::create(HarnessOptions::new())
    }

    pub fn create(options: HarnessOptions) -> Self {
        super::tracing::init_tracing_from_env();

        let mut host = MemoryHost::new(options.groups);
        let launcher = host.open_surface(0, "fn main() {}\n");
        let source = host.open_panel();
        let clock = TestTimeSource::shared();
        let dispatcher =
            EventDispatcher::new(options.config, Box::new(options.store), clock.clone());
        Self {
            host,
            clock,
            dispatcher,
            launcher,
            source,
        }
    }

    pub fn launch(&mut self) {
        self.launch_from(self.launcher);
    }

    pub fn launch_from(&mut self, launched_from: SurfaceId) {
        let event = HostEvent::BuildLaunched {
            source: self.source,
            launched_from,
        };
        self.dispatcher.handle(&mut self.host, event);
    }

    /// Append build output and deliver the modification notification
    pub fn write(&mut self, text: &str) {
        self.host.append(self.source, text).unwrap();
        self.notify_modified();
    }

    /// Replace the whole source text, as a host restarting a build does
    pub fn reset_source(&mut self, text: &str) {
        self.host.set_text(self.source, text).unwrap();
    }

    pub fn notify_modified(&mut self) {
        let event = HostEvent::Modified {
            surface: self.source,
        };
        self.dispatcher.handle(&mut self.host, event);
    }

    /// Let `ms` milliseconds pass and run due tasks. Returns how many ran.
    pub fn wait(&mut self, ms: u64) -> usize {
        self.clock.advance(Duration::from_millis(ms));
        self.dispatcher.run_due_tasks(&mut self.host)
    }

    /// Run deferred tasks until none is left
    pub fn settle(&mut self) {
        while let Some(due_in) = self.dispatcher.scheduler().next_due_in() {
            self.clock.advance(due_in);
            self.dispatcher.run_due_tasks(&mut self.host);
        }
    }

    /// Close a surface as the user would and deliver the notification
    pub fn user_close(&mut self, id: SurfaceId) {
        let event = self.host.user_close(id).expect("surface is open");
        self.dispatcher.handle(&mut self.host, event);
    }

    pub fn session(&self) -> Option<&MirrorSession> {
        self.dispatcher.session(self.source)
    }

    pub fn output(&self) -> Option<SurfaceId> {
        self.session()?.output()
    }

    pub fn output_text(&self) -> Option<&str> {
        self.host.text(self.output()?)
    }

    pub fn output_location(&self) -> Option<Location> {
        self.host.location(self.output()?).ok()
    }
}
