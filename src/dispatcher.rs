//! Routes host notifications to mirror sessions and runs deferred tasks.
//!
//! The dispatcher owns every [`MirrorSession`], keyed by source surface,
//! together with the state they share: configuration, the placement
//! strategy and record, the deferred queue and the settings store. Each
//! session call gets a [`MirrorContext`] borrowing that shared state.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::config::MirrorConfig;
use crate::host::{Host, HostEvent, Location, SurfaceId};
use crate::mirror::{MirrorContext, MirrorSession, SyncOutcome};
use crate::placement::{PlacementPolicy, PlacementRecord, SideBySide};
use crate::services::scheduler::{DeferredQueue, DeferredTask};
use crate::services::time_source::SharedTimeSource;
use crate::settings::{MirrorSettings, ScrollMode, SettingsStore, ENABLED, SILENCE_MODIFIED_WARNING};

/// State shared by all sessions, split from the session map so both can be
/// borrowed at once
#[derive(Debug)]
struct Core {
    config: MirrorConfig,
    placement: Box<dyn PlacementPolicy>,
    record: PlacementRecord,
    scheduler: DeferredQueue,
}

impl Core {
    fn cx<'a>(&'a mut self, host: &'a mut dyn Host, foreign: &'a [SurfaceId]) -> MirrorContext<'a> {
        MirrorContext {
            host,
            scheduler: &mut self.scheduler,
            config: &self.config,
            placement: self.placement.as_ref(),
            record: &mut self.record,
            foreign_outputs: foreign,
        }
    }
}

pub struct EventDispatcher {
    core: Core,
    sessions: HashMap<SurfaceId, MirrorSession>,
    store: Box<dyn SettingsStore>,
}

impl EventDispatcher {
    /// Create a dispatcher with the default [`SideBySide`] placement
    pub fn new(config: MirrorConfig, store: Box<dyn SettingsStore>, clock: SharedTimeSource) -> Self {
        let placement = Box::new(SideBySide::new(config.avoid_source_group));
        Self {
            core: Core {
                config,
                placement,
                record: PlacementRecord::default(),
                scheduler: DeferredQueue::new(clock),
            },
            sessions: HashMap::new(),
            store,
        }
    }

    /// Replace the placement strategy
    pub fn with_placement(mut self, placement: Box<dyn PlacementPolicy>) -> Self {
        self.core.placement = placement;
        self
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.core.config
    }

    pub fn session(&self, source: SurfaceId) -> Option<&MirrorSession> {
        self.sessions.get(&source)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn placement_record(&self) -> &PlacementRecord {
        &self.core.record
    }

    pub fn scheduler(&self) -> &DeferredQueue {
        &self.core.scheduler
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    /// Handle one host notification
    pub fn handle(&mut self, host: &mut dyn Host, event: HostEvent) {
        tracing::trace!("Host event: {:?}", event);
        match event {
            HostEvent::Modified { surface } => {
                self.on_modified(host, surface);
            }
            HostEvent::Closed { surface, location } => self.on_closed(host, surface, location),
            HostEvent::BuildLaunched {
                source,
                launched_from,
            } => self.on_build_launched(host, source, launched_from),
            HostEvent::SettingChanged { key } => self.on_setting_changed(&key),
        }
    }

    /// A build started writing to `source`. Starts a session for it, or
    /// restarts the existing one.
    pub fn on_build_launched(&mut self, host: &mut dyn Host, source: SurfaceId, launched_from: SurfaceId) {
        let foreign = self.foreign_outputs(source);
        let namespace = &self.core.config.settings_namespace;
        let store = self.store.as_ref();
        let session = match self.sessions.entry(source) {
            Entry::Occupied(entry) => {
                let session = entry.into_mut();
                session.settings_mut().reload(store);
                session
            }
            Entry::Vacant(entry) => {
                tracing::info!("Mirroring {} launched from {}", source, launched_from);
                entry.insert(MirrorSession::new(
                    source,
                    MirrorSettings::from_store(namespace, store),
                ))
            }
        };

        session.prepare_copy(Some(launched_from), &mut self.core.cx(host, &foreign));

        if self.core.config.hide_panel_on_build {
            let delay = Duration::from_millis(self.core.config.hide_panel_delay_ms);
            self.core
                .scheduler
                .schedule_after(delay, DeferredTask::HidePanel { source });
        }
    }

    /// Run a sync pass for the session mirroring `surface`, if any
    pub fn on_modified(&mut self, host: &mut dyn Host, surface: SurfaceId) -> Option<SyncOutcome> {
        let foreign = self.foreign_outputs(surface);
        let session = self.sessions.get_mut(&surface)?;
        match session.sync_once(&mut self.core.cx(host, &foreign)) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!("Sync pass for {} failed: {}", surface, e);
                None
            }
        }
    }

    pub fn on_closed(&mut self, host: &mut dyn Host, surface: SurfaceId, location: Option<Location>) {
        if let Some(mut session) = self.sessions.remove(&surface) {
            tracing::info!("Source {} closed, ending its session", surface);
            session.on_source_closed(&*host, &mut self.core.record);
            return;
        }

        for session in self.sessions.values_mut() {
            if session.on_closed(surface, location, &mut self.core.record) {
                break;
            }
        }
    }

    /// Forward a settings store change to every session
    pub fn on_setting_changed(&mut self, key: &str) {
        let store = self.store.as_ref();
        let mut changed = 0;
        for session in self.sessions.values_mut() {
            if session.settings_mut().on_store_changed(key, store) {
                changed += 1;
            }
        }
        tracing::debug!("Setting {} changed, {} session(s) updated", key, changed);
    }

    /// Write a setting of the mirror namespace and notify every session.
    ///
    /// `name` is the setting name without namespace, e.g. `"enabled"`.
    pub fn set_setting(&mut self, name: &str, value: Value) {
        let key = format!("{}.{}", self.core.config.settings_namespace, name);
        self.store.set(&key, value);
        self.on_setting_changed(&key);
    }

    /// Flip a boolean setting, returning its new value. `None` if `name` is
    /// not a boolean setting.
    pub fn toggle(&mut self, name: &str) -> Option<bool> {
        let settings =
            MirrorSettings::from_store(&self.core.config.settings_namespace, self.store.as_ref());
        let setting = match name {
            ENABLED => &settings.enabled,
            SILENCE_MODIFIED_WARNING => &settings.silence_modified_warning,
            _ => {
                tracing::debug!("{} is not a boolean setting", name);
                return None;
            }
        };
        let value = !setting.get();
        setting.write_to(self.store.as_mut(), value);
        let key = setting.key().to_string();
        self.on_setting_changed(&key);
        Some(value)
    }

    pub fn set_scroll_mode(&mut self, mode: ScrollMode) {
        let settings =
            MirrorSettings::from_store(&self.core.config.settings_namespace, self.store.as_ref());
        settings.scroll.write_to(self.store.as_mut(), mode);
        let key = settings.scroll.key().to_string();
        self.on_setting_changed(&key);
    }

    /// Run every deferred task that is due. Returns how many ran.
    pub fn run_due_tasks(&mut self, host: &mut dyn Host) -> usize {
        let mut ran = 0;
        while let Some(task) = self.core.scheduler.pop_due() {
            ran += 1;
            match task {
                DeferredTask::CreateDestination { source } => {
                    let foreign = self.foreign_outputs(source);
                    let Some(session) = self.sessions.get_mut(&source) else {
                        tracing::debug!("Dropping output creation for ended session {}", source);
                        continue;
                    };
                    session.create_deferred(&mut self.core.cx(host, &foreign));
                }
                DeferredTask::HidePanel { source } => {
                    if !self.sessions.contains_key(&source) {
                        tracing::debug!("Keeping panel shown for ended session {}", source);
                        continue;
                    }
                    host.hide_panel();
                }
                DeferredTask::RestoreScroll { source, surface } => {
                    let Some(session) = self.sessions.get_mut(&source) else {
                        tracing::debug!("Dropping scroll restore for ended session {}", source);
                        continue;
                    };
                    session.restore_scroll(surface, host);
                }
            }
        }
        ran
    }

    /// Outputs of every session except the one mirroring `source`
    fn foreign_outputs(&self, source: SurfaceId) -> Vec<SurfaceId> {
        self.sessions
            .iter()
            .filter(|(id, _)| **id != source)
            .filter_map(|(_, session)| session.output())
            .collect()
    }
}
