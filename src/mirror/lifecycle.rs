//! Output surface lifecycle: reuse on a new build, deferred creation, and
//! forgetting the surface when the user closes it.

use std::time::Duration;

use super::{MirrorContext, MirrorSession};
use crate::host::{Host, Location, SurfaceId};
use crate::placement::{PlacementRecord, WindowTopology};
use crate::services::scheduler::DeferredTask;

impl MirrorSession {
    /// Get ready for a new build launched from `launched_from`.
    ///
    /// An existing output surface is cleared in place and kept, so it stays
    /// where the user put it. Otherwise creation is scheduled out of the
    /// current call stack: the host cannot create surfaces from inside a
    /// modification callback.
    pub fn prepare_copy(&mut self, launched_from: Option<SurfaceId>, cx: &mut MirrorContext<'_>) {
        self.launched_from = launched_from;
        self.source_cursor = 0;
        self.pending.clear();
        self.scroll.reset();

        if let Some(output) = self.live_output(&*cx.host) {
            self.last_scroll = cx.host.viewport(output).ok();
            self.last_selection = cx.host.selection(output).unwrap_or_default();

            let cleared = cx
                .host
                .surface_len(output)
                .and_then(|len| cx.host.erase(output, 0..len));
            match cleared {
                Ok(()) => {
                    tracing::debug!("Reusing output {} for {}", output, self.source);
                    return;
                }
                Err(e) => {
                    tracing::debug!("Could not clear output {}: {}", output, e);
                    self.output = None;
                }
            }
        }

        if !self.creation_in_flight {
            self.request_creation(cx);
        }
    }

    /// Mark creation as in flight and schedule it
    pub(super) fn request_creation(&mut self, cx: &mut MirrorContext<'_>) {
        self.creation_in_flight = true;
        cx.scheduler.schedule_after(
            Duration::from_millis(cx.config.creation_delay_ms),
            DeferredTask::CreateDestination {
                source: self.source,
            },
        );
    }

    /// Create the output surface and flush the pending buffer into it.
    ///
    /// Runs from the deferred queue. Does nothing when the session no longer
    /// waits for a surface. Returns the created surface.
    pub fn create_deferred(&mut self, cx: &mut MirrorContext<'_>) -> Option<SurfaceId> {
        if !self.creation_in_flight {
            tracing::debug!("Creation for {} no longer wanted", self.source);
            return None;
        }
        if let Some(output) = self.live_output(&*cx.host) {
            tracing::debug!("Output {} already exists for {}", output, self.source);
            self.creation_in_flight = false;
            return None;
        }

        self.close_stale_outputs(cx);

        let topology = WindowTopology::capture(&*cx.host);
        let source_location = self
            .launched_from
            .and_then(|id| cx.host.location(id).ok());
        let location = cx
            .placement
            .choose_location(&topology, source_location, &*cx.record);

        let output = cx.host.create_surface();
        self.output = Some(output);
        self.dress_output(output, location, cx);

        self.creation_in_flight = false;
        if let Err(e) = cx.host.insert(output, 0, &self.pending) {
            tracing::warn!("Failed to fill new output {}: {}", output, e);
            self.output = None;
            return None;
        }
        self.pending.clear();

        if cx.config.refocus_launcher {
            if let Some(launcher) = self.launched_from {
                if let Err(e) = cx.host.focus(launcher) {
                    tracing::debug!("Could not refocus {}: {}", launcher, e);
                }
            }
        }

        tracing::info!("Created output {} at {} for {}", output, location, self.source);
        self.follow_scroll(output, cx);
        Some(output)
    }

    /// Name, attributes and position of a fresh output surface
    fn dress_output(&self, output: SurfaceId, location: Location, cx: &mut MirrorContext<'_>) {
        let host = &mut *cx.host;
        let mut results = vec![
            host.set_display_name(output, &cx.config.dest_name),
            host.set_dirty_suppressed(output, self.settings.silence_modified_warning.get()),
        ];

        if let Some(syntax) = host.syntax(self.source) {
            results.push(host.set_syntax(output, &syntax));
        }
        for key in &cx.config.pass_through_settings {
            if let Some(value) = host.surface_setting(self.source, key) {
                results.push(host.set_surface_setting(output, key, value));
            }
        }

        results.push(host.set_location(output, location));

        for e in results.into_iter().filter_map(Result::err) {
            tracing::warn!("Failed to set up output {}: {}", output, e);
        }
    }

    /// Close leftover surfaces carrying the output name, e.g. orphaned by a
    /// host restart. Skipped when too many surfaces are open.
    fn close_stale_outputs(&self, cx: &mut MirrorContext<'_>) {
        let surfaces = cx.host.surfaces();
        if surfaces.len() > cx.config.stale_scan_limit {
            tracing::debug!(
                "{} open surfaces exceed {}, skipping stale output scan",
                surfaces.len(),
                cx.config.stale_scan_limit
            );
            return;
        }

        for id in surfaces {
            if id == self.source || cx.foreign_outputs.contains(&id) {
                continue;
            }
            if cx.host.display_name(id).as_deref() != Some(cx.config.dest_name.as_str()) {
                continue;
            }
            match cx.host.close(id) {
                Ok(()) => tracing::info!("Closed stale output {}", id),
                Err(e) => tracing::debug!("Failed to close stale output {}: {}", id, e),
            }
        }
    }

    /// Forget the output if `surface` is it, remembering where it was.
    /// Returns whether `surface` was this session's output.
    pub fn on_closed(
        &mut self,
        surface: SurfaceId,
        location: Option<Location>,
        record: &mut PlacementRecord,
    ) -> bool {
        if self.output != Some(surface) {
            return false;
        }
        if let Some(location) = location {
            record.record(location);
        }
        self.output = None;
        self.scroll.reset();
        tracing::debug!("Output {} of {} closed", surface, self.source);
        true
    }

    /// The source went away: remember where the output sits for the next
    /// session. The output surface itself stays open.
    pub fn on_source_closed(&mut self, host: &dyn Host, record: &mut PlacementRecord) {
        if let Some(output) = self.live_output(host) {
            if let Ok(location) = host.location(output) {
                record.record(location);
            }
        }
    }

    /// The output surface, if it still exists. A stale handle is dropped.
    pub(super) fn live_output(&mut self, host: &dyn Host) -> Option<SurfaceId> {
        let output = self.output?;
        if host.exists(output) {
            return Some(output);
        }
        tracing::debug!("Output {} of {} is gone", output, self.source);
        self.output = None;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::fixture::Fixture;
    use crate::mirror::SyncOutcome;
    use serde_json::json;

    #[test]
    fn test_prepare_copy_schedules_creation_once() {
        let mut fx = Fixture::new();
        let mut session = fx.launched_session();
        assert!(session.creation_in_flight());
        assert_eq!(fx.scheduler.len(), 1);

        session.prepare_copy(Some(fx.launcher), &mut fx.cx());
        assert_eq!(fx.scheduler.len(), 1, "no duplicate creation request");
    }

    #[test]
    fn test_created_output_is_named_placed_and_dressed() {
        let mut fx = Fixture::new();
        fx.host.set_syntax(fx.source, "Packages/Rust/Build.sublime-syntax").unwrap();
        fx.host
            .set_surface_setting(fx.source, "result_file_regex", json!("^(.+):(\\d+)"))
            .unwrap();
        fx.host
            .set_surface_setting(fx.source, "unrelated", json!(1))
            .unwrap();
        let mut session = fx.launched_session();

        let output = fx.run_creation(&mut session).unwrap();

        let surface = fx.host.surface(output).unwrap();
        assert_eq!(surface.name.as_deref(), Some("Build output"));
        assert!(surface.dirty_suppressed);
        assert_eq!(surface.syntax.as_deref(), Some("Packages/Rust/Build.sublime-syntax"));
        assert_eq!(surface.settings.get("result_file_regex"), Some(&json!("^(.+):(\\d+)")));
        assert!(!surface.settings.contains_key("unrelated"));
        // Single group: right after the launcher
        assert_eq!(fx.host.location(output).unwrap(), Location::new(0, 1));
        assert_eq!(fx.host.focused(), Some(fx.launcher));
    }

    #[test]
    fn test_dirty_suppression_follows_setting() {
        let mut fx = Fixture::new();
        let mut session = fx.launched_session();
        session.settings_mut().silence_modified_warning.set(false);

        let output = fx.run_creation(&mut session).unwrap();
        assert!(!fx.host.surface(output).unwrap().dirty_suppressed);
    }

    #[test]
    fn test_creation_skipped_when_no_longer_in_flight() {
        let mut fx = Fixture::new();
        let mut session = fx.launched_session();
        session.creation_in_flight = false;

        assert_eq!(session.create_deferred(&mut fx.cx()), None);
        assert!(fx.host.surfaces_named("Build output").is_empty());
    }

    #[test]
    fn test_prepare_copy_reuses_and_clears_existing_output() {
        let mut fx = Fixture::new();
        let mut session = fx.launched_session();
        fx.append("first build\n");
        session.sync_once(&mut fx.cx()).unwrap();
        let output = fx.run_creation(&mut session).unwrap();

        let position = crate::host::ScrollPosition {
            top_line: 7,
            left_column: 2,
        };
        fx.host.set_viewport(output, position).unwrap();
        fx.host.set_selection(output, vec![3..5]).unwrap();

        fx.host.set_text(fx.source, "").unwrap();
        session.prepare_copy(Some(fx.launcher), &mut fx.cx());

        assert_eq!(fx.host.text(output), Some(""));
        assert_eq!(session.output(), Some(output));
        assert_eq!(session.source_cursor(), 0);
        assert!(!session.creation_in_flight());
        assert_eq!(session.last_scroll(), Some(position));
        assert_eq!(session.last_selection(), &[3..5]);
        assert!(fx.scheduler.is_empty());

        fx.append("second\n");
        session.sync_once(&mut fx.cx()).unwrap();
        assert_eq!(fx.host.text(output), Some("second\n"));
    }

    #[test]
    fn test_closed_output_is_rebuilt_with_full_content() {
        let mut fx = Fixture::new();
        let mut session = fx.launched_session();
        fx.append("line1\n");
        session.sync_once(&mut fx.cx()).unwrap();
        let output = fx.run_creation(&mut session).unwrap();

        let closed = fx.host.user_close(output).unwrap();
        let crate::host::HostEvent::Closed { surface, location } = closed else {
            panic!("expected a close event");
        };
        assert!(session.on_closed(surface, location, &mut fx.record));
        assert_eq!(fx.record.last_placed, Some(Location::new(0, 1)));
        assert_eq!(session.output(), None);

        fx.append("line2\n");
        let outcome = session.sync_once(&mut fx.cx()).unwrap();
        assert_eq!(outcome, SyncOutcome::Buffered { chars: 6 });
        assert_eq!(session.pending(), "line1\nline2\n");

        let rebuilt = fx.run_creation(&mut session).unwrap();
        assert_ne!(rebuilt, output);
        assert_eq!(fx.host.text(rebuilt), Some("line1\nline2\n"));
    }

    #[test]
    fn test_stale_reference_without_close_event_recovers() {
        let mut fx = Fixture::new();
        let mut session = fx.launched_session();
        fx.append("abc");
        session.sync_once(&mut fx.cx()).unwrap();
        let output = fx.run_creation(&mut session).unwrap();

        fx.host.close(output).unwrap();
        fx.append("def");
        session.sync_once(&mut fx.cx()).unwrap();

        assert!(session.creation_in_flight());
        let rebuilt = fx.run_creation(&mut session).unwrap();
        assert_eq!(fx.host.text(rebuilt), Some("abcdef"));
    }

    #[test]
    fn test_on_closed_ignores_other_surfaces() {
        let mut fx = Fixture::new();
        let mut session = fx.launched_session();
        let output = fx.run_creation(&mut session).unwrap();

        assert!(!session.on_closed(fx.launcher, Some(Location::new(0, 0)), &mut fx.record));
        assert_eq!(session.output(), Some(output));
        assert_eq!(fx.record.last_placed, None);
    }

    #[test]
    fn test_stale_output_with_same_name_is_closed() {
        let mut fx = Fixture::new();
        let orphan = fx.host.open_surface(0, "old");
        fx.host.set_display_name(orphan, "Build output").unwrap();
        let mut session = fx.launched_session();

        let output = fx.run_creation(&mut session).unwrap();

        assert!(!fx.host.exists(orphan));
        assert_eq!(fx.host.surfaces_named("Build output"), vec![output]);
    }

    #[test]
    fn test_other_session_output_survives_stale_scan() {
        let mut fx = Fixture::new();
        let other = fx.host.open_surface(0, "other build");
        fx.host.set_display_name(other, "Build output").unwrap();
        fx.foreign.push(other);
        let mut session = fx.launched_session();

        fx.run_creation(&mut session).unwrap();
        assert!(fx.host.exists(other));
    }

    #[test]
    fn test_stale_scan_skipped_above_limit() {
        let mut fx = Fixture::new();
        fx.config.stale_scan_limit = 2;
        let orphan = fx.host.open_surface(0, "old");
        fx.host.set_display_name(orphan, "Build output").unwrap();
        let mut session = fx.launched_session();

        fx.run_creation(&mut session).unwrap();
        assert!(fx.host.exists(orphan));
    }

    #[test]
    fn test_source_closed_records_output_location() {
        let mut fx = Fixture::new();
        let mut session = fx.launched_session();
        let output = fx.run_creation(&mut session).unwrap();
        fx.host.set_location(output, Location::new(0, 0)).unwrap();

        session.on_source_closed(&fx.host, &mut fx.record);
        assert_eq!(fx.record.last_placed, Some(Location::new(0, 0)));
    }
}
