//! Scroll follow: where the output viewport goes after new content lands.

use std::time::Duration;

use super::{MirrorContext, MirrorSession};
use crate::host::{Host, SurfaceId};
use crate::services::scheduler::DeferredTask;
use crate::settings::ScrollMode;

/// Per-build scroll state of a session
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct ScrollFollow {
    /// `top` mode already scrolled the current surface
    top_applied: bool,
    /// A `RestoreScroll` task is queued
    restore_pending: bool,
    /// The captured position was already put back for this build
    restore_done: bool,
}

impl ScrollFollow {
    /// Start over for a new or cleared output surface
    pub(super) fn reset(&mut self) {
        self.top_applied = false;
        self.restore_done = false;
    }
}

impl MirrorSession {
    pub(super) fn follow_scroll(&mut self, output: SurfaceId, cx: &mut MirrorContext<'_>) {
        match self.settings.scroll.get() {
            ScrollMode::Top => {
                if self.scroll.top_applied {
                    return;
                }
                self.scroll.top_applied = true;
                if let Err(e) = cx.host.show_offset(output, 0) {
                    tracing::debug!("Could not scroll {} to top: {}", output, e);
                }
            }
            ScrollMode::Bottom => {
                let shown = cx
                    .host
                    .surface_len(output)
                    .and_then(|len| cx.host.show_offset(output, len));
                if let Err(e) = shown {
                    tracing::debug!("Could not scroll {} to bottom: {}", output, e);
                }
            }
            ScrollMode::Last => {
                if self.last_scroll.is_none()
                    || self.scroll.restore_pending
                    || self.scroll.restore_done
                {
                    return;
                }
                self.scroll.restore_pending = true;
                self.scroll.restore_done = true;
                cx.scheduler.schedule_after(
                    Duration::from_millis(cx.config.restore_scroll_delay_ms),
                    DeferredTask::RestoreScroll {
                        source: self.source,
                        surface: output,
                    },
                );
            }
        }
    }

    /// Put back the viewport and selection captured before the output was
    /// cleared. Runs from the deferred queue.
    ///
    /// Does nothing if `surface` is no longer this session's output or the
    /// scroll mode changed in the meantime. Returns whether anything was
    /// restored.
    pub fn restore_scroll(&mut self, surface: SurfaceId, host: &mut dyn Host) -> bool {
        self.scroll.restore_pending = false;
        self.scroll.restore_done = true;

        if self.live_output(&*host) != Some(surface) {
            tracing::debug!("Scroll restore target {} is no longer the output", surface);
            return false;
        }
        if self.settings.scroll.get() != ScrollMode::Last {
            return false;
        }
        let Some(position) = self.last_scroll else {
            return false;
        };

        if let Err(e) = host.set_viewport(surface, position) {
            tracing::debug!("Could not restore viewport of {}: {}", surface, e);
            return false;
        }
        if !self.last_selection.is_empty() {
            if let Err(e) = host.set_selection(surface, self.last_selection.clone()) {
                tracing::debug!("Could not restore selection of {}: {}", surface, e);
            }
        }
        true
    }
}
