//! Incremental synchronization pass.
//!
//! Every pass copies only `[source_cursor, source_len)`. The delta is
//! written with a tail *replace* rather than an append, so an edit made to
//! the mirrored tail of the output between passes is overwritten and the
//! output converges back to the source.

use std::cell::Cell;
use std::ops::Range;
use std::rc::Rc;

use super::{MirrorContext, MirrorSession};
use crate::host::{Host, HostError, HostResult, SurfaceId};

/// Read access to the source stream
pub trait SourceSnapshot {
    /// Length in characters
    fn len(&self) -> HostResult<usize>;

    fn substring(&self, range: Range<usize>) -> HostResult<String>;

    fn is_empty(&self) -> HostResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl SourceSnapshot for str {
    fn len(&self) -> HostResult<usize> {
        Ok(self.chars().count())
    }

    fn substring(&self, range: Range<usize>) -> HostResult<String> {
        Ok(self
            .chars()
            .skip(range.start)
            .take(range.end.saturating_sub(range.start))
            .collect())
    }
}

/// A source surface read through the host
pub struct HostSnapshot<'a> {
    host: &'a dyn Host,
    id: SurfaceId,
}

impl<'a> HostSnapshot<'a> {
    pub fn new(host: &'a dyn Host, id: SurfaceId) -> Self {
        Self { host, id }
    }
}

impl SourceSnapshot for HostSnapshot<'_> {
    fn len(&self) -> HostResult<usize> {
        self.host.surface_len(self.id)
    }

    fn substring(&self, range: Range<usize>) -> HostResult<String> {
        self.host.read(self.id, range)
    }
}

/// Result of one call to [`MirrorSession::sync_once`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another pass was running; the next one catches up
    Dropped,
    /// Mirroring is disabled; the cursor was left behind
    Paused,
    /// The output surface does not exist yet; text went to the pending buffer
    Buffered { chars: usize },
    /// The output surface range `range` was replaced
    Applied { range: Range<usize> },
}

/// Source text not yet mirrored
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Delta {
    /// Source range `text` was read from
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// Cursor before the source shrank under it; the delta then starts at 0
    pub shrunk_from: Option<usize>,
}

impl Delta {
    pub(super) fn capture<S: SourceSnapshot + ?Sized>(source: &S, prev: usize) -> HostResult<Self> {
        let now = source.len()?;
        if now < prev {
            tracing::warn!(
                "Source shrank from {} to {} characters without a new build, resynchronizing",
                prev,
                now
            );
            return Ok(Self {
                start: 0,
                end: now,
                text: source.substring(0..now)?,
                shrunk_from: Some(prev),
            });
        }
        Ok(Self {
            start: prev,
            end: now,
            text: source.substring(prev..now)?,
            shrunk_from: None,
        })
    }
}

/// Marks a pass as running until dropped
struct PassGuard {
    flag: Rc<Cell<bool>>,
}

impl PassGuard {
    fn acquire(flag: &Rc<Cell<bool>>) -> Option<Self> {
        if flag.get() {
            return None;
        }
        flag.set(true);
        Some(Self { flag: flag.clone() })
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

impl MirrorSession {
    /// Copy whatever the source gained since the last pass.
    ///
    /// Returns an error only when the source surface itself cannot be read.
    pub fn sync_once(&mut self, cx: &mut MirrorContext<'_>) -> HostResult<SyncOutcome> {
        let Some(_pass) = PassGuard::acquire(&self.running) else {
            tracing::trace!("Sync pass for {} already running, dropping", self.source);
            return Ok(SyncOutcome::Dropped);
        };

        if !self.settings.enabled.get() {
            return Ok(SyncOutcome::Paused);
        }

        let prev = self.source_cursor;
        let delta = Delta::capture(&HostSnapshot::new(&*cx.host, self.source), prev)?;

        if self.creation_in_flight {
            return Ok(self.buffer(delta));
        }

        match self.live_output(&*cx.host) {
            Some(output) => self.apply(output, delta, cx),
            None => self.rebuild_output(delta, cx),
        }
    }

    fn buffer(&mut self, delta: Delta) -> SyncOutcome {
        if delta.shrunk_from.is_some() {
            self.pending.clear();
        }
        let chars = delta.end - delta.start;
        self.pending.push_str(&delta.text);
        self.source_cursor = delta.end;
        SyncOutcome::Buffered { chars }
    }

    /// The output is gone (or was never created): request a new one and
    /// buffer the full source text for it
    fn rebuild_output(
        &mut self,
        delta: Delta,
        cx: &mut MirrorContext<'_>,
    ) -> HostResult<SyncOutcome> {
        self.request_creation(cx);
        self.pending = match delta.shrunk_from {
            Some(_) => String::new(),
            None => HostSnapshot::new(&*cx.host, self.source).substring(0..delta.start)?,
        };
        Ok(self.buffer(Delta {
            shrunk_from: None,
            ..delta
        }))
    }

    fn apply(
        &mut self,
        output: SurfaceId,
        delta: Delta,
        cx: &mut MirrorContext<'_>,
    ) -> HostResult<SyncOutcome> {
        let output_len = cx.host.surface_len(output).unwrap_or(0);
        let (start, end) = match delta.shrunk_from {
            Some(old_cursor) => (0, old_cursor.min(output_len)),
            None => (delta.start.min(output_len), delta.end.min(output_len)),
        };

        match cx.host.replace(output, start..end, &delta.text) {
            Ok(()) => {}
            Err(HostError::SurfaceGone(_)) => {
                tracing::debug!("Output {} vanished during a pass, recreating", output);
                self.output = None;
                return self.rebuild_output(delta, cx);
            }
            Err(e) => {
                tracing::warn!("Failed to write to output {}: {}", output, e);
                return Err(e);
            }
        }

        self.source_cursor = delta.end;
        self.follow_scroll(output, cx);

        let written = delta.text.chars().count();
        Ok(SyncOutcome::Applied {
            range: start..start + written,
        })
    }
}
