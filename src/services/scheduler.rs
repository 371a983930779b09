//! Deferred continuations on the single-threaded event queue.
//!
//! Some host operations are unsafe inside a modification callback, so they
//! are scheduled to run later with a fixed delay. Tasks are plain data: the
//! dispatcher pops them once they are due and re-checks, at execution
//! time, that the state which motivated them still holds. Nothing awaits
//! a task and nothing cancels one.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use crate::host::SurfaceId;
use crate::services::time_source::SharedTimeSource;

/// Work deferred out of the current call stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredTask {
    /// Create the output surface of the session mirroring `source`
    CreateDestination { source: SurfaceId },
    /// Hide the build output panel the host just showed for the build
    /// mirrored from `source`
    HidePanel { source: SurfaceId },
    /// Restore the viewport captured before the last build restarted
    RestoreScroll {
        source: SurfaceId,
        surface: SurfaceId,
    },
}

#[derive(Debug)]
struct Scheduled {
    due: Instant,
    seq: u64,
    task: DeferredTask,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed so the max-heap yields the earliest task first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Queue of deferred tasks ordered by due time, then scheduling order
#[derive(Debug)]
pub struct DeferredQueue {
    clock: SharedTimeSource,
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
}

impl DeferredQueue {
    pub fn new(clock: SharedTimeSource) -> Self {
        Self {
            clock,
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Run `task` once `delay` has elapsed
    pub fn schedule_after(&mut self, delay: Duration, task: DeferredTask) {
        let due = self.clock.now() + delay;
        tracing::trace!("Scheduling {:?} in {:?}", task, delay);
        self.heap.push(Scheduled {
            due,
            seq: self.next_seq,
            task,
        });
        self.next_seq += 1;
    }

    /// Take the earliest task whose delay has elapsed
    pub fn pop_due(&mut self) -> Option<DeferredTask> {
        let now = self.clock.now();
        if self.heap.peek().is_some_and(|s| s.due <= now) {
            self.heap.pop().map(|s| s.task)
        } else {
            None
        }
    }

    /// Time left until the next task is due (zero if one is overdue)
    pub fn next_due_in(&self) -> Option<Duration> {
        self.heap
            .peek()
            .map(|s| s.due.saturating_duration_since(self.clock.now()))
    }

    pub fn contains(&self, task: &DeferredTask) -> bool {
        self.heap.iter().any(|s| &s.task == task)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clock(&self) -> &SharedTimeSource {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::time_source::TestTimeSource;
    use std::sync::Arc;

    fn queue() -> (Arc<TestTimeSource>, DeferredQueue) {
        let clock = TestTimeSource::shared();
        let queue = DeferredQueue::new(clock.clone());
        (clock, queue)
    }

    #[test]
    fn test_task_not_due_before_delay() {
        let (clock, mut queue) = queue();
        let hide = DeferredTask::HidePanel {
            source: SurfaceId(1),
        };
        queue.schedule_after(Duration::from_millis(100), hide.clone());

        assert_eq!(queue.pop_due(), None);
        assert_eq!(queue.next_due_in(), Some(Duration::from_millis(100)));

        clock.advance(Duration::from_millis(99));
        assert_eq!(queue.pop_due(), None);

        clock.advance(Duration::from_millis(1));
        assert_eq!(queue.pop_due(), Some(hide));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_due_tasks_run_in_due_then_fifo_order() {
        let (clock, mut queue) = queue();
        let a = DeferredTask::CreateDestination {
            source: SurfaceId(1),
        };
        let b = DeferredTask::CreateDestination {
            source: SurfaceId(2),
        };
        let hide = DeferredTask::HidePanel {
            source: SurfaceId(1),
        };
        queue.schedule_after(Duration::from_millis(500), hide.clone());
        queue.schedule_after(Duration::from_millis(100), a.clone());
        queue.schedule_after(Duration::from_millis(100), b.clone());

        clock.advance(Duration::from_secs(1));
        assert_eq!(queue.pop_due(), Some(a));
        assert_eq!(queue.pop_due(), Some(b));
        assert_eq!(queue.pop_due(), Some(hide));
        assert_eq!(queue.pop_due(), None);
    }

    #[test]
    fn test_contains_pending_task() {
        let (_clock, mut queue) = queue();
        let task = DeferredTask::RestoreScroll {
            source: SurfaceId(1),
            surface: SurfaceId(2),
        };
        assert!(!queue.contains(&task));
        queue.schedule_after(Duration::from_millis(10), task.clone());
        assert!(queue.contains(&task));
        assert_eq!(queue.len(), 1);
    }
}
