//! Deferred, cancellable session tasks on a virtual clock.
//!
//! Nothing here runs on its own: the embedder advances time through
//! `EditorSession::tick`, which drains whatever came due. At most one task
//! per key is pending; scheduling again replaces it, which is what makes a
//! keystroke push the typing debounce further out.

use crate::selection::SelectionDescriptor;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKey {
    SealTypingGroup,
    DeferredFocus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Closes the open typing group so the next keystroke records anew.
    SealTypingGroup,
    /// Places the selection once the rendering layer has settled.
    DeferredFocus(SelectionDescriptor),
}

impl Task {
    pub fn key(&self) -> TaskKey {
        match self {
            Task::SealTypingGroup => TaskKey::SealTypingGroup,
            Task::DeferredFocus(_) => TaskKey::DeferredFocus,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Scheduler {
    pending: BTreeMap<TaskKey, (Duration, Task)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` at `due`. Returns `true` when it replaced a pending
    /// task with the same key.
    pub fn schedule(&mut self, task: Task, due: Duration) -> bool {
        let key = task.key();
        trace!(?key, ?due, "scheduled task");
        self.pending.insert(key, (due, task)).is_some()
    }

    pub fn cancel(&mut self, key: TaskKey) -> Option<Task> {
        self.pending.remove(&key).map(|(_, task)| task)
    }

    /// Drops every pending task and returns how many there were.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn is_pending(&self, key: TaskKey) -> bool {
        self.pending.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.pending.values().map(|(due, _)| *due).min()
    }

    /// Removes and returns every task due at or before `now`, earliest
    /// first.
    pub fn take_due(&mut self, now: Duration) -> Vec<Task> {
        let due: Vec<TaskKey> = self
            .pending
            .iter()
            .filter(|(_, (at, _))| *at <= now)
            .map(|(key, _)| *key)
            .collect();
        let mut tasks: Vec<(Duration, Task)> = due
            .into_iter()
            .filter_map(|key| self.pending.remove(&key))
            .collect();
        tasks.sort_by_key(|(at, task)| (*at, task.key()));
        tasks.into_iter().map(|(_, task)| task).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fresh_id;
    use crate::doc::Region;
    use crate::selection::CursorPoint;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn focus() -> Task {
        Task::DeferredFocus(SelectionDescriptor::collapsed(CursorPoint::new(
            fresh_id(),
            Region::Main,
            0,
        )))
    }

    #[test]
    fn test_reschedule_replaces() {
        let mut scheduler = Scheduler::new();
        assert!(!scheduler.schedule(Task::SealTypingGroup, ms(500)));
        assert!(scheduler.schedule(Task::SealTypingGroup, ms(900)));
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.take_due(ms(600)).is_empty());
        assert_eq!(scheduler.take_due(ms(900)), vec![Task::SealTypingGroup]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_due_tasks_come_out_in_time_order() {
        let mut scheduler = Scheduler::new();
        let focus = focus();
        scheduler.schedule(Task::SealTypingGroup, ms(300));
        scheduler.schedule(focus.clone(), ms(100));
        assert_eq!(scheduler.next_due(), Some(ms(100)));
        assert_eq!(
            scheduler.take_due(ms(1000)),
            vec![focus, Task::SealTypingGroup]
        );
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Task::SealTypingGroup, ms(1));
        scheduler.schedule(focus(), ms(1));
        assert_eq!(
            scheduler.cancel(TaskKey::SealTypingGroup),
            Some(Task::SealTypingGroup)
        );
        assert!(!scheduler.is_pending(TaskKey::SealTypingGroup));
        assert_eq!(scheduler.cancel_all(), 1);
        assert!(scheduler.take_due(ms(10)).is_empty());
    }
}
