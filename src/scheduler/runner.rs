//! Host task runner
//!
//! The scheduler hands native tasks to a [`TaskRunner`]. [`TickRunner`] is
//! the runner the CLI uses: a tick-driven queue advanced by the run loop.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

/// A unit of work the runner can invoke without knowing about Lua
pub type NativeTask = Box<dyn FnMut()>;

/// Runner-level task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Which queue a task is dispatched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lane {
    Sync,
    Async,
}

/// When, and how often, a task fires. Delays and periods are in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    Immediate,
    Delayed(u64),
    Repeating { delay: u64, period: u64 },
}

impl ScheduleMode {
    /// Immediate tasks are fire-and-forget; the others are tracked.
    pub fn is_tracked(&self) -> bool {
        !matches!(self, ScheduleMode::Immediate)
    }
}

/// Interface to the host's task execution facility
pub trait TaskRunner {
    fn submit(&self, task: NativeTask, lane: Lane, mode: ScheduleMode) -> TaskId;

    /// Prevent future firings. Returns false if the task was unknown or done.
    fn cancel(&self, id: TaskId) -> bool;
}

struct Entry {
    task: Option<NativeTask>,
    lane: Lane,
    due: u64,
    period: Option<u64>,
}

#[derive(Default)]
struct RunnerState {
    tick: u64,
    next_id: u64,
    entries: BTreeMap<u64, Entry>,
}

/// Tick-driven runner.
///
/// Immediate tasks fire on the next tick, delayed tasks `max(n, 1)` ticks
/// from now, repeating tasks first after `max(delay, 1)` ticks and then every
/// `max(period, 1)` ticks. Within a tick the sync lane runs before the async
/// lane, each in submission order. Tasks may submit or cancel tasks while
/// firing; nothing is borrowed while a task runs.
#[derive(Default)]
pub struct TickRunner {
    state: RefCell<RunnerState>,
}

impl TickRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_tick(&self) -> u64 {
        self.state.borrow().tick
    }

    /// Number of tasks waiting to fire
    pub fn pending(&self) -> usize {
        self.state.borrow().entries.len()
    }

    /// Advance one tick and run every task that is due. Returns the number fired.
    pub fn tick(&self) -> usize {
        let (now, due) = {
            let mut state = self.state.borrow_mut();
            state.tick += 1;
            let now = state.tick;
            let mut due: Vec<(Lane, u64)> = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.due <= now)
                .map(|(id, entry)| (entry.lane, *id))
                .collect();
            due.sort();
            (now, due)
        };

        let mut fired = 0;
        for (_, id) in due {
            let task = self
                .state
                .borrow_mut()
                .entries
                .get_mut(&id)
                .and_then(|entry| entry.task.take());
            let Some(mut task) = task else { continue };

            task();
            fired += 1;

            let mut state = self.state.borrow_mut();
            if let Some(entry) = state.entries.get_mut(&id) {
                if let Some(period) = entry.period {
                    entry.due = now.saturating_add(period);
                    entry.task = Some(task);
                    continue;
                }
            }
            state.entries.remove(&id);
        }
        fired
    }
}

impl TaskRunner for TickRunner {
    fn submit(&self, task: NativeTask, lane: Lane, mode: ScheduleMode) -> TaskId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        let now = state.tick;

        let (due, period) = match mode {
            ScheduleMode::Immediate => (now + 1, None),
            // Delays come from guest code; a huge one means "never"
            ScheduleMode::Delayed(delay) => (now.saturating_add(delay.max(1)), None),
            ScheduleMode::Repeating { delay, period } => {
                (now.saturating_add(delay.max(1)), Some(period.max(1)))
            }
        };

        state.entries.insert(
            id,
            Entry {
                task: Some(task),
                lane,
                due,
                period,
            },
        );
        TaskId(id)
    }

    fn cancel(&self, id: TaskId) -> bool {
        self.state.borrow_mut().entries.remove(&id.0).is_some()
    }
}
