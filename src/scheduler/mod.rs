//! Scheduler: turns guest callables into runner tasks and tracks them per script
//!
//! Every callable is pinned in the [`ValueBridge`] before it is submitted.
//! Immediate tasks carry their own clone of the callable, so the pin is
//! released as soon as the runner accepts them. Delayed and repeating tasks
//! only carry the pin handle; it stays in the owning script's task list until
//! the task retires, is cancelled, or the script unloads. Immediate tasks are
//! listed too (without a pin) so an unload cancels them before they fire.

mod api;
mod runner;

pub use api::{SchedulerApi, TaskRef};
pub use runner::{Lane, NativeTask, ScheduleMode, TaskId, TaskRunner, TickRunner};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use mlua::{Function, Value};

use crate::bridge::{PinHandle, ValueBridge};
use crate::error::Result;
use crate::sandbox::ScriptLogger;

/// Tracking record for a scheduled task; `pin` is absent for immediate tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: Option<TaskId>,
    pub pin: Option<PinHandle>,
}

/// What `cancel_all` did for one script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancelSummary {
    pub cancelled: usize,
    pub released: usize,
}

struct SchedulerInner {
    runner: Rc<dyn TaskRunner>,
    bridge: RefCell<ValueBridge>,
    tasks: RefCell<HashMap<String, Vec<TaskHandle>>>,
}

impl SchedulerInner {
    /// Forget a task that has fired its only execution.
    fn retire(&self, script: &str, id: TaskId) {
        let removed = {
            let mut tasks = self.tasks.borrow_mut();
            let Some(list) = tasks.get_mut(script) else { return };
            let Some(pos) = list.iter().position(|h| h.task_id == Some(id)) else { return };
            let handle = list.remove(pos);
            if list.is_empty() {
                tasks.remove(script);
            }
            handle
        };

        if let Some(pin) = removed.pin {
            if let Err(e) = self.bridge.borrow_mut().unpin(pin) {
                log::error!("Retiring {} of '{}': {}", id, script, e);
            }
        }
    }
}

/// Cheap to clone; clones share the same task lists and bridge.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(runner: Rc<dyn TaskRunner>) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                runner,
                bridge: RefCell::new(ValueBridge::new()),
                tasks: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Submit `callable` on behalf of the script that owns `logger`.
    pub fn submit(
        &self,
        logger: &ScriptLogger,
        callable: Function,
        lane: Lane,
        mode: ScheduleMode,
    ) -> Result<TaskId> {
        let script = logger.script().to_string();
        let pin = self
            .inner
            .bridge
            .borrow_mut()
            .pin(Value::Function(callable.clone()));

        let weak: Weak<SchedulerInner> = Rc::downgrade(&self.inner);
        let slot: Rc<Cell<Option<TaskId>>> = Rc::new(Cell::new(None));
        let owner = script.clone();
        let logger = logger.clone();

        let (task, kept_pin): (NativeTask, Option<PinHandle>) = match mode {
            ScheduleMode::Immediate => {
                let slot = slot.clone();
                let task: NativeTask = Box::new(move || {
                    fire(&logger, &callable);
                    if let (Some(inner), Some(id)) = (weak.upgrade(), slot.get()) {
                        inner.retire(&owner, id);
                    }
                });
                (task, None)
            }
            _ => {
                // The native task must not keep the callable alive on its own
                drop(callable);
                let one_shot = matches!(mode, ScheduleMode::Delayed(_));
                let slot = slot.clone();
                let task: NativeTask = Box::new(move || {
                    let Some(inner) = weak.upgrade() else { return };
                    let callable = inner.bridge.borrow().get(pin);
                    match callable {
                        Some(Value::Function(f)) => fire(&logger, &f),
                        _ => {
                            log::debug!("Skipping firing for '{}': {} already released", owner, pin);
                            return;
                        }
                    }
                    if let (true, Some(id)) = (one_shot, slot.get()) {
                        inner.retire(&owner, id);
                    }
                });
                (task, Some(pin))
            }
        };

        let id = self.inner.runner.submit(task, lane, mode);
        slot.set(Some(id));

        if kept_pin.is_none() {
            // The native task owns its own clone of an immediate callable
            self.inner.bridge.borrow_mut().unpin(pin)?;
        }

        self.inner
            .tasks
            .borrow_mut()
            .entry(script.clone())
            .or_default()
            .push(TaskHandle {
                task_id: Some(id),
                pin: kept_pin,
            });
        log::debug!("Scheduled {} for '{}' ({:?}, {:?})", id, script, lane, mode);
        Ok(id)
    }

    /// Cancel one task. Tracked tasks of other scripts are left alone.
    pub fn cancel(&self, script: &str, id: TaskId) -> Result<bool> {
        let owned_by_other = self
            .inner
            .tasks
            .borrow()
            .iter()
            .any(|(owner, list)| owner != script && list.iter().any(|h| h.task_id == Some(id)));
        if owned_by_other {
            return Ok(false);
        }

        let cancelled = self.inner.runner.cancel(id);

        let removed = {
            let mut tasks = self.inner.tasks.borrow_mut();
            let removed = tasks.get_mut(script).and_then(|list| {
                list.iter()
                    .position(|h| h.task_id == Some(id))
                    .map(|pos| list.remove(pos))
            });
            if tasks.get(script).is_some_and(|list| list.is_empty()) {
                tasks.remove(script);
            }
            removed
        };

        let released = match removed.and_then(|handle| handle.pin) {
            Some(pin) => {
                self.inner.bridge.borrow_mut().unpin(pin)?;
                true
            }
            None => false,
        };

        Ok(cancelled || released)
    }

    /// Cancel every tracked task of `script` and release its pins.
    pub fn cancel_all(&self, script: &str) -> CancelSummary {
        let handles = self
            .inner
            .tasks
            .borrow_mut()
            .remove(script)
            .unwrap_or_default();

        let mut summary = CancelSummary::default();
        for mut handle in handles {
            if let Some(id) = handle.task_id.take() {
                self.inner.runner.cancel(id);
                summary.cancelled += 1;
            }
            if let Some(pin) = handle.pin.take() {
                match self.inner.bridge.borrow_mut().unpin(pin) {
                    Ok(_) => summary.released += 1,
                    Err(e) => log::error!("Cancelling tasks of '{}': {}", script, e),
                }
            }
        }

        if summary.cancelled > 0 {
            log::debug!(
                "Cancelled {} task(s) of '{}', released {} reference(s)",
                summary.cancelled,
                script,
                summary.released
            );
        }
        summary
    }

    /// Tasks of `script` that have not retired or been cancelled
    pub fn outstanding(&self, script: &str) -> usize {
        self.inner.tasks.borrow().get(script).map_or(0, Vec::len)
    }

    pub fn handles(&self, script: &str) -> Vec<TaskHandle> {
        self.inner.tasks.borrow().get(script).cloned().unwrap_or_default()
    }

    /// Guest values currently pinned on behalf of any script
    pub fn pinned(&self) -> usize {
        self.inner.bridge.borrow().pinned()
    }

    pub fn is_pinned(&self, pin: PinHandle) -> bool {
        self.inner.bridge.borrow().is_pinned(pin)
    }
}

/// Invoke a scheduled callable under a protected call; errors are logged
/// against the owning script and never propagate to the runner.
fn fire(logger: &ScriptLogger, callable: &Function) {
    if let Err(e) = callable.call::<()>(()) {
        logger.error(&format!("scheduled task failed: {}", e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;
    use std::cell::Cell;

    /// Runner that records calls and never fires anything
    #[derive(Default)]
    struct RecordingRunner {
        submitted: Cell<u64>,
        cancelled: RefCell<Vec<TaskId>>,
    }

    impl TaskRunner for RecordingRunner {
        fn submit(&self, _task: NativeTask, _lane: Lane, _mode: ScheduleMode) -> TaskId {
            self.submitted.set(self.submitted.get() + 1);
            TaskId(self.submitted.get())
        }

        fn cancel(&self, id: TaskId) -> bool {
            self.cancelled.borrow_mut().push(id);
            true
        }
    }

    fn noop(lua: &Lua) -> Function {
        lua.create_function(|_, ()| Ok(())).unwrap()
    }

    #[test]
    fn test_immediate_releases_pin_on_submit() {
        let lua = Lua::new();
        let runner = Rc::new(RecordingRunner::default());
        let scheduler = Scheduler::new(runner.clone());
        let logger = ScriptLogger::new("ping");

        scheduler
            .submit(&logger, noop(&lua), Lane::Sync, ScheduleMode::Immediate)
            .unwrap();
        assert_eq!(scheduler.pinned(), 0);
        assert_eq!(scheduler.outstanding("ping"), 1);
        assert_eq!(scheduler.handles("ping")[0].pin, None);

        // Cancelling an immediate task releases nothing
        assert_eq!(scheduler.cancel_all("ping"), CancelSummary { cancelled: 1, released: 0 });
    }

    #[test]
    fn test_cancel_all_cancels_and_releases_each_task() {
        let lua = Lua::new();
        let runner = Rc::new(RecordingRunner::default());
        let scheduler = Scheduler::new(runner.clone());
        let logger = ScriptLogger::new("busy");

        for i in 0..4u64 {
            let mode = if i % 2 == 0 {
                ScheduleMode::Delayed(10)
            } else {
                ScheduleMode::Repeating { delay: 1, period: 5 }
            };
            scheduler.submit(&logger, noop(&lua), Lane::Sync, mode).unwrap();
        }
        assert_eq!(scheduler.outstanding("busy"), 4);
        assert_eq!(scheduler.pinned(), 4);

        let summary = scheduler.cancel_all("busy");
        assert_eq!(summary, CancelSummary { cancelled: 4, released: 4 });
        assert_eq!(runner.cancelled.borrow().len(), 4);
        assert_eq!(scheduler.outstanding("busy"), 0);
        assert_eq!(scheduler.pinned(), 0);

        // Idempotent
        assert_eq!(scheduler.cancel_all("busy"), CancelSummary::default());
    }

    #[test]
    fn test_cancel_single_task() {
        let lua = Lua::new();
        let runner = Rc::new(RecordingRunner::default());
        let scheduler = Scheduler::new(runner);
        let logger = ScriptLogger::new("one");

        let keep = scheduler
            .submit(&logger, noop(&lua), Lane::Async, ScheduleMode::Delayed(5))
            .unwrap();
        let drop_me = scheduler
            .submit(&logger, noop(&lua), Lane::Async, ScheduleMode::Delayed(5))
            .unwrap();

        assert!(scheduler.cancel("one", drop_me).unwrap());
        assert_eq!(scheduler.outstanding("one"), 1);
        assert_eq!(scheduler.handles("one")[0].task_id, Some(keep));
        assert_eq!(scheduler.pinned(), 1);
    }

    #[test]
    fn test_cannot_cancel_other_scripts_task() {
        let lua = Lua::new();
        let scheduler = Scheduler::new(Rc::new(RecordingRunner::default()));
        let id = scheduler
            .submit(&ScriptLogger::new("a"), noop(&lua), Lane::Sync, ScheduleMode::Delayed(5))
            .unwrap();

        assert!(!scheduler.cancel("b", id).unwrap());
        assert_eq!(scheduler.outstanding("a"), 1);
    }

    #[test]
    fn test_delayed_task_retires_after_firing() {
        let lua = Lua::new();
        let runner = Rc::new(TickRunner::new());
        let scheduler = Scheduler::new(runner.clone());
        let logger = ScriptLogger::new("later");

        lua.globals().set("fired", 0).unwrap();
        let callable: Function = lua.load("return function() fired = fired + 1 end").eval().unwrap();
        scheduler
            .submit(&logger, callable, Lane::Sync, ScheduleMode::Delayed(2))
            .unwrap();

        runner.tick();
        assert_eq!(scheduler.outstanding("later"), 1);
        runner.tick();
        assert_eq!(lua.globals().get::<i64>("fired").unwrap(), 1);
        assert_eq!(scheduler.outstanding("later"), 0);
        assert_eq!(scheduler.pinned(), 0);
    }

    #[test]
    fn test_failing_repeating_task_keeps_running() {
        let lua = Lua::new();
        let runner = Rc::new(TickRunner::new());
        let scheduler = Scheduler::new(runner.clone());
        let logger = ScriptLogger::new("flaky");

        lua.globals().set("attempts", 0).unwrap();
        let callable: Function = lua
            .load("return function() attempts = attempts + 1 error('nope') end")
            .eval()
            .unwrap();
        scheduler
            .submit(&logger, callable, Lane::Sync, ScheduleMode::Repeating { delay: 1, period: 1 })
            .unwrap();

        runner.tick();
        runner.tick();
        runner.tick();
        assert_eq!(lua.globals().get::<i64>("attempts").unwrap(), 3);
        assert_eq!(scheduler.outstanding("flaky"), 1);
    }
}
