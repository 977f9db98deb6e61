//! `scheduler` global handed to every script

use mlua::{Function, UserData, UserDataFields, UserDataMethods, Value};

use super::{Lane, ScheduleMode, Scheduler, TaskId};
use crate::sandbox::ScriptLogger;

/// Per-script facade over the shared [`Scheduler`]
#[derive(Clone)]
pub struct SchedulerApi {
    scheduler: Scheduler,
    logger: ScriptLogger,
}

impl SchedulerApi {
    pub fn new(scheduler: Scheduler, logger: ScriptLogger) -> Self {
        Self { scheduler, logger }
    }

    fn submit(&self, callable: Function, lane: Lane, mode: ScheduleMode) -> mlua::Result<TaskRef> {
        let id = self
            .scheduler
            .submit(&self.logger, callable, lane, mode)
            .map_err(mlua::Error::external)?;
        Ok(TaskRef {
            id,
            script: self.logger.script().to_string(),
            scheduler: self.scheduler.clone(),
        })
    }

    fn cancel(&self, id: TaskId) -> mlua::Result<bool> {
        self.scheduler
            .cancel(self.logger.script(), id)
            .map_err(mlua::Error::external)
    }
}

impl UserData for SchedulerApi {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("run", |_, this, f: Function| {
            this.submit(f, Lane::Sync, ScheduleMode::Immediate)
        });
        methods.add_method("run_async", |_, this, f: Function| {
            this.submit(f, Lane::Async, ScheduleMode::Immediate)
        });
        methods.add_method("run_later", |_, this, (delay, f): (u64, Function)| {
            this.submit(f, Lane::Sync, ScheduleMode::Delayed(delay))
        });
        methods.add_method("run_later_async", |_, this, (delay, f): (u64, Function)| {
            this.submit(f, Lane::Async, ScheduleMode::Delayed(delay))
        });
        methods.add_method(
            "run_repeating",
            |_, this, (delay, period, f): (u64, u64, Function)| {
                this.submit(f, Lane::Sync, ScheduleMode::Repeating { delay, period })
            },
        );
        methods.add_method(
            "run_repeating_async",
            |_, this, (delay, period, f): (u64, u64, Function)| {
                this.submit(f, Lane::Async, ScheduleMode::Repeating { delay, period })
            },
        );

        // Accepts a task object or its numeric id
        methods.add_method("cancel", |_, this, task: Value| {
            let id = match task {
                Value::UserData(ud) => ud.borrow::<TaskRef>()?.id,
                Value::Integer(i) if i >= 0 => TaskId(i as u64),
                other => {
                    return Err(mlua::Error::RuntimeError(format!(
                        "cancel expects a task or task id, got {}",
                        other.type_name()
                    )))
                }
            };
            this.cancel(id)
        });

        methods.add_method("pending", |_, this, ()| {
            Ok(this.scheduler.outstanding(this.logger.script()))
        });
    }
}

/// Task object returned to the guest
pub struct TaskRef {
    id: TaskId,
    script: String,
    scheduler: Scheduler,
}

impl TaskRef {
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl UserData for TaskRef {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("id", |_, this| Ok(this.id.0));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("cancel", |_, this, ()| {
            this.scheduler
                .cancel(&this.script, this.id)
                .map_err(mlua::Error::external)
        });
        methods.add_meta_method(mlua::MetaMethod::ToString, |_, this, ()| {
            Ok(this.id.to_string())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TickRunner;
    use mlua::Lua;
    use std::rc::Rc;

    fn setup() -> (Lua, Rc<TickRunner>, Scheduler) {
        let lua = Lua::new();
        let runner = Rc::new(TickRunner::new());
        let scheduler = Scheduler::new(runner.clone());
        let api = SchedulerApi::new(scheduler.clone(), ScriptLogger::new("demo"));
        lua.globals().set("scheduler", api).unwrap();
        lua.globals().set("count", 0).unwrap();
        (lua, runner, scheduler)
    }

    #[test]
    fn test_run_fires_on_next_tick() {
        let (lua, runner, scheduler) = setup();
        lua.load("scheduler:run(function() count = count + 1 end)")
            .exec()
            .unwrap();

        assert_eq!(lua.globals().get::<i64>("count").unwrap(), 0);
        runner.tick();
        assert_eq!(lua.globals().get::<i64>("count").unwrap(), 1);
        assert_eq!(scheduler.pinned(), 0);
    }

    #[test]
    fn test_pending_and_task_cancel() {
        let (lua, runner, scheduler) = setup();
        let pending: usize = lua
            .load(
                r#"
                local t = scheduler:run_repeating(1, 1, function() count = count + 1 end)
                scheduler:run_later_async(5, function() end)
                held = t
                return scheduler:pending()
                "#,
            )
            .eval()
            .unwrap();
        assert_eq!(pending, 2);

        runner.tick();
        runner.tick();
        assert_eq!(lua.globals().get::<i64>("count").unwrap(), 2);

        let cancelled: bool = lua.load("return held:cancel()").eval().unwrap();
        assert!(cancelled);
        runner.tick();
        assert_eq!(lua.globals().get::<i64>("count").unwrap(), 2);
        assert_eq!(scheduler.outstanding("demo"), 1);
    }

    #[test]
    fn test_cancel_by_id() {
        let (lua, _runner, scheduler) = setup();
        let cancelled: bool = lua
            .load(
                r#"
                local t = scheduler:run_later(10, function() end)
                return scheduler:cancel(t.id)
                "#,
            )
            .eval()
            .unwrap();
        assert!(cancelled);
        assert_eq!(scheduler.pinned(), 0);
    }

    #[test]
    fn test_cancel_rejects_other_values() {
        let (lua, _runner, _scheduler) = setup();
        assert!(lua.load("scheduler:cancel('nope')").exec().is_err());
    }
}
