//! Sandbox factory: builds a fresh, isolated environment per script

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use mlua::{Function, Lua, Table, Value, Variadic};

use super::{join_values, ScriptControl, ScriptEnvironment, ScriptLogger, ScriptOrigin};
use crate::environment::{SharedEnvironment, SharedObjects};
use crate::error::Result;
use crate::host::HostBindings;
use crate::scheduler::{Scheduler, SchedulerApi, TaskRunner};

/// Module loader compiled once per sandbox. Everything it needs arrives as
/// chunk arguments, so the sandbox globals are only referenced from Lua.
const IMPORT_LOADER: &str = r#"
local read, load, env = ...
local loaded = {}
return function(module)
    local cached = loaded[module]
    if cached ~= nil then
        return cached
    end
    local source, chunkname = read(module)
    local chunk, err = load(source, chunkname, "t", env)
    if not chunk then
        error(err, 2)
    end
    local result = chunk(module)
    if result == nil then
        result = true
    end
    loaded[module] = result
    return result
end
"#;

/// Owns the interpreter and everything sandboxes are built from
pub struct SandboxFactory {
    lua: Lua,
    shared: SharedEnvironment,
    objects: SharedObjects,
    scheduler: Scheduler,
}

impl SandboxFactory {
    pub fn new(bindings: &HostBindings, runner: Rc<dyn TaskRunner>) -> Result<Self> {
        let lua = Lua::new();
        let shared = SharedEnvironment::build(&lua, bindings)?;
        let objects = SharedObjects::new(&lua)?;
        Ok(Self {
            lua,
            shared,
            objects,
            scheduler: Scheduler::new(runner),
        })
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn shared(&self) -> &SharedEnvironment {
        &self.shared
    }

    pub fn objects(&self) -> &SharedObjects {
        &self.objects
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Create the environment for script `name`. Nothing is registered
    /// anywhere; the caller decides whether the sandbox survives.
    pub fn create_sandbox(&self, name: &str, origin: ScriptOrigin) -> Result<ScriptEnvironment> {
        let globals = self.lua.create_table()?;
        globals.set_metatable(Some(self.resolver()?));

        let logger = ScriptLogger::new(name);
        let control = ScriptControl::new(name, origin.folder().map(Path::to_path_buf), self.objects.clone());

        globals.raw_set("_G", globals.clone())?;
        globals.raw_set("script", control.clone())?;
        globals.raw_set("logger", logger.clone())?;
        globals.raw_set(
            "scheduler",
            SchedulerApi::new(self.scheduler.clone(), logger.clone()),
        )?;
        globals.raw_set("print", self.print_function(&logger)?)?;
        globals.raw_set("import", self.import_function(&globals, origin.folder())?)?;

        log::debug!("Created sandbox for '{}'", name);
        Ok(ScriptEnvironment::new(
            name,
            origin,
            globals,
            logger,
            control,
            self.objects.clone(),
            self.shared.clone(),
        ))
    }

    /// Compile `source` with the sandbox's globals as its environment.
    pub fn compile(&self, env: &ScriptEnvironment, source: &str) -> mlua::Result<Function> {
        self.lua
            .load(source)
            .set_name(format!("={}", env.name))
            .set_environment(env.globals().clone())
            .into_function()
    }

    /// Metatable for own globals: misses fall through to shared objects,
    /// then the shared environment. There is no `__newindex`, so writes stay
    /// in own globals.
    fn resolver(&self) -> mlua::Result<Table> {
        let objects = self.objects.table().clone();
        let shared = self.shared.table().clone();
        let index = self.lua.create_function(move |_, (_, key): (Value, Value)| {
            let value = objects.raw_get::<Value>(key.clone())?;
            if !value.is_nil() {
                return Ok(value);
            }
            shared.get::<Value>(key)
        })?;

        let mt = self.lua.create_table()?;
        mt.raw_set("__index", index)?;
        mt.raw_set("__metatable", false)?;
        Ok(mt)
    }

    fn print_function(&self, logger: &ScriptLogger) -> mlua::Result<Function> {
        let logger = logger.clone();
        self.lua.create_function(move |_, args: Variadic<Value>| {
            logger.info(&join_values(&args));
            Ok(())
        })
    }

    fn import_function(&self, globals: &Table, folder: Option<&Path>) -> mlua::Result<Function> {
        let folder = folder.map(Path::to_path_buf);
        let read = self.lua.create_function(move |_, module: String| {
            let path = module_path(folder.as_deref(), &module).map_err(mlua::Error::RuntimeError)?;
            let source = fs::read_to_string(&path).map_err(|e| {
                mlua::Error::RuntimeError(format!("cannot import '{}': {}", module, e))
            })?;
            Ok((source, format!("@{}", path.display())))
        })?;
        let load = self.lua.globals().get::<Function>("load")?;

        self.lua
            .load(IMPORT_LOADER)
            .set_name("=import")
            .call::<Function>((read, load, globals.clone()))
    }
}

/// Map an `import` argument to `<folder>/<module>.lua`.
fn module_path(folder: Option<&Path>, module: &str) -> std::result::Result<PathBuf, String> {
    let folder = folder.ok_or_else(|| "import is only available to bundle scripts".to_string())?;

    let relative = Path::new(module);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if module.is_empty() || module.contains("..") || escapes {
        return Err(format!("invalid module name '{}'", module));
    }

    Ok(folder.join(format!("{}.lua", module)))
}
