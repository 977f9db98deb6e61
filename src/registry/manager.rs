//! Script registry state and queries

use std::collections::HashMap;
use std::rc::Rc;

use mlua::{IntoLua, Lua, MultiValue, Value, Variadic};

use super::{ScriptState, ScriptSummary};
use crate::config::{DoubleLoadPolicy, HostConfig};
use crate::environment::{ObjectOwner, SharedObjects};
use crate::error::{LunaError, Result};
use crate::host::{
    default_bindings, BundleSource, CommandRegistry, CommandTable, DirectoryBundles, HostBindings,
};
use crate::introspect;
use crate::sandbox::{join_values, SandboxFactory, ScriptEnvironment};
use crate::scheduler::{Scheduler, TaskRunner};

/// Assembles a [`ScriptRegistry`] from its host collaborators
pub struct RegistryBuilder {
    bindings: HostBindings,
    bundles: Option<Box<dyn BundleSource>>,
    commands: Option<Box<dyn CommandRegistry>>,
    policy: DoubleLoadPolicy,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            bindings: default_bindings(),
            bundles: None,
            commands: None,
            policy: DoubleLoadPolicy::default(),
        }
    }

    pub fn bindings(mut self, bindings: HostBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn bundles(mut self, bundles: impl BundleSource + 'static) -> Self {
        self.bundles = Some(Box::new(bundles));
        self
    }

    pub fn commands(mut self, commands: impl CommandRegistry + 'static) -> Self {
        self.commands = Some(Box::new(commands));
        self
    }

    pub fn double_load(mut self, policy: DoubleLoadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self, runner: Rc<dyn TaskRunner>) -> Result<ScriptRegistry> {
        let factory = SandboxFactory::new(&self.bindings, runner)?;
        Ok(ScriptRegistry {
            factory,
            bundles: self
                .bundles
                .unwrap_or_else(|| Box::new(DirectoryBundles::new("scripts", "main.lua"))),
            commands: self.commands.unwrap_or_else(|| Box::new(CommandTable::new())),
            policy: self.policy,
            loaded: HashMap::new(),
            environments: HashMap::new(),
            phases: HashMap::new(),
        })
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns every loaded script and the interpreter they share.
///
/// `loaded` and `environments` always hold the same names; a script enters
/// both only after its body ran successfully. `phases` records transitions in
/// progress.
pub struct ScriptRegistry {
    pub(super) factory: SandboxFactory,
    pub(super) bundles: Box<dyn BundleSource>,
    pub(super) commands: Box<dyn CommandRegistry>,
    pub(super) policy: DoubleLoadPolicy,
    pub(super) loaded: HashMap<String, bool>,
    pub(super) environments: HashMap<String, ScriptEnvironment>,
    pub(super) phases: HashMap<String, ScriptState>,
}

impl ScriptRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry over `<scripts_dir>/<bundle>/<entry_point>` with default
    /// bindings and an in-memory command table
    pub fn from_config(config: &HostConfig, runner: Rc<dyn TaskRunner>) -> Result<Self> {
        RegistryBuilder::new()
            .bundles(DirectoryBundles::new(&config.scripts_dir, config.entry_point.clone()))
            .double_load(config.double_load)
            .build(runner)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.get(name).copied().unwrap_or(false)
    }

    pub fn state(&self, name: &str) -> ScriptState {
        match self.phases.get(name) {
            Some(phase) => *phase,
            None if self.is_loaded(name) => ScriptState::Loaded,
            None => ScriptState::Unloaded,
        }
    }

    /// Names of loaded scripts, sorted
    pub fn loaded_scripts(&self) -> Vec<String> {
        let mut names: Vec<String> = self.environments.keys().cloned().collect();
        names.sort();
        names
    }

    /// One summary per loaded script, sorted by name
    pub fn summaries(&self) -> Vec<ScriptSummary> {
        self.loaded_scripts()
            .into_iter()
            .filter_map(|name| self.environments.get(&name))
            .map(|env| ScriptSummary {
                name: env.name.clone(),
                state: self.state(&env.name),
                folder: env.folder().map(|p| p.display().to_string()),
                loaded_at: env.loaded_at,
                tasks: self.factory.scheduler().outstanding(&env.name),
                commands: env.control().commands().into_iter().map(|c| c.name).collect(),
            })
            .collect()
    }

    pub fn environment(&self, name: &str) -> Option<&ScriptEnvironment> {
        self.environments.get(name)
    }

    pub fn lua(&self) -> &Lua {
        self.factory.lua()
    }

    pub fn scheduler(&self) -> &Scheduler {
        self.factory.scheduler()
    }

    pub fn objects(&self) -> &SharedObjects {
        self.factory.objects()
    }

    pub fn bundles(&self) -> &dyn BundleSource {
        self.bundles.as_ref()
    }

    pub fn commands(&self) -> &dyn CommandRegistry {
        self.commands.as_ref()
    }

    pub fn policy(&self) -> DoubleLoadPolicy {
        self.policy
    }

    /// Publish a host value to every script at the shared-objects tier.
    pub fn share(&self, name: &str, value: impl IntoLua) -> Result<()> {
        let value = value.into_lua(self.factory.lua())?;
        self.factory.objects().register(ObjectOwner::Host, name, value)
    }

    /// Invoke a published command through the script that owns it and
    /// render what it returned.
    pub fn dispatch_command(&self, name: &str, args: &[String]) -> Result<String> {
        let unknown = || LunaError::UnknownCommand(name.to_string());
        let script = self.commands.owner(name).ok_or_else(unknown)?;
        let command = self
            .environments
            .get(&script)
            .and_then(|env| env.control().command(name))
            .ok_or_else(unknown)?;

        log::debug!("Dispatching command '{}' to script '{}'", name, script);
        let args: Variadic<String> = args.iter().cloned().collect();
        let result = command
            .handler
            .call::<MultiValue>(args)
            .map_err(|e| LunaError::from_guest(&script, e))?;

        let values: Vec<Value> = result.into_iter().collect();
        Ok(join_values(&values))
    }

    /// Read a dotted variable path from a loaded script.
    pub fn get_variable(&self, name: &str, path: &str) -> Option<Value> {
        self.environments
            .get(name)
            .and_then(|env| introspect::get_variable(env, path))
    }
}
