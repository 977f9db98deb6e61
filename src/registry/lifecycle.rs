//! Load, unload and reload

use std::sync::OnceLock;

use regex::Regex;

use super::{ScriptOutcome, ScriptRegistry, ScriptState};
use crate::config::DoubleLoadPolicy;
use crate::error::{LunaError, Result};
use crate::sandbox::{ScriptEnvironment, ScriptOrigin};

/// Script names double as bundle directory names and log targets.
pub fn validate_name(name: &str) -> Result<()> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("name pattern compiles"));

    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(LunaError::InvalidName(format!(
            "'{}' (use letters, digits, '_' and '-')",
            name
        )))
    }
}

impl ScriptRegistry {
    /// Load `source` as script `name`.
    pub fn load(&mut self, source: &str, name: &str) -> Result<()> {
        validate_name(name)?;
        self.load_from(name, ScriptOrigin::Inline(source.to_string()), source)
    }

    /// Load a bundle's entry point as script `name`.
    pub fn load_bundle(&mut self, name: &str) -> Result<()> {
        validate_name(name)?;
        let entry = self.bundles.read_entry(name)?;
        self.load_from(name, ScriptOrigin::Bundle(entry.folder), &entry.source)
    }

    /// Tear a script down: unload hooks, tasks, commands, shared objects,
    /// then the environment itself.
    pub fn unload(&mut self, name: &str) -> Result<()> {
        let (logger, control) = match self.environments.get(name) {
            Some(env) if self.is_loaded(name) => (env.logger().clone(), env.control().clone()),
            _ => return Err(LunaError::NotFound(name.to_string())),
        };
        self.phases.insert(name.to_string(), ScriptState::Unloading);

        for hook in control.unload_hooks() {
            if let Err(e) = hook.call::<()>(()) {
                logger.error(&format!("unload hook failed: {}", e));
            }
        }

        let summary = self.factory.scheduler().cancel_all(name);

        let owned: Vec<String> = self
            .commands
            .list()
            .into_iter()
            .filter(|entry| entry.owner == name)
            .map(|entry| entry.name)
            .collect();
        for command in &owned {
            self.commands.unregister(command);
        }
        self.commands.sync();

        let released = self.factory.objects().release_owned_by(name);
        control.clear();

        self.loaded.remove(name);
        self.environments.remove(name);
        self.phases.remove(name);
        self.collect_garbage(name);

        log::info!(
            "Unloaded script '{}' ({} task(s) cancelled, {} reference(s) released, {} shared object(s) removed)",
            name,
            summary.cancelled,
            summary.released,
            released
        );
        Ok(())
    }

    /// Unload, then load again from where the script originally came from.
    pub fn reload(&mut self, name: &str) -> Result<()> {
        let origin = self
            .environments
            .get(name)
            .map(|env| env.origin.clone())
            .ok_or_else(|| LunaError::NotFound(name.to_string()))?;

        self.unload(name)?;
        match origin {
            ScriptOrigin::Bundle(_) => self.load_bundle(name),
            ScriptOrigin::Inline(source) => {
                self.load_from(name, ScriptOrigin::Inline(source.clone()), &source)
            }
        }
    }

    /// Load every bundle the bundle source knows about.
    pub fn load_all(&mut self) -> Result<Vec<ScriptOutcome>> {
        let names = self.bundles.list_bundles()?;
        Ok(names
            .iter()
            .map(|name| ScriptOutcome::from_result(name, &self.load_bundle(name)))
            .collect())
    }

    /// Unload every loaded script, in name order.
    pub fn unload_all(&mut self) -> Vec<ScriptOutcome> {
        self.loaded_scripts()
            .iter()
            .map(|name| ScriptOutcome::from_result(name, &self.unload(name)))
            .collect()
    }

    fn load_from(&mut self, name: &str, origin: ScriptOrigin, source: &str) -> Result<()> {
        if self.is_loaded(name) {
            match self.policy {
                DoubleLoadPolicy::Reject => return Err(LunaError::AlreadyLoaded(name.to_string())),
                DoubleLoadPolicy::Reload => {
                    log::info!("Script '{}' is already loaded, replacing it", name);
                    self.unload(name)?;
                }
            }
        }

        self.phases.insert(name.to_string(), ScriptState::Loading);
        let result = self.instantiate(name, origin, source);
        self.phases.remove(name);

        let env = match result {
            Ok(env) => env,
            Err(e) => {
                log::error!("Failed to load script '{}': {}", name, e);
                return Err(e);
            }
        };

        let logger = env.logger().clone();
        let control = env.control().clone();
        self.loaded.insert(name.to_string(), true);
        self.environments.insert(name.to_string(), env);
        self.publish_commands(name);

        for hook in control.load_hooks() {
            if let Err(e) = hook.call::<()>(()) {
                logger.error(&format!("load hook failed: {}", e));
            }
        }
        // Hooks may have declared more commands
        self.publish_commands(name);

        log::info!("Loaded script '{}'", name);
        Ok(())
    }

    /// Build a sandbox and run the script body in it. On failure everything
    /// the body acquired is released and nothing is registered.
    fn instantiate(&mut self, name: &str, origin: ScriptOrigin, source: &str) -> Result<ScriptEnvironment> {
        let env = self.factory.create_sandbox(name, origin)?;

        let run = self
            .factory
            .compile(&env, source)
            .and_then(|chunk| chunk.call::<()>(()));

        match run {
            Ok(()) => Ok(env),
            Err(e) => {
                self.discard(env);
                Err(LunaError::from_guest(name, e))
            }
        }
    }

    fn discard(&mut self, env: ScriptEnvironment) {
        let name = env.name.clone();
        env.control().clear();
        let summary = self.factory.scheduler().cancel_all(&name);
        let released = self.factory.objects().release_owned_by(&name);
        drop(env);
        self.collect_garbage(&name);
        log::debug!(
            "Discarded sandbox of '{}' ({} task(s) cancelled, {} shared object(s) removed)",
            name,
            summary.cancelled,
            released
        );
    }

    fn publish_commands(&mut self, name: &str) {
        let Some(env) = self.environments.get(name) else { return };
        for command in env.control().commands() {
            if let Err(e) = self.commands.register(name, &command) {
                env.logger().warn(&format!("command '{}' not registered: {}", command.name, e));
            }
        }
        self.commands.sync();
    }

    fn collect_garbage(&self, name: &str) {
        if let Err(e) = self.factory.lua().gc_collect() {
            log::warn!("Collection after unloading '{}' failed: {}", name, e);
        }
    }
}
