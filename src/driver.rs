//! Run loop: advances the task runner until stopped
//!
//! Everything happens on the calling thread. Ctrl+C only flips a flag; the
//! loop notices it between ticks, unloads every script and returns.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::HostConfig;
use crate::error::{LunaError, Result};
use crate::registry::{ScriptOutcome, ScriptRegistry};
use crate::scheduler::TickRunner;

/// A registry together with the runner that drives its scheduled tasks
pub struct Driver {
    registry: ScriptRegistry,
    runner: Rc<TickRunner>,
}

impl Driver {
    pub fn new(config: &HostConfig) -> Result<Self> {
        let runner = Rc::new(TickRunner::new());
        let registry = ScriptRegistry::from_config(config, runner.clone())?;
        Ok(Self { registry, runner })
    }

    pub fn from_parts(registry: ScriptRegistry, runner: Rc<TickRunner>) -> Self {
        Self { registry, runner }
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ScriptRegistry {
        &mut self.registry
    }

    pub fn runner(&self) -> &TickRunner {
        &self.runner
    }

    /// Advance one tick. Returns how many tasks fired.
    pub fn tick(&self) -> usize {
        let fired = self.runner.tick();
        if fired > 0 {
            log::trace!("Tick {}: {} task(s) fired", self.runner.current_tick(), fired);
        }
        fired
    }

    /// Advance `n` ticks back to back. Returns how many tasks fired in total.
    pub fn run_ticks(&self, n: u64) -> usize {
        (0..n).map(|_| self.tick()).sum()
    }

    /// Tick every `interval` while `running` holds, up to `max_ticks`.
    /// Returns the number of ticks performed.
    pub fn run_until_stopped(
        &self,
        interval: Duration,
        max_ticks: Option<u64>,
        running: &AtomicBool,
    ) -> u64 {
        let mut ticks = 0;
        while running.load(Ordering::SeqCst) {
            if max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }
            self.tick();
            ticks += 1;
            std::thread::sleep(interval);
        }
        ticks
    }

    /// Run until Ctrl+C (or `max_ticks`), then unload everything.
    pub fn run(&mut self, interval: Duration, max_ticks: Option<u64>) -> Result<Vec<ScriptOutcome>> {
        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();

        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
        })
        .map_err(|e| LunaError::Host(format!("Failed to set Ctrl+C handler: {}", e)))?;

        log::info!(
            "Running {} script(s), tick every {:?} (Press Ctrl+C to stop)",
            self.registry.loaded_scripts().len(),
            interval
        );
        let ticks = self.run_until_stopped(interval, max_ticks, &running);
        log::info!("Stopped after {} tick(s)", ticks);

        Ok(self.shutdown())
    }

    /// Unload every script, logging failures.
    pub fn shutdown(&mut self) -> Vec<ScriptOutcome> {
        let outcomes = self.registry.unload_all();
        for outcome in outcomes.iter().filter(|o| !o.success) {
            log::error!(
                "Unloading '{}' failed: {}",
                outcome.script,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
        outcomes
    }
}
