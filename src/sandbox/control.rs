//! The `script` control object

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::{Function, UserData, UserDataFields, UserDataMethods, Value};

use crate::environment::{ObjectOwner, SharedObjects};
use crate::host::CommandDescriptor;

#[derive(Default)]
struct ControlState {
    load_hooks: Vec<Function>,
    unload_hooks: Vec<Function>,
    commands: Vec<CommandDescriptor>,
}

/// Handle through which a script talks to its own lifecycle.
///
/// Hooks and command handlers are guest closures over the script's own
/// globals, so holding them here ties the sandbox to Rust-side state the Lua
/// collector cannot see. [`ScriptControl::clear`] breaks that link at unload.
#[derive(Clone)]
pub struct ScriptControl {
    name: String,
    folder: Option<PathBuf>,
    objects: SharedObjects,
    state: Rc<RefCell<ControlState>>,
}

impl ScriptControl {
    pub fn new(name: &str, folder: Option<PathBuf>, objects: SharedObjects) -> Self {
        Self {
            name: name.to_string(),
            folder,
            objects,
            state: Rc::new(RefCell::new(ControlState::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    /// Load hooks in registration order
    pub fn load_hooks(&self) -> Vec<Function> {
        self.state.borrow().load_hooks.clone()
    }

    /// Unload hooks in registration order
    pub fn unload_hooks(&self) -> Vec<Function> {
        self.state.borrow().unload_hooks.clone()
    }

    pub fn commands(&self) -> Vec<CommandDescriptor> {
        self.state.borrow().commands.clone()
    }

    pub fn command(&self, name: &str) -> Option<CommandDescriptor> {
        self.state
            .borrow()
            .commands
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    pub fn add_command(&self, command: CommandDescriptor) {
        let mut state = self.state.borrow_mut();
        state.commands.retain(|c| c.name != command.name);
        state.commands.push(command);
    }

    /// Drop every hook and command handler.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.load_hooks.clear();
        state.unload_hooks.clear();
        state.commands.clear();
    }
}

impl UserData for ScriptControl {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("name", |_, this| Ok(this.name.clone()));
        fields.add_field_method_get("folder", |_, this| {
            Ok(this.folder.as_ref().map(|p| p.display().to_string()))
        });
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("on_load", |_, this, hook: Function| {
            this.state.borrow_mut().load_hooks.push(hook);
            Ok(())
        });

        methods.add_method("on_unload", |_, this, hook: Function| {
            this.state.borrow_mut().unload_hooks.push(hook);
            Ok(())
        });

        methods.add_method(
            "register_command",
            |_, this, (name, handler, description): (String, Function, Option<String>)| {
                if name.is_empty() || name.chars().any(char::is_whitespace) {
                    return Err(mlua::Error::RuntimeError(format!(
                        "invalid command name '{}'",
                        name
                    )));
                }
                this.add_command(CommandDescriptor {
                    name,
                    description,
                    handler,
                });
                Ok(())
            },
        );

        methods.add_method("share", |_, this, (name, value): (String, Value)| {
            this.objects
                .register(ObjectOwner::Script(this.name.clone()), &name, value)
                .map_err(mlua::Error::external)
        });

        methods.add_method("unshare", |_, this, name: String| {
            this.objects
                .unregister(&ObjectOwner::Script(this.name.clone()), &name)
                .map_err(mlua::Error::external)
        });
    }
}
