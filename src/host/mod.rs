//! Host collaborators: where bundles come from, where commands go, and what
//! the host exposes to every script

mod bindings;
mod bundles;
mod commands;

pub use bindings::{default_bindings, HostBindings};
pub use bundles::{BundleEntry, BundleSource, DirectoryBundles};
pub use commands::{CommandDescriptor, CommandEntry, CommandRegistry, CommandTable};
