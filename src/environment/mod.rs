//! Environments shared by every script
//!
//! - [`SharedEnvironment`]: frozen standard library and host bindings
//! - [`SharedObjects`]: mutable registry of values scripts publish to each other

mod objects;
mod shared;

pub use objects::{ObjectOwner, SharedObjects};
pub use shared::{ProtectionViolation, SharedEnvironment, BASE_FUNCTIONS, OS_FUNCTIONS, STD_NAMESPACES};
