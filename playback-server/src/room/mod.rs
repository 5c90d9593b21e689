mod directory;
mod hub;
mod hub_command;
mod registry;

pub use directory::*;
pub use hub::*;
pub use hub_command::*;
pub use registry::*;
