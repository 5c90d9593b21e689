mod call_phase;
mod peer_connection_manager;

pub use call_phase::*;
pub use peer_connection_manager::*;
