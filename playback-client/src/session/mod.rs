mod client_event;
mod room_session;
mod session_command;
mod session_handle;

pub use client_event::*;
pub use room_session::*;
pub use session_command::*;
pub use session_handle::*;
