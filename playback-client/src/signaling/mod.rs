mod signaling_client;
mod signaling_sink;

pub use signaling_client::*;
pub use signaling_sink::*;
