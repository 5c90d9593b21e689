mod http_handler;
mod relay;
mod ws_handler;

pub use http_handler::*;
pub use relay::*;
pub use ws_handler::*;
