mod negotiation_role;
mod peer_connection_state;
mod session_links;

pub use negotiation_role::*;
pub use peer_connection_state::*;
pub use session_links::*;
