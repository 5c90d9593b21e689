pub mod call;
pub mod config;
pub mod error;
pub mod media;
pub mod mesh;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use call::*;
pub use config::*;
pub use error::{ClientError, Result};
pub use media::*;
pub use mesh::*;
pub use peer::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
