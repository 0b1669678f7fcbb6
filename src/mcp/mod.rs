pub mod elicit;
pub mod progress;
pub mod server;
pub mod types;

pub use server::FathomServer;
pub use types::*;
