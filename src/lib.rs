pub mod cli;
pub mod config;
pub mod error;
pub mod init;
pub mod mcp;
pub mod pipeline;
pub mod progress;
pub mod upstream;

pub use error::FathomError;
