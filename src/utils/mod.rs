//! Utility modules for error handling, configuration and tool discovery

pub mod config;
pub mod error;
pub mod paths;

// Re-export for convenience
pub use config::AppSettings;
pub use error::LoopError;
pub use paths::{find_tool, tool_path_or_name, Tool};
