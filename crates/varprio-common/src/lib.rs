//! varprio-common: Shared errors, configuration, and the allowlisted HTTP
//! client used across all varprio crates.

pub mod error;
pub mod config;
pub mod sandbox;

// Re-export commonly used types
pub use config::{Config, ExecutionConfig, ExecutionModeSetting, ParseModeSetting, ProviderConfig};
pub use error::{IngestionError, Result, VarprioError};
