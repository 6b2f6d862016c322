//! Configuration management for ParSPICE
//!
//! Configuration is split by functional domain (execution, logging), loaded
//! from YAML with `PARSPICE_*` environment variable overrides, and validated
//! per domain before use.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    execution::ExecutionConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    ParspiceConfig,
};
