//! Infrastructure layer
//!
//! Adapters to the outside world: hierarchical configuration loading and
//! the tracing bootstrap. The engine itself never touches files or
//! environment variables.

pub mod config;
pub mod logging;

pub use config::{ConfigLoadError, ConfigLoader};
pub use logging::{init_logging, LogConfig, LogFormat};
