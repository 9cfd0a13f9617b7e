//! Error handling and configuration shared by every monodelta component.

#![warn(missing_docs)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, LogLevel};
pub use error::{DeltaError, Result};
