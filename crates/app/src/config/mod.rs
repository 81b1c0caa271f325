//! Configuration
//!
//! Command-line flags with environment fallbacks. A `.env` file in the working
//! directory is loaded before parsing.

pub mod compile;
pub mod logging;

pub use compile::{CompileConfig, WindowStrategy};
pub use logging::{LogFormat, LoggingConfig};
