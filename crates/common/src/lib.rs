//! Common utilities and types shared across the HA control crates.

pub mod error;
pub mod logging;

pub use error::{Error, ErrorClass, Result};
pub use logging::LogLevel;
