//! Common error types for the HA control crates.

use std::fmt;

/// A specialized Result type for HA control operations.
pub type Result<T> = std::result::Result<T, Error>;

/// How a failure must be treated by the role state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network failure of a probe or send; drives counters only.
    Transport,
    /// Malformed configuration; the affected entry is disabled.
    Validation,
    /// A local resource required for correctness is unusable; escalates to Fault.
    Resource,
    /// The caller declared the action indispensable; the top level decides what to do.
    Fatal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Transport => write!(f, "transport"),
            ErrorClass::Validation => write!(f, "validation"),
            ErrorClass::Resource => write!(f, "resource"),
            ErrorClass::Fatal => write!(f, "fatal"),
        }
    }
}

/// Common error type for HA control operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Fatal error: {0}")]
    Fatal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new transport error.
    pub fn transport(msg: impl fmt::Display) -> Self {
        Error::Transport(msg.to_string())
    }

    /// Create a new validation error.
    pub fn validation(msg: impl fmt::Display) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Create a new resource error.
    pub fn resource(msg: impl fmt::Display) -> Self {
        Error::Resource(msg.to_string())
    }

    /// Create a new fatal error.
    pub fn fatal(msg: impl fmt::Display) -> Self {
        Error::Fatal(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Classify the error for failure policy.
    ///
    /// IO errors are treated as transport failures; configuration and
    /// serialization problems are validation failures.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Io(_) | Error::Transport(_) => ErrorClass::Transport,
            Error::Validation(_) | Error::Config(_) | Error::Serialization(_) => {
                ErrorClass::Validation
            }
            Error::Resource(_) => ErrorClass::Resource,
            Error::Fatal(_) => ErrorClass::Fatal,
        }
    }

    /// Whether this error must move the role machine to Fault.
    pub fn escalates(&self) -> bool {
        self.class() == ErrorClass::Resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(Error::transport("timeout").class(), ErrorClass::Transport);
        assert_eq!(Error::config("bad yaml").class(), ErrorClass::Validation);
        assert_eq!(Error::fatal("must run").class(), ErrorClass::Fatal);

        let io = Error::from(std::io::Error::other("reset"));
        assert_eq!(io.class(), ErrorClass::Transport);
    }

    #[test]
    fn test_only_resource_escalates() {
        assert!(Error::resource("bind failed").escalates());
        assert!(!Error::validation("no such interface").escalates());
        assert!(!Error::fatal("exit").escalates());
    }
}
