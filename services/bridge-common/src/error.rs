//! Startup and configuration errors for the market bridge.
//!
//! Request-path failures have their own type in the service crate; this one
//! covers everything that can stop the process before it binds.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value the service cannot run with
    #[error("Configuration error: {0}")]
    Config(String),

    /// The symbol name map exists but is unusable
    #[error("Invalid name map: {0}")]
    NameMap(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Any of the above, tagged with the file or step that produced it
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap with a description of what was being attempted.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, past any context layers.
    pub fn root(&self) -> &Error {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self.root(), Self::Config(_))
    }

    /// True when a file could not be parsed, as opposed to read.
    pub fn is_malformed(&self) -> bool {
        matches!(self.root(), Self::Json(_) | Self::NameMap(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display_chains() {
        let err = Error::Config("port must be non-zero".into()).with_context("loading config.json");
        assert_eq!(
            err.to_string(),
            "loading config.json: Configuration error: port must be non-zero"
        );
        assert!(err.is_config());
        assert!(!err.is_malformed());
    }

    #[test]
    fn test_root_unwraps_nested_context() {
        let err = Error::NameMap("expected an object".into())
            .with_context("names.json")
            .with_context("startup");
        assert!(matches!(err.root(), Error::NameMap(_)));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_json_error_is_malformed() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = Error::from(parse).with_context("Failed to parse name map");
        assert!(err.is_malformed());
        assert!(err.to_string().starts_with("Failed to parse name map: JSON error"));
    }

    #[test]
    fn test_io_error_is_not_malformed() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::from(io);
        assert!(!err.is_malformed());
        assert!(!err.is_config());
    }
}
