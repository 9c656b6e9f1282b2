//! Error types for the streaming parser

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// feed() was called after finalize()
    #[error("cannot feed chunks after finalize() has been called")]
    FeedAfterFinalize,

    /// finalize() was called more than once
    #[error("finalize() has already been called")]
    DoubleFinalize,

    /// A content event was emitted without an open segment
    #[error("cannot emit content without an open segment")]
    NoOpenSegment,

    /// Unknown parser variant name
    #[error("unknown parser variant: {0}")]
    UnknownParser(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new unknown-parser error
    pub fn unknown_parser(name: impl Into<String>) -> Self {
        Error::UnknownParser(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_feed_after_finalize() {
        let err = Error::FeedAfterFinalize;
        assert_eq!(
            err.to_string(),
            "cannot feed chunks after finalize() has been called"
        );
    }

    #[test]
    fn test_error_no_open_segment() {
        let err = Error::NoOpenSegment;
        assert_eq!(err.to_string(), "cannot emit content without an open segment");
    }

    #[test]
    fn test_error_unknown_parser() {
        let err = Error::unknown_parser("yaml");
        assert!(matches!(err, Error::UnknownParser(_)));
        assert_eq!(err.to_string(), "unknown parser variant: yaml");
    }

    #[test]
    fn test_error_config() {
        let err = Error::config("empty strategy order");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "invalid configuration: empty strategy order");
    }

    #[test]
    fn test_result_type_alias() {
        fn _returns_result() -> Result<i32> {
            Ok(42)
        }

        fn _returns_error() -> Result<i32> {
            Err(Error::DoubleFinalize)
        }
    }
}
