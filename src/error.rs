use std::path::PathBuf;
use thiserror::Error;

/// Chewdoc error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    ConfigValidation(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Parser error: {0}")]
    Parser(String),

    /// The symbol set breaks an invariant the whole model depends on.
    #[error("Structural violation: duplicate qualified name `{qualified_name}` ({first} and {second})")]
    StructuralViolation {
        qualified_name: String,
        first: String,
        second: String,
    },
}

/// Result type alias for chewdoc operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a config validation error
    pub fn config_validation(msg: impl Into<String>) -> Self {
        Error::ConfigValidation(msg.into())
    }

    /// Create an analysis error
    pub fn analysis(msg: impl Into<String>) -> Self {
        Error::Analysis(msg.into())
    }

    /// Create a parser error
    pub fn parser(msg: impl Into<String>) -> Self {
        Error::Parser(msg.into())
    }

    /// Create a duplicate-name violation
    pub fn structural(
        qualified_name: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Error::StructuralViolation {
            qualified_name: qualified_name.into(),
            first: first.into(),
            second: second.into(),
        }
    }

    /// Whether this error means no model can be produced at all
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::StructuralViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_path_not_found_display() {
        let err = Error::PathNotFound(PathBuf::from("/some/path"));
        assert_eq!(err.to_string(), "Path not found: /some/path");
    }

    #[test]
    fn test_config_validation_display() {
        let err = Error::config_validation("max_example_lines must be at least 1");
        assert_eq!(
            err.to_string(),
            "Config validation error: max_example_lines must be at least 1"
        );
    }

    #[test]
    fn test_structural_violation() {
        let err = Error::structural("pkg.mod", "pkg/mod.py:1", "pkg/mod/__init__.py:1");
        assert!(err.is_structural());
        assert!(err.to_string().contains("`pkg.mod`"));
        assert!(!Error::analysis("x").is_structural());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
