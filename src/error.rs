use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for gh-weekly-updates
#[derive(Error, Debug)]
pub enum WeeklyUpdatesError {
    /// No usable token, or the token was rejected
    #[error("Authentication error: {0}")]
    Auth(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file not found at an explicitly requested path
    #[error("Config file not found at: {0}")]
    ConfigNotFound(PathBuf),

    /// YAML parsing errors
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Activity window errors
    #[error("Invalid activity window: {0}")]
    InvalidWindow(String),

    /// Transport-level HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success status from the GitHub REST or GraphQL endpoint
    #[error("GitHub API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// GraphQL response carried an `errors` array
    #[error("GitHub GraphQL error: {0}")]
    GraphQl(String),

    /// The chat-completion call failed or returned nothing usable
    #[error("Summarisation error: {0}")]
    Summarisation(String),

    /// Git errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Publishing errors
    #[error("Publish error: {0}")]
    Publish(String),
}

/// Result type alias for gh-weekly-updates operations
pub type Result<T> = std::result::Result<T, WeeklyUpdatesError>;

impl WeeklyUpdatesError {
    /// Create a new authentication error
    pub fn auth<S: Into<String>>(msg: S) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new summarisation error
    pub fn summarisation<S: Into<String>>(msg: S) -> Self {
        Self::Summarisation(msg.into())
    }

    /// Create a new publish error
    pub fn publish<S: Into<String>>(msg: S) -> Self {
        Self::Publish(msg.into())
    }

    /// Errors that must abort the run even inside partial-failure tolerant stages
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// 403/404/422: the token cannot see the repo, or it was renamed or deleted
    pub fn is_access_error(&self) -> bool {
        matches!(self, Self::Api { status: 403 | 404 | 422, .. })
    }
}

/// Recoverable conditions that degrade the run instead of aborting it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// One contribution source failed during repo discovery
    Discovery { source: String, message: String },
    /// One query failed for one repo (or for the global scope)
    Collection {
        scope: String,
        query: String,
        message: String,
    },
    /// Pushing the report failed after local output succeeded
    Publish { target: String, message: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Discovery { source, message } => {
                write!(f, "discovery of {} skipped: {}", source, message)
            }
            Warning::Collection {
                scope,
                query,
                message,
            } => write!(f, "{} for {} skipped: {}", query, scope, message),
            Warning::Publish { target, message } => {
                write!(f, "push to {} failed: {}", target, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_errors() {
        for status in [403, 404, 422] {
            let err = WeeklyUpdatesError::Api {
                status,
                message: "Not Found".to_string(),
            };
            assert!(err.is_access_error());
            assert!(!err.is_fatal());
        }

        let err = WeeklyUpdatesError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(!err.is_access_error());
    }

    #[test]
    fn test_auth_is_fatal() {
        assert!(WeeklyUpdatesError::auth("no token").is_fatal());
        assert!(!WeeklyUpdatesError::config("bad").is_fatal());
    }

    #[test]
    fn test_warning_display() {
        let warning = Warning::Collection {
            scope: "octo/repo".to_string(),
            query: "issue comments".to_string(),
            message: "HTTP 404".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "issue comments for octo/repo skipped: HTTP 404"
        );
    }
}
