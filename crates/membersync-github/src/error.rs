//! Error types for the GitHub collaborators.

use thiserror::Error;

use membersync_reconcile::{PaginationError, RemoteError};

/// Result type alias using `GitHubError`.
pub type GitHubResult<T> = Result<T, GitHubError>;

/// Errors that can occur when talking to GitHub.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// Client configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL construction error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// GitHub answered with a non-success status.
    #[error("GitHub API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        documentation_url: Option<String>,
    },

    /// The response parsed but did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,
}

impl GitHubError {
    /// HTTP status code, if GitHub answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            GitHubError::Api { status, .. } => Some(*status),
            GitHubError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether GitHub reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<GitHubError> for RemoteError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Api {
                status, message, ..
            } => RemoteError::Status { status, message },
            GitHubError::Http(e) => match e.status() {
                Some(status) => RemoteError::status(status.as_u16(), e.to_string()),
                None if e.is_decode() => RemoteError::Decode(e.to_string()),
                None => RemoteError::Transport(e.to_string()),
            },
            GitHubError::Json(e) => RemoteError::Decode(e.to_string()),
            GitHubError::UnexpectedResponse(msg) => RemoteError::Decode(msg),
            other @ (GitHubError::Config(_) | GitHubError::Url(_) | GitHubError::Cancelled) => {
                RemoteError::Transport(other.to_string())
            }
        }
    }
}

impl From<PaginationError<GitHubError>> for GitHubError {
    fn from(err: PaginationError<GitHubError>) -> Self {
        match err {
            PaginationError::Remote(e) => e,
            PaginationError::Cancelled => GitHubError::Cancelled,
            PaginationError::Stalled { cursor } => {
                GitHubError::UnexpectedResponse(format!("pagination repeated {cursor}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_maps_status_through() {
        let err = GitHubError::Api {
            status: 409,
            message: "Conflict".into(),
            documentation_url: None,
        };
        assert_eq!(err.status(), Some(409));
        assert_eq!(RemoteError::from(err), RemoteError::status(409, "Conflict"));
    }

    #[test]
    fn test_not_found_detection() {
        let err = GitHubError::Api {
            status: 404,
            message: "Not Found".into(),
            documentation_url: Some("https://docs.github.com".into()),
        };
        assert!(err.is_not_found());
        assert!(!GitHubError::Cancelled.is_not_found());
    }

    #[test]
    fn test_decode_failures_map_to_decode() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(
            RemoteError::from(GitHubError::Json(json_err)),
            RemoteError::Decode(_)
        ));
        assert!(matches!(
            RemoteError::from(GitHubError::UnexpectedResponse("empty".into())),
            RemoteError::Decode(_)
        ));
    }

    #[test]
    fn test_stalled_pagination_becomes_unexpected_response() {
        let err: GitHubError = PaginationError::Stalled {
            cursor: membersync_reconcile::Cursor::Page(3),
        }
        .into();
        assert!(err.to_string().contains("page 3"));
    }

    #[test]
    fn test_error_display() {
        let err = GitHubError::Api {
            status: 422,
            message: "Validation Failed".into(),
            documentation_url: None,
        };
        assert_eq!(err.to_string(), "GitHub API error (422): Validation Failed");
    }
}
