//! CLI error types and exit codes

use thiserror::Error;

use membersync_github::GitHubError;
use membersync_reconcile::{ConfigError, ReconcileError, ReconcileFailure, RemoteError};

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Authentication or permission error
/// - 3: Network error
/// - 4: Validation error (bad input, missing or archived target)
/// - 5: Server error (including an exhausted retry budget)
/// - 130: Interrupted
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Archived(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Interrupted")]
    Cancelled,

    #[error("Output error: {0}")]
    Output(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Unauthorized(_) => 2,
            CliError::Network(_) => 3,
            CliError::Validation(_) | CliError::NotFound(_) | CliError::Archived(_) => 4,
            CliError::Server(_) => 5,
            CliError::Api { status, .. } => {
                if *status >= 500 {
                    5
                } else if *status == 401 || *status == 403 {
                    2
                } else {
                    4
                }
            }
            CliError::Cancelled => 130,
            CliError::Config(_) | CliError::Output(_) => 1,
        }
    }

    /// Suggested follow-up, if any.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(_) => Some("Set GITHUB_TOKEN and --enterprise (or GITHUB_ENTERPRISE)."),
            CliError::Unauthorized(_) => {
                Some("Check that the token has the enterprise admin scopes.")
            }
            CliError::Server(_) => Some("Re-run the same command; apply is idempotent."),
            _ => None,
        }
    }

    /// Print the error (and suggestion) to stderr.
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {self}");
        } else {
            eprintln!("Error: {self}");
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {suggestion}");
            } else {
                eprintln!("\nSuggestion: {suggestion}");
            }
        }
    }

    fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => CliError::Unauthorized(message),
            404 => CliError::NotFound(message),
            500..=599 => CliError::Server(message),
            _ => CliError::Api { status, message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Output(err.to_string())
    }
}

impl From<GitHubError> for CliError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Api {
                status, message, ..
            } => CliError::from_status(status, message),
            GitHubError::Http(e) if e.status().is_none() => CliError::Network(e.to_string()),
            GitHubError::Cancelled => CliError::Cancelled,
            GitHubError::Config(msg) => CliError::Config(msg),
            GitHubError::Url(e) => CliError::Config(e.to_string()),
            other => CliError::Server(other.to_string()),
        }
    }
}

impl From<RemoteError> for CliError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Status { status, message } => CliError::from_status(status, message),
            RemoteError::Transport(msg) => CliError::Network(msg),
            RemoteError::Decode(msg) => CliError::Server(msg),
        }
    }
}

impl From<ReconcileFailure> for CliError {
    fn from(failure: ReconcileFailure) -> Self {
        let message = failure.to_string();
        match failure.error() {
            ReconcileError::NotFound { .. } => CliError::NotFound(message),
            ReconcileError::Archived { .. } => CliError::Archived(message),
            ReconcileError::Cancelled => CliError::Cancelled,
            ReconcileError::UnsupportedCategory { .. } => CliError::Validation(message),
            ReconcileError::Validation { source } => match source.http_status() {
                Some(401 | 403) => CliError::Unauthorized(message),
                _ => CliError::Validation(message),
            },
            ReconcileError::Remote {
                source: RemoteError::Transport(_),
            } => CliError::Network(message),
            ReconcileError::Transient { .. }
            | ReconcileError::RetryBudgetExceeded { .. }
            | ReconcileError::StalledPagination { .. }
            | ReconcileError::Remote { .. } => CliError::Server(message),
        }
    }
}
