//! Error types for provisioning operations.
//!
//! Every failure aborts the run. Nothing is retried or swallowed, so each
//! variant carries enough context (variable, path, endpoint) to diagnose the
//! problem from a single run.

use std::fmt;

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for a provisioning run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A mandatory identifier was never supplied.
    #[error("missing required input `{variable}`\n\n{example}")]
    MissingRequiredInput {
        /// Variable name (e.g. `db_username`).
        variable: String,
        /// Example of how to supply it.
        example: String,
    },

    /// A secret could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The key block could not be obtained.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Template and context do not match.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A remote probe, mkdir, publish or copy failed.
    #[error(transparent)]
    Remote(#[from] RemoteIoError),

    /// A registered hook failed.
    #[error("{phase} hook #{index} for `{step}` failed: {message}")]
    Hook {
        /// Step the hook is attached to.
        step: &'static str,
        /// Whether it ran before or after the step.
        phase: &'static str,
        /// Position in registration order.
        index: usize,
        /// Error reported by the hook.
        message: String,
    },

    /// Promote was asked to copy an artifact that was never published.
    #[error("no configuration published at {path}")]
    ArtifactMissing {
        /// Shared artifact path.
        path: String,
    },
}

impl Error {
    /// One-line hint for resolving this error, shown by the CLI.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::MissingRequiredInput { .. } => "Set the value in confseed.toml or the environment",
            Self::Resolve(ResolveError::NoValueAvailable { .. }) => {
                "Pre-set the password in the environment or run from an interactive terminal"
            }
            Self::Resolve(_) => "Check the extraction pattern and terminal input",
            Self::Provider(_) => "Check connectivity to the key generator endpoint and try again",
            Self::Render(_) => "The template references a variable that was never configured",
            Self::Remote(_) => "Check connectivity and permissions on the target host",
            Self::Hook { .. } => "Fix the failing hook and run again",
            Self::ArtifactMissing { .. } => "Run `confseed configure` first",
        }
    }
}

/// Errors from the credential resolver.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No pre-set value, nothing extractable, and nobody to ask.
    #[error("no value available for `{variable}` (not pre-set, not found remotely, not interactive)")]
    NoValueAvailable {
        /// Variable that stayed unresolved.
        variable: String,
    },

    /// The extraction pattern does not compile or lacks a single capture group.
    #[error("invalid extraction pattern for `{variable}`: {message}")]
    InvalidPattern {
        /// Variable the pattern belongs to.
        variable: String,
        /// Why the pattern was rejected.
        message: String,
    },

    /// The operator prompt itself failed (e.g. terminal closed).
    #[error("failed to read `{variable}` from the terminal: {message}")]
    Input {
        /// Variable being prompted for.
        variable: String,
        /// Underlying input error.
        message: String,
    },
}

/// Errors from the secret key set provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The generator endpoint could not be reached or answered with an error.
    #[error("key generator {endpoint} unavailable: {message}")]
    Unavailable {
        /// Endpoint URL.
        endpoint: String,
        /// Transport or HTTP error.
        message: String,
        /// HTTP status code if the server answered.
        status: Option<u16>,
    },

    /// The generator answered with an empty body.
    #[error("key generator {endpoint} returned no key material")]
    EmptyResponse {
        /// Endpoint URL.
        endpoint: String,
    },
}

impl ProviderError {
    /// Create an unavailable error without a status code.
    pub fn unavailable(endpoint: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Unavailable {
            endpoint: endpoint.into(),
            message: message.to_string(),
            status: None,
        }
    }

    /// Map a ureq error, keeping the status code when there is one.
    pub(crate) fn from_ureq(endpoint: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Unavailable {
                endpoint: endpoint.to_string(),
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::unavailable(endpoint, other),
        }
    }
}

/// Errors from the renderer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The template references a variable missing (or empty) in the context.
    #[error("template variable `{0}` has no value")]
    MissingVariable(String),
}

/// Errors from remote filesystem operations, surfaced verbatim.
#[derive(Debug, thiserror::Error)]
pub enum RemoteIoError {
    /// Existence probe failed.
    #[error("failed to probe {path} on {target}: {message}")]
    Probe {
        /// Target description.
        target: String,
        /// Remote path.
        path: String,
        /// Underlying error.
        message: String,
    },

    /// Reading the remote artifact failed.
    #[error("failed to read {path} on {target}: {message}")]
    Read {
        /// Target description.
        target: String,
        /// Remote path.
        path: String,
        /// Underlying error.
        message: String,
    },

    /// Creating the shared config directory failed.
    #[error("failed to create directory {path} on {target}: {message}")]
    CreateDir {
        /// Target description.
        target: String,
        /// Remote path.
        path: String,
        /// Underlying error.
        message: String,
    },

    /// Publishing the artifact failed.
    #[error("failed to publish {path} on {target}: {message}")]
    Publish {
        /// Target description.
        target: String,
        /// Remote path.
        path: String,
        /// Underlying error.
        message: String,
    },

    /// Copying the artifact into the release failed.
    #[error("failed to copy {from} to {to} on {target}: {message}")]
    Copy {
        /// Target description.
        target: String,
        /// Source path.
        from: String,
        /// Destination path.
        to: String,
        /// Underlying error.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_input_message() {
        let err = Error::MissingRequiredInput {
            variable: "db_username".to_string(),
            example: "[database]\nusername = \"bunny_prd\"".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("db_username"));
        assert!(display.contains("bunny_prd"));
    }

    #[test]
    fn test_transparent_render_error() {
        let err: Error = RenderError::MissingVariable("db_database".to_string()).into();
        assert_eq!(err.to_string(), "template variable `db_database` has no value");
    }

    #[test]
    fn test_provider_error_keeps_endpoint() {
        let err = ProviderError::unavailable("https://keys.example", "connection refused");
        let display = err.to_string();
        assert!(display.contains("https://keys.example"));
        assert!(display.contains("connection refused"));
    }

    #[test]
    fn test_status_code_is_kept() {
        let err = ProviderError::from_ureq("https://keys.example", ureq::Error::StatusCode(503));
        match err {
            ProviderError::Unavailable { status, message, .. } => {
                assert_eq!(status, Some(503));
                assert_eq!(message, "HTTP 503");
            }
            ProviderError::EmptyResponse { .. } => panic!("Expected Unavailable"),
        }
    }

    #[test]
    fn test_remote_error_is_verbatim() {
        let err = RemoteIoError::Publish {
            target: "deploy@web1".to_string(),
            path: "/srv/shared/config/wp-config.php".to_string(),
            message: "Permission denied".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("deploy@web1"));
        assert!(display.ends_with("Permission denied"));
    }

    #[test]
    fn test_advice_is_never_empty() {
        let errors = [
            Error::ArtifactMissing {
                path: "/x".to_string(),
            },
            Error::Resolve(ResolveError::NoValueAvailable {
                variable: "db_password".to_string(),
            }),
            Error::Provider(ProviderError::EmptyResponse {
                endpoint: "https://keys.example".to_string(),
            }),
        ];
        for err in &errors {
            assert!(!err.advice().is_empty());
        }
    }
}
