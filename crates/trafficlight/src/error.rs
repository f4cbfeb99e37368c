//! Traffic light error types.

use reqwest::StatusCode;
use thiserror::Error;

use crate::credentials::CredentialKey;
use crate::particle::StatusCommand;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the collaborators around the status stream.
///
/// The stream core itself never fails hard: transport problems surface as a
/// stale connection and are handled by the next scheduler tick.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("missing credential `{0}`")]
    MissingCredential(CredentialKey),

    #[error("device rejected `{command}` (return value {return_value})")]
    CommandRejected {
        command: StatusCommand,
        return_value: i64,
    },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("credential file error: {reason}")]
    CredentialFile { reason: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl Error {
    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    pub fn credential_file(reason: impl Into<String>) -> Self {
        Self::CredentialFile {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
