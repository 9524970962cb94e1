use thiserror::Error;

use crate::config::LoadError;
use crate::domain::error::DomainError;
use crate::infra::error::{InfraError, StorageError};
use crate::presentation::markdown::RenderError;

use super::post::Phase;

/// Classified failure of a posts API call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("base URL `{0}` cannot carry a path")]
    BaseUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401 and 403 mean the held token (or its absence) was rejected.
    pub fn is_authorization(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

/// Failure of a controller operation.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("{0}")]
    Validation(#[from] DomainError),
    #[error("authorization rejected (status {status}); sign in again")]
    Unauthorized { status: u16 },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("cannot {op} while {phase}")]
    InvalidState { op: &'static str, phase: Phase },
    #[error("no post is loaded")]
    NotLoaded,
    #[error("server response did not include a post id")]
    MissingId,
}

impl ControllerError {
    pub(crate) fn invalid_state(op: &'static str, phase: Phase) -> Self {
        Self::InvalidState { op, phase }
    }
}

/// Top-level error of the command-line shell.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
    #[error("failed to read input {path}: {source}")]
    Input {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
