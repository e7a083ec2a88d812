use serde_json::Value;
use thiserror::Error;

/// Why a coordinated refresh did not produce a new access token.
///
/// Cloned to every request that was queued behind the refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    #[error("no refresh token held locally")]
    NoRefreshToken,
    #[error("refresh rejected with status {status}")]
    Rejected { status: u16, code: Option<String> },
    #[error("refresh request failed: {0}")]
    Transport(String),
    #[error("refresh response could not be decoded: {0}")]
    Decode(String),
    /// The task driving the refresh was cancelled before it settled.
    #[error("refresh abandoned before completion")]
    Abandoned,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request rejected with status {status}")]
    Rejected {
        status: u16,
        code: Option<String>,
        body: Value,
    },
    #[error(transparent)]
    Refresh(#[from] RefreshFailure),
    #[error("response could not be decoded: {0}")]
    Decode(String),
    #[error("no active session")]
    NotAuthenticated,
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl ClientError {
    /// HTTP status of a rejected request, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Rejected { status, .. } => Some(*status),
            ClientError::Refresh(RefreshFailure::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }
}
