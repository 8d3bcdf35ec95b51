//! Error types for trogon-credentials

use thiserror::Error;

use crate::engines::password::GenerateError;

/// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors returned by [`Engine`](crate::Engine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configured connection URI could not be parsed. Detected before any
    /// backend call is made.
    #[error("invalid uri: {0}")]
    InvalidUri(String),

    /// The revocation token does not decode into the shape the engine expects.
    #[error("invalid revocation data")]
    InvalidRevocation,

    #[error("configuration error: {0}")]
    Config(String),

    /// The backend rejected or failed a request made on behalf of `principal`.
    #[error("backend error for {principal:?}: {source}")]
    Backend {
        principal: String,
        #[source]
        source: ClientError,
    },

    /// The principal exists on the backend but was not fully provisioned.
    /// Cleanup is left to the caller.
    #[error("user {principal:?} created but permissions on vhost {vhost:?} failed: {source}")]
    PartiallyProvisioned {
        principal: String,
        vhost: String,
        #[source]
        source: ClientError,
    },

    #[error("password generation failed: {0}")]
    Generation(#[from] GenerateError),
}

impl EngineError {
    pub(crate) fn backend(principal: impl Into<String>, source: ClientError) -> Self {
        Self::Backend {
            principal: principal.into(),
            source,
        }
    }

    pub fn is_invalid_revocation(&self) -> bool {
        matches!(self, Self::InvalidRevocation)
    }

    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::Backend { .. } | Self::PartiallyProvisioned { .. }
        )
    }

    /// The backend principal the failure relates to, when there is one.
    pub fn principal(&self) -> Option<&str> {
        match self {
            Self::Backend { principal, .. } | Self::PartiallyProvisioned { principal, .. } => {
                Some(principal)
            }
            _ => None,
        }
    }
}

/// Failures reported by backend collaborators (HTTP admin APIs, SQL).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("url error: {0}")]
    Url(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}
