use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenFetchError {
    #[error("invalid token endpoint `{endpoint}`")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to fetch Copilot token: {status}")]
    Status { status: StatusCode },
    #[error("failed to fetch Copilot token: endpoint unreachable")]
    Transport(#[source] reqwest::Error),
    #[error("failed to decode Copilot token response")]
    Decode(#[source] reqwest::Error),
}

impl TokenFetchError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TokenFetchError::Status { status } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn metric_kind(&self) -> &'static str {
        match self {
            TokenFetchError::InvalidEndpoint { .. } => "token_endpoint_invalid",
            TokenFetchError::Status { .. } => "token_remote",
            TokenFetchError::Transport(_) => "token_transport",
            TokenFetchError::Decode(_) => "token_decode",
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("chat transport is not available")]
    Unavailable,
    #[error("failed to create direct line connection: {0}")]
    DirectLine(String),
    #[error("failed to create chat store: {0}")]
    Store(String),
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Token(#[from] TokenFetchError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A consumer accessor was called outside a `CopilotProvider` scope.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{accessor} must be used within a CopilotProvider scope")]
pub struct UsageError {
    accessor: &'static str,
}

impl UsageError {
    pub(crate) fn new(accessor: &'static str) -> Self {
        Self { accessor }
    }

    pub fn accessor(&self) -> &'static str {
        self.accessor
    }
}
