use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

const MAX_REMOTE_MESSAGE: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum TokenExchangeError {
    #[error("invalid Direct Line URL `{0}`")]
    InvalidUrl(String),
    #[error("failed to generate Direct Line token: {status}")]
    Remote { status: StatusCode, message: String },
    #[error("failed to reach Direct Line")]
    Transport(#[source] reqwest::Error),
    #[error("failed to decode Direct Line token response")]
    Decode(#[source] reqwest::Error),
}

impl TokenExchangeError {
    pub(crate) fn remote(status: StatusCode, body: String) -> Self {
        let message = if body.len() > MAX_REMOTE_MESSAGE {
            let mut end = MAX_REMOTE_MESSAGE;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body[..end].to_string()
        } else {
            body
        };
        TokenExchangeError::Remote { status, message }
    }

    pub(crate) fn metric_kind(&self) -> &'static str {
        match self {
            TokenExchangeError::InvalidUrl(_) => "exchange_config",
            TokenExchangeError::Remote { .. } => "exchange_remote",
            TokenExchangeError::Transport(_) => "exchange_transport",
            TokenExchangeError::Decode(_) => "exchange_decode",
        }
    }

    /// JSON body sent to the browser; never carries the secret.
    pub fn body(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

impl IntoResponse for TokenExchangeError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self.body())).into_response()
    }
}
