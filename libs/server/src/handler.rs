//! Adapters that shape a token exchange into an HTTP response.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{MethodRouter, post},
};
use serde_json::Value;
use tracing::error;

use crate::token::{GenerateTokenOptions, generate_token};

/// Performs one exchange and renders it: `200` with the credential or `500`
/// with `{ "error": message }`.
pub async fn token_response(options: &GenerateTokenOptions) -> Response {
    match generate_token(options).await {
        Ok(credential) => (StatusCode::OK, Json(credential)).into_response(),
        Err(err) => {
            error!(target = "copilot.server", error = %err, "token exchange failed");
            err.into_response()
        }
    }
}

/// `POST` route minting a token per request.
pub fn token_handler<S>(options: GenerateTokenOptions) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    post(move || {
        let options = options.clone();
        async move { token_response(&options).await }
    })
}

/// Response sink for frameworks that hand the handler a writer.
pub trait ResponseWriter {
    fn write_json(&mut self, status: StatusCode, body: Value);
}

/// Writer that keeps the last response, for hosts that build their own.
#[derive(Clone, Debug, Default)]
pub struct JsonResponseWriter {
    pub status: Option<StatusCode>,
    pub body: Option<Value>,
}

impl ResponseWriter for JsonResponseWriter {
    fn write_json(&mut self, status: StatusCode, body: Value) {
        self.status = Some(status);
        self.body = Some(body);
    }
}

impl IntoResponse for JsonResponseWriter {
    fn into_response(self) -> Response {
        let status = self.status.unwrap_or(StatusCode::NO_CONTENT);
        match self.body {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        }
    }
}

/// Same contract as [`token_response`], written into `writer`.
pub async fn token_middleware<W>(options: &GenerateTokenOptions, writer: &mut W)
where
    W: ResponseWriter + ?Sized,
{
    match generate_token(options).await {
        Ok(credential) => match serde_json::to_value(&credential) {
            Ok(body) => writer.write_json(StatusCode::OK, body),
            Err(err) => {
                error!(target = "copilot.server", error = %err, "failed to encode credential");
                writer.write_json(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "Token generation failed" }),
                );
            }
        },
        Err(err) => {
            error!(target = "copilot.server", error = %err, "token exchange failed");
            writer.write_json(StatusCode::INTERNAL_SERVER_ERROR, err.body());
        }
    }
}
