use axum::{Router, http::StatusCode, routing::get};

use crate::{handler::token_handler, token::GenerateTokenOptions};

pub const DEFAULT_TOKEN_ROUTE: &str = "/api/copilot/token";

/// Token endpoint at [`DEFAULT_TOKEN_ROUTE`] plus `GET /healthz`.
pub fn router(options: GenerateTokenOptions) -> Router {
    router_at(DEFAULT_TOKEN_ROUTE, options)
}

pub fn router_at(route: &str, options: GenerateTokenOptions) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(route, token_handler(options))
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthz_returns_no_content() {
        assert_eq!(healthz().await, StatusCode::NO_CONTENT);
    }
}
