//! Server side of the Copilot widget: exchanges the Direct Line secret for a
//! short-lived token so the secret never reaches the browser.
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod token;

pub use config::{ConfigError, ServerConfig};
pub use error::TokenExchangeError;
pub use handler::{
    JsonResponseWriter, ResponseWriter, token_handler, token_middleware, token_response,
};
pub use http::{DEFAULT_TOKEN_ROUTE, router, router_at};
pub use token::{DEFAULT_DIRECT_LINE_URL, GenerateTokenOptions, generate_token};
