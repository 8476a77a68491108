use std::{fmt, time::Instant};

use copilot_widget_core::Credential;
use metrics::{counter, histogram};
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, Secret};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::TokenExchangeError;

pub const DEFAULT_DIRECT_LINE_URL: &str =
    "https://directline.botframework.com/v3/directline/tokens/generate";

/// Secret and endpoint used to mint Direct Line tokens.
#[derive(Clone)]
pub struct GenerateTokenOptions {
    secret: Secret<String>,
    direct_line_url: Option<String>,
    client: Client,
}

impl GenerateTokenOptions {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Secret::new(secret.into()),
            direct_line_url: None,
            client: Client::new(),
        }
    }

    /// Overrides the `tokens/generate` URL, e.g. for sovereign clouds.
    pub fn with_direct_line_url(mut self, url: impl Into<String>) -> Self {
        self.direct_line_url = Some(url.into());
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn direct_line_url(&self) -> &str {
        self.direct_line_url
            .as_deref()
            .unwrap_or(DEFAULT_DIRECT_LINE_URL)
    }
}

impl fmt::Debug for GenerateTokenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerateTokenOptions")
            .field("secret", &"[REDACTED]")
            .field("direct_line_url", &self.direct_line_url())
            .finish_non_exhaustive()
    }
}

/// Exchanges the Direct Line secret for a short-lived token.
pub async fn generate_token(
    options: &GenerateTokenOptions,
) -> Result<Credential, TokenExchangeError> {
    let result = exchange(options).await;
    match &result {
        Ok(_) => counter!("copilot_tokens_generated_total").increment(1),
        Err(err) => {
            counter!("copilot_errors_total", "kind" => err.metric_kind()).increment(1);
        }
    }
    result
}

async fn exchange(options: &GenerateTokenOptions) -> Result<Credential, TokenExchangeError> {
    let endpoint = options.direct_line_url();
    let url = Url::parse(endpoint).map_err(|_| TokenExchangeError::InvalidUrl(endpoint.into()))?;

    let started = Instant::now();
    let response = options
        .client
        .post(url)
        .bearer_auth(options.secret.expose_secret())
        .json(&json!({}))
        .send()
        .await
        .map_err(TokenExchangeError::Transport)?;

    let status = response.status();
    histogram!(
        "copilot_token_exchange_seconds",
        "status" => status.as_str().to_string()
    )
    .record(started.elapsed().as_secs_f64());

    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable>".into());
        warn!(
            target = "copilot.server",
            %status,
            "Direct Line rejected the token request"
        );
        return Err(TokenExchangeError::remote(status, body));
    }

    let credential = response
        .json::<Credential>()
        .await
        .map_err(TokenExchangeError::Decode)?;
    debug!(
        target = "copilot.server",
        expires_in = credential.expires_in,
        "generated Direct Line token"
    );
    Ok(credential)
}
