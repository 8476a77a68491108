use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::{
    config::ConnectionOptions,
    error::{ConnectError, TokenFetchError, TransportError},
    transport::{DirectLineOptions, SharedHandle, TransportLoader},
    types::Credential,
};

/// Source of Direct Line credentials.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self, endpoint: &str) -> Result<Credential, TokenFetchError>;
}

pub type SharedTokenSource = Arc<dyn TokenSource>;

/// Calls the application's token endpoint over HTTP.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTokenSource {
    client: Client,
}

impl ReqwestTokenSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenSource for ReqwestTokenSource {
    async fn fetch_token(&self, endpoint: &str) -> Result<Credential, TokenFetchError> {
        fetch_token(&self.client, endpoint).await
    }
}

/// Exchanges nothing but a `POST` for a credential; the endpoint holds the
/// Direct Line secret.
pub async fn fetch_token(client: &Client, endpoint: &str) -> Result<Credential, TokenFetchError> {
    let result = request_token(client, endpoint).await;
    if let Err(err) = &result {
        counter!("copilot_errors_total", "kind" => err.metric_kind()).increment(1);
    }
    result
}

async fn request_token(client: &Client, endpoint: &str) -> Result<Credential, TokenFetchError> {
    let url = Url::parse(endpoint).map_err(|source| TokenFetchError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        source,
    })?;

    let started = Instant::now();
    let response = client
        .post(url)
        .send()
        .await
        .map_err(TokenFetchError::Transport)?;

    let status = response.status();
    histogram!(
        "copilot_token_fetch_seconds",
        "status" => status.as_str().to_string()
    )
    .record(started.elapsed().as_secs_f64());

    if !status.is_success() {
        warn!(target = "copilot.token", %status, "token endpoint rejected the request");
        return Err(TokenFetchError::Status { status });
    }

    let credential = response
        .json::<Credential>()
        .await
        .map_err(TokenFetchError::Decode)?;
    debug!(
        target = "copilot.token",
        has_conversation = credential.conversation_id.is_some(),
        expires_in = credential.expires_in,
        "fetched Copilot token"
    );
    Ok(credential)
}

/// Fetches a credential and opens a Direct Line connection with it.
pub async fn create_connection(
    tokens: &dyn TokenSource,
    loader: &dyn TransportLoader,
    options: &ConnectionOptions,
) -> Result<SharedHandle, ConnectError> {
    let credential = tokens.fetch_token(&options.token_endpoint).await?;
    let availability = loader.load().await;
    let transport = availability
        .transport()
        .ok_or(TransportError::Unavailable)?;
    let handle = transport.create_direct_line(DirectLineOptions::from_credential(
        credential,
        options.direct_line_domain.clone(),
    ))?;
    Ok(handle)
}
