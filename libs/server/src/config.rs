use std::{fmt, net::SocketAddr};

use crate::{http::DEFAULT_TOKEN_ROUTE, token::GenerateTokenOptions};

const DEFAULT_BIND: &str = "0.0.0.0:8090";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid BIND address `{value}`")]
    InvalidBind {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// Token server settings, normally read from the environment.
#[derive(Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub token_route: String,
    pub options: GenerateTokenOptions,
}

impl ServerConfig {
    /// Reads `COPILOT_SECRET` (required), `DIRECT_LINE_URL`, `BIND` and
    /// `TOKEN_ROUTE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = lookup("COPILOT_SECRET")
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing("COPILOT_SECRET"))?;
        let mut options = GenerateTokenOptions::new(secret);
        if let Some(url) = lookup("DIRECT_LINE_URL").filter(|value| !value.is_empty()) {
            options = options.with_direct_line_url(url);
        }

        let bind_value = lookup("BIND").unwrap_or_else(|| DEFAULT_BIND.into());
        let bind = bind_value
            .parse()
            .map_err(|source| ConfigError::InvalidBind {
                value: bind_value.clone(),
                source,
            })?;
        let token_route = lookup("TOKEN_ROUTE").unwrap_or_else(|| DEFAULT_TOKEN_ROUTE.into());

        Ok(Self {
            bind,
            token_route,
            options,
        })
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("token_route", &self.token_route)
            .field("options", &self.options)
            .finish()
    }
}
