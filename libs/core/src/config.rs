use std::{fmt, sync::Arc};

use crate::types::Activity;

pub type ActivityCallback = Arc<dyn Fn(&Activity) + Send + Sync>;

/// Settings that identify one connection; changing either restarts it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub token_endpoint: String,
    pub direct_line_domain: Option<String>,
}

impl ConnectionOptions {
    pub fn new(token_endpoint: impl Into<String>) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            direct_line_domain: None,
        }
    }

    pub fn with_direct_line_domain(mut self, domain: impl Into<String>) -> Self {
        self.direct_line_domain = Some(domain.into());
        self
    }
}

/// Provider configuration.
#[derive(Clone)]
pub struct CopilotConfig {
    connection: ConnectionOptions,
    on_activity: Option<ActivityCallback>,
}

impl CopilotConfig {
    pub fn new(token_endpoint: impl Into<String>) -> Self {
        Self {
            connection: ConnectionOptions::new(token_endpoint),
            on_activity: None,
        }
    }

    /// Direct Line domain override, e.g. for sovereign clouds.
    pub fn with_direct_line_domain(mut self, domain: impl Into<String>) -> Self {
        self.connection = self.connection.with_direct_line_domain(domain);
        self
    }

    pub fn with_on_activity<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Activity) + Send + Sync + 'static,
    {
        self.on_activity = Some(Arc::new(callback));
        self
    }

    pub fn token_endpoint(&self) -> &str {
        &self.connection.token_endpoint
    }

    pub fn direct_line_domain(&self) -> Option<&str> {
        self.connection.direct_line_domain.as_deref()
    }

    pub fn connection(&self) -> &ConnectionOptions {
        &self.connection
    }

    pub fn on_activity(&self) -> Option<&ActivityCallback> {
        self.on_activity.as_ref()
    }
}

impl fmt::Debug for CopilotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopilotConfig")
            .field("token_endpoint", &self.connection.token_endpoint)
            .field("direct_line_domain", &self.connection.direct_line_domain)
            .field("on_activity", &self.on_activity.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_connection_options() {
        let config = CopilotConfig::new("https://app.example/api/copilot/token")
            .with_direct_line_domain("https://europe.directline.botframework.com/v3/directline");
        assert_eq!(
            config.token_endpoint(),
            "https://app.example/api/copilot/token"
        );
        assert_eq!(
            config.direct_line_domain(),
            Some("https://europe.directline.botframework.com/v3/directline")
        );
        assert!(config.on_activity().is_none());
    }

    #[test]
    fn callback_is_not_part_of_connection_identity() {
        let plain = CopilotConfig::new("https://app.example/token");
        let with_callback =
            CopilotConfig::new("https://app.example/token").with_on_activity(|_| {});
        assert_eq!(plain.connection(), with_callback.connection());
    }
}
