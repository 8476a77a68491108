use tracing::info_span;

use crate::types::ConnectionStatus;

pub fn span_for(action: &'static str, token_endpoint: &str) -> tracing::Span {
    info_span!("copilot.connection", action, token_endpoint)
}

pub fn span_for_element(action: &'static str, tag: &str) -> tracing::Span {
    info_span!("copilot.element", action, tag)
}

pub fn status_label(status: ConnectionStatus) -> &'static str {
    status.as_str()
}
