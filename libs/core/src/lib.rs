//! Client-side integration for a Copilot Studio agent reached over Direct Line.
//!
//! A [`CopilotProvider`] fetches a short-lived credential from the
//! application's token endpoint, opens one Direct Line connection through the
//! external chat transport and taps the transport store so every inbound
//! activity reaches the provider's callback and the [`ActivityBus`].
//! Consumers read the connection through [`use_copilot`] and subscribe to
//! typed activities with [`use_copilot_activity`].
pub mod bus;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod middleware;
pub mod provider;
pub mod shells;
pub mod telemetry;
pub mod testkit;
pub mod transport;
pub mod types;

pub use bus::{ActivityBus, Subscription};
pub use config::{ActivityCallback, ConnectionOptions, CopilotConfig};
pub use connection::{
    ReqwestTokenSource, SharedTokenSource, TokenSource, create_connection, fetch_token,
};
pub use context::{Copilot, CopilotContextValue, use_copilot, use_copilot_context};
pub use error::{ConnectError, TokenFetchError, TransportError, UsageError};
pub use hooks::{ActivityFilter, ActivityHook, use_copilot_activity};
pub use lifecycle::ConnectionController;
pub use middleware::{ActivityMiddleware, INCOMING_ACTIVITY, StoreAction, create_copilot_store};
pub use provider::{CopilotProvider, CopilotProviderBuilder};
pub use shells::{
    ChatWidget, ChatWidgetProps, CopilotComposer, CopilotWidgetElement, ElementRegistry,
    HostElement, StyleOptions, View,
};
pub use transport::{
    ConnectionHandle, DirectLineOptions, SharedHandle, SharedStore, SharedTransport,
    SharedTransportLoader, StaticTransportLoader, Store, Transport, TransportAvailability,
    TransportLoader,
};
pub use types::{
    Activity, ActivityKind, Attachment, CardAction, ChannelAccount, ConnectionStatus,
    Credential, PartialActivity, Role, SuggestedActions,
};

/// Returns the semantic version advertised by this crate.
///
/// ```
/// assert_eq!(copilot_widget_core::version(), "0.1.0");
/// ```
pub fn version() -> &'static str {
    "0.1.0"
}
