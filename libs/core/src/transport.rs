//! Seams to the external chat transport.
//!
//! The transport owns the realtime channel, the store's dispatch loop and the
//! default renderer. This crate only needs the factories below and the
//! `DIRECT_LINE/INCOMING_ACTIVITY` action contract.

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::{
    error::TransportError,
    middleware::{ActivityMiddleware, StoreAction},
    types::{Activity, Credential},
};

/// Arguments for `Transport::create_direct_line`.
#[derive(Clone)]
pub struct DirectLineOptions {
    pub token: String,
    pub domain: Option<String>,
    pub conversation_id: Option<String>,
}

impl DirectLineOptions {
    pub fn from_credential(credential: Credential, domain: Option<String>) -> Self {
        Self {
            token: credential.token,
            domain,
            conversation_id: credential.conversation_id,
        }
    }
}

impl fmt::Debug for DirectLineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectLineOptions")
            .field("token", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("conversation_id", &self.conversation_id)
            .finish()
    }
}

/// Open channel to the hosted agent.
pub trait ConnectionHandle: Send + Sync {
    /// Fire-and-forget; delivery is the transport's concern.
    fn post_activity(&self, activity: Activity);

    /// Called once when the owning controller lets go of the handle.
    fn end(&self) {}
}

pub type SharedHandle = Arc<dyn ConnectionHandle>;

pub trait Store: Send + Sync {
    fn dispatch(&self, action: StoreAction);
}

pub type SharedStore = Arc<dyn Store>;

pub trait Transport: Send + Sync {
    fn create_direct_line(&self, options: DirectLineOptions)
    -> Result<SharedHandle, TransportError>;

    fn create_store(&self, middleware: ActivityMiddleware) -> Result<SharedStore, TransportError>;

    /// Whether the transport ships a passthrough composer container.
    fn has_composer(&self) -> bool {
        true
    }
}

pub type SharedTransport = Arc<dyn Transport>;

/// Result of probing for the transport.
#[derive(Clone)]
pub enum TransportAvailability {
    Present(SharedTransport),
    Absent,
}

impl TransportAvailability {
    pub fn transport(&self) -> Option<&SharedTransport> {
        match self {
            TransportAvailability::Present(transport) => Some(transport),
            TransportAvailability::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, TransportAvailability::Present(_))
    }
}

impl fmt::Debug for TransportAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportAvailability::Present(_) => f.write_str("Present"),
            TransportAvailability::Absent => f.write_str("Absent"),
        }
    }
}

/// Resolves the transport, possibly asynchronously (e.g. a plugin load).
#[async_trait]
pub trait TransportLoader: Send + Sync {
    async fn load(&self) -> TransportAvailability;
}

pub type SharedTransportLoader = Arc<dyn TransportLoader>;

/// Loader for a transport that is linked in (or known to be missing).
#[derive(Clone, Debug)]
pub struct StaticTransportLoader {
    availability: TransportAvailability,
}

impl StaticTransportLoader {
    pub fn present(transport: SharedTransport) -> Self {
        Self {
            availability: TransportAvailability::Present(transport),
        }
    }

    pub fn absent() -> Self {
        Self {
            availability: TransportAvailability::Absent,
        }
    }

    pub fn shared(self) -> SharedTransportLoader {
        Arc::new(self)
    }
}

#[async_trait]
impl TransportLoader for StaticTransportLoader {
    async fn load(&self) -> TransportAvailability {
        self.availability.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_debug_redacts_token() {
        let options = DirectLineOptions::from_credential(
            Credential {
                token: "dl-token".into(),
                conversation_id: Some("conv-1".into()),
                expires_in: Some(3600),
            },
            Some("https://europe.directline.botframework.com/v3/directline".into()),
        );
        assert_eq!(options.conversation_id.as_deref(), Some("conv-1"));
        let debug = format!("{options:?}");
        assert!(!debug.contains("dl-token"));
    }

    #[tokio::test]
    async fn absent_loader_reports_absent() {
        let availability = StaticTransportLoader::absent().load().await;
        assert!(!availability.is_present());
        assert!(availability.transport().is_none());
    }
}
