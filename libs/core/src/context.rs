//! Scoped access to the enclosing provider.
//!
//! [`CopilotProvider::scope`](crate::CopilotProvider::scope) installs the
//! provider as a task-local; the accessors below read it and fail with
//! [`UsageError`] when called outside any scope. Tasks spawned from inside a
//! scope do not inherit it.

use std::{future::Future, sync::Arc};

use serde_json::Value;

use crate::{
    bus::ActivityBus,
    error::UsageError,
    lifecycle::{ConnectionController, Snapshot},
    middleware::ActivityMiddleware,
    provider::ProviderShared,
    transport::{SharedHandle, TransportAvailability},
    types::{ConnectionStatus, PartialActivity},
};

tokio::task_local! {
    static CURRENT_PROVIDER: Arc<ProviderShared>;
}

pub(crate) async fn scope<F>(provider: Arc<ProviderShared>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_PROVIDER.scope(provider, fut).await
}

pub(crate) fn sync_scope<R>(provider: Arc<ProviderShared>, f: impl FnOnce() -> R) -> R {
    CURRENT_PROVIDER.sync_scope(provider, f)
}

/// Bus of the enclosing provider, if any.
pub(crate) fn current_bus() -> Option<ActivityBus> {
    CURRENT_PROVIDER
        .try_with(|provider| provider.bus.clone())
        .ok()
}

/// Everything a provider exposes to its descendants.
#[derive(Clone)]
pub struct CopilotContextValue {
    revision: u64,
    status: ConnectionStatus,
    direct_line: Option<SharedHandle>,
    transport: Option<TransportAvailability>,
    store_middleware: ActivityMiddleware,
    bus: ActivityBus,
    controller: ConnectionController,
}

impl CopilotContextValue {
    pub(crate) fn new(
        snapshot: Snapshot,
        store_middleware: ActivityMiddleware,
        bus: ActivityBus,
        controller: ConnectionController,
    ) -> Self {
        Self {
            revision: snapshot.revision,
            status: snapshot.status,
            direct_line: snapshot.handle,
            transport: snapshot.transport,
            store_middleware,
            bus,
            controller,
        }
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// The Direct Line handle; `None` until connected.
    pub fn direct_line(&self) -> Option<&SharedHandle> {
        self.direct_line.as_ref()
    }

    /// Transport probe result; `None` until the connect sequence got that far.
    pub fn transport(&self) -> Option<&TransportAvailability> {
        self.transport.as_ref()
    }

    /// Middleware to build the transport store with.
    pub fn store_middleware(&self) -> &ActivityMiddleware {
        &self.store_middleware
    }

    pub fn bus(&self) -> &ActivityBus {
        &self.bus
    }

    /// Posts through whatever handle the provider holds at call time.
    pub fn send_event(&self, name: &str, value: Option<Value>) {
        self.controller.send_event(name, value);
    }

    pub fn post_activity(&self, partial: PartialActivity) {
        self.controller.post_activity(partial);
    }
}

/// Consumer view returned by [`use_copilot`].
#[derive(Clone)]
pub struct Copilot {
    context: Arc<CopilotContextValue>,
}

impl Copilot {
    pub fn status(&self) -> ConnectionStatus {
        self.context.status()
    }

    pub fn send_event(&self, name: &str, value: Option<Value>) {
        self.context.send_event(name, value);
    }

    pub fn post_activity(&self, partial: PartialActivity) {
        self.context.post_activity(partial);
    }

    /// Raw Direct Line handle, as an escape hatch.
    pub fn direct_line(&self) -> Option<&SharedHandle> {
        self.context.direct_line()
    }
}

pub fn use_copilot_context() -> Result<Arc<CopilotContextValue>, UsageError> {
    CURRENT_PROVIDER
        .try_with(|provider| provider.context_value())
        .map_err(|_| UsageError::new("use_copilot_context"))
}

pub fn use_copilot() -> Result<Copilot, UsageError> {
    CURRENT_PROVIDER
        .try_with(|provider| Copilot {
            context: provider.context_value(),
        })
        .map_err(|_| UsageError::new("use_copilot"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_fail_outside_a_provider() {
        let err = use_copilot_context().err().unwrap();
        assert_eq!(err.accessor(), "use_copilot_context");
        let err = use_copilot().err().unwrap();
        assert_eq!(err.accessor(), "use_copilot");
        assert!(current_bus().is_none());
    }
}
