use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use crate::{
    bus::ActivityBus,
    config::{ActivityCallback, CopilotConfig},
    connection::{ReqwestTokenSource, SharedTokenSource},
    context::{self, CopilotContextValue},
    lifecycle::ConnectionController,
    middleware::ActivityMiddleware,
    transport::SharedTransportLoader,
    types::Activity,
};

/// Root of a Copilot integration: owns the connection controller and the
/// activity middleware, and installs the context consumers read from.
///
/// Dropping the provider unmounts it.
pub struct CopilotProvider {
    shared: Arc<ProviderShared>,
}

pub(crate) struct ProviderShared {
    pub(crate) controller: ConnectionController,
    pub(crate) middleware: ActivityMiddleware,
    pub(crate) bus: ActivityBus,
    on_activity: Arc<RwLock<Option<ActivityCallback>>>,
    memo: Mutex<Option<(u64, Arc<CopilotContextValue>)>>,
}

impl ProviderShared {
    /// Context value for the current controller state; the same `Arc` is
    /// returned until the status, handle or transport changes.
    pub(crate) fn context_value(&self) -> Arc<CopilotContextValue> {
        let snapshot = self.controller.snapshot();
        let mut memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((revision, value)) = memo.as_ref()
            && *revision == snapshot.revision
        {
            return Arc::clone(value);
        }
        let value = Arc::new(CopilotContextValue::new(
            snapshot,
            self.middleware.clone(),
            self.bus.clone(),
            self.controller.clone(),
        ));
        *memo = Some((value.revision(), Arc::clone(&value)));
        value
    }
}

pub struct CopilotProviderBuilder {
    config: CopilotConfig,
    loader: SharedTransportLoader,
    tokens: Option<SharedTokenSource>,
    bus: Option<ActivityBus>,
}

impl CopilotProviderBuilder {
    pub fn token_source(mut self, tokens: SharedTokenSource) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Bus that incoming activities are published on; defaults to
    /// [`ActivityBus::global`].
    pub fn bus(mut self, bus: ActivityBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> CopilotProvider {
        let tokens = self
            .tokens
            .unwrap_or_else(|| Arc::new(ReqwestTokenSource::default()));
        let bus = self
            .bus
            .unwrap_or_else(|| ActivityBus::global().clone());

        let on_activity = Arc::new(RwLock::new(self.config.on_activity().cloned()));
        let delegate: ActivityCallback = {
            let on_activity = Arc::clone(&on_activity);
            Arc::new(move |activity: &Activity| {
                let current = on_activity
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                if let Some(callback) = current {
                    callback(activity);
                }
            })
        };
        let middleware = ActivityMiddleware::new(Some(delegate)).with_bus(bus.clone());
        let controller =
            ConnectionController::new(self.config.connection().clone(), tokens, self.loader);

        CopilotProvider {
            shared: Arc::new(ProviderShared {
                controller,
                middleware,
                bus,
                on_activity,
                memo: Mutex::new(None),
            }),
        }
    }
}

impl CopilotProvider {
    pub fn new(config: CopilotConfig, loader: SharedTransportLoader) -> Self {
        Self::builder(config, loader).build()
    }

    pub fn builder(config: CopilotConfig, loader: SharedTransportLoader) -> CopilotProviderBuilder {
        CopilotProviderBuilder {
            config,
            loader,
            tokens: None,
            bus: None,
        }
    }

    pub fn mount(&self) {
        self.shared.controller.mount();
    }

    pub fn unmount(&self) {
        self.shared.controller.unmount();
    }

    /// Applies a new configuration. The activity callback is swapped in place;
    /// a different endpoint or domain restarts the connection. Returns whether
    /// the connection was restarted.
    pub fn update(&self, config: CopilotConfig) -> bool {
        *self
            .shared
            .on_activity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config.on_activity().cloned();
        self.shared
            .controller
            .reconfigure(config.connection().clone())
    }

    pub fn controller(&self) -> &ConnectionController {
        &self.shared.controller
    }

    pub fn middleware(&self) -> &ActivityMiddleware {
        &self.shared.middleware
    }

    pub fn context(&self) -> Arc<CopilotContextValue> {
        self.shared.context_value()
    }

    /// Runs `fut` with this provider's context visible to
    /// [`use_copilot`](crate::use_copilot) and friends.
    pub async fn scope<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        context::scope(Arc::clone(&self.shared), fut).await
    }

    pub fn sync_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        context::sync_scope(Arc::clone(&self.shared), f)
    }
}

impl Drop for CopilotProvider {
    fn drop(&mut self) {
        self.shared.controller.unmount();
    }
}
