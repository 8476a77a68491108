//! In-memory doubles for the token endpoint, the transport and the host
//! document, for exercising providers and shells without a network.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use http::StatusCode;
use tokio::sync::{Notify, Semaphore};

use crate::{
    connection::TokenSource,
    error::{TokenFetchError, TransportError},
    middleware::{ActivityMiddleware, StoreAction},
    shells::HostElement,
    transport::{
        ConnectionHandle, DirectLineOptions, SharedHandle, SharedStore, SharedTransport,
        SharedTransportLoader, StaticTransportLoader, Store, Transport,
    },
    types::{Activity, Credential},
};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Answers every fetch with the same credential or status.
pub struct StaticTokenSource {
    outcome: Result<Credential, StatusCode>,
    calls: AtomicUsize,
    endpoints: Mutex<Vec<String>>,
}

impl StaticTokenSource {
    pub fn ok(token: &str) -> Self {
        Self::with_outcome(Ok(Credential {
            token: token.to_string(),
            conversation_id: None,
            expires_in: Some(3600),
        }))
    }

    pub fn failing(status: StatusCode) -> Self {
        Self::with_outcome(Err(status))
    }

    fn with_outcome(outcome: Result<Credential, StatusCode>) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            endpoints: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn endpoints(&self) -> Vec<String> {
        lock(&self.endpoints).clone()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch_token(&self, endpoint: &str) -> Result<Credential, TokenFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.endpoints).push(endpoint.to_string());
        self.outcome
            .clone()
            .map_err(|status| TokenFetchError::Status { status })
    }
}

/// Token source that blocks each fetch until [`GatedTokenSource::release`].
pub struct GatedTokenSource {
    inner: StaticTokenSource,
    gate: Semaphore,
    started: Notify,
    waiting: AtomicUsize,
}

impl GatedTokenSource {
    pub fn new(inner: StaticTokenSource) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
            started: Notify::new(),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Resolves once a fetch is parked at the gate.
    pub async fn wait_started(&self) {
        loop {
            let notified = self.started.notified();
            if self.waiting.load(Ordering::SeqCst) > 0 {
                return;
            }
            notified.await;
        }
    }

    /// Lets one parked fetch through.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn calls(&self) -> usize {
        self.inner.calls()
    }
}

#[async_trait]
impl TokenSource for GatedTokenSource {
    async fn fetch_token(&self, endpoint: &str) -> Result<Credential, TokenFetchError> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        self.started.notify_waiters();
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        self.inner.fetch_token(endpoint).await
    }
}

/// Connection handle that records what was posted to it.
#[derive(Default)]
pub struct RecordingHandle {
    options: Option<DirectLineOptions>,
    posted: Mutex<Vec<Activity>>,
    ended: AtomicBool,
}

impl RecordingHandle {
    pub fn options(&self) -> Option<&DirectLineOptions> {
        self.options.as_ref()
    }

    pub fn posted(&self) -> Vec<Activity> {
        lock(&self.posted).clone()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

impl ConnectionHandle for RecordingHandle {
    fn post_activity(&self, activity: Activity) {
        lock(&self.posted).push(activity);
    }

    fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }
}

/// Store that runs every dispatched action through the middleware and keeps
/// what reached the end of the pipeline.
pub struct RecordingStore {
    middleware: ActivityMiddleware,
    reduced: Mutex<Vec<StoreAction>>,
}

impl RecordingStore {
    pub fn reduced(&self) -> Vec<StoreAction> {
        lock(&self.reduced).clone()
    }
}

impl Store for RecordingStore {
    fn dispatch(&self, action: StoreAction) {
        self.middleware
            .handle(action, |action| lock(&self.reduced).push(action));
    }
}

/// Transport double that hands out [`RecordingHandle`]s and
/// [`RecordingStore`]s.
pub struct MockTransport {
    composer: bool,
    refuse_direct_line: bool,
    handles: Mutex<Vec<Arc<RecordingHandle>>>,
    stores: Mutex<Vec<Arc<RecordingStore>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            composer: true,
            refuse_direct_line: false,
            handles: Mutex::new(Vec::new()),
            stores: Mutex::new(Vec::new()),
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_composer(mut self) -> Self {
        self.composer = false;
        self
    }

    pub fn refusing_direct_line(mut self) -> Self {
        self.refuse_direct_line = true;
        self
    }

    pub fn handles(&self) -> Vec<Arc<RecordingHandle>> {
        lock(&self.handles).clone()
    }

    pub fn last_handle(&self) -> Option<Arc<RecordingHandle>> {
        lock(&self.handles).last().cloned()
    }

    pub fn stores(&self) -> Vec<Arc<RecordingStore>> {
        lock(&self.stores).clone()
    }

    pub fn last_store(&self) -> Option<Arc<RecordingStore>> {
        lock(&self.stores).last().cloned()
    }
}

impl Transport for MockTransport {
    fn create_direct_line(
        &self,
        options: DirectLineOptions,
    ) -> Result<SharedHandle, TransportError> {
        if self.refuse_direct_line {
            return Err(TransportError::DirectLine("refused by mock".into()));
        }
        let handle = Arc::new(RecordingHandle {
            options: Some(options),
            ..RecordingHandle::default()
        });
        lock(&self.handles).push(Arc::clone(&handle));
        Ok(handle)
    }

    fn create_store(&self, middleware: ActivityMiddleware) -> Result<SharedStore, TransportError> {
        let store = Arc::new(RecordingStore {
            middleware,
            reduced: Mutex::new(Vec::new()),
        });
        lock(&self.stores).push(Arc::clone(&store));
        Ok(store)
    }

    fn has_composer(&self) -> bool {
        self.composer
    }
}

/// Loader that always finds `transport`.
pub fn loader_for(transport: &Arc<MockTransport>) -> SharedTransportLoader {
    let transport: SharedTransport = transport.clone();
    StaticTransportLoader::present(transport).shared()
}

pub fn absent_loader() -> SharedTransportLoader {
    StaticTransportLoader::absent().shared()
}

/// Host element backed by plain maps.
#[derive(Default)]
pub struct MemoryHost {
    attributes: Mutex<HashMap<String, String>>,
    properties: Mutex<HashMap<String, String>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_css_property(self, name: &str, value: &str) -> Self {
        lock(&self.properties).insert(name.to_string(), value.to_string());
        self
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        lock(&self.attributes).insert(name.to_string(), value.to_string());
    }

    pub fn remove_attribute(&self, name: &str) {
        lock(&self.attributes).remove(name);
    }
}

impl HostElement for MemoryHost {
    fn attribute(&self, name: &str) -> Option<String> {
        lock(&self.attributes).get(name).cloned()
    }

    fn css_property(&self, name: &str) -> Option<String> {
        lock(&self.properties).get(name).cloned()
    }
}
