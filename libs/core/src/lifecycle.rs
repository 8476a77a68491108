use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use metrics::counter;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::{
    config::ConnectionOptions,
    connection::SharedTokenSource,
    telemetry,
    transport::{DirectLineOptions, SharedHandle, SharedTransportLoader, TransportAvailability},
    types::{Activity, ConnectionStatus, PartialActivity},
};

const TRANSITION_CAPACITY: usize = 32;

/// Owns the one Direct Line handle of a provider and drives its status.
///
/// `mount` moves to `connecting` and spawns the connect sequence: fetch a
/// credential, load the transport, open the handle, then `connected`. Any
/// failure lands in `error` without retry. `unmount` cancels the sequence and
/// releases the handle; the status is left as it was.
#[derive(Clone)]
pub struct ConnectionController {
    inner: Arc<Inner>,
}

struct Inner {
    tokens: SharedTokenSource,
    loader: SharedTransportLoader,
    state: Mutex<State>,
    transitions: broadcast::Sender<ConnectionStatus>,
}

/// Consistent view of the controller taken under one lock.
pub(crate) struct Snapshot {
    pub(crate) revision: u64,
    pub(crate) status: ConnectionStatus,
    pub(crate) handle: Option<SharedHandle>,
    pub(crate) transport: Option<TransportAvailability>,
}

struct State {
    options: ConnectionOptions,
    status: ConnectionStatus,
    handle: Option<SharedHandle>,
    transport: Option<TransportAvailability>,
    cancel: Option<CancellationToken>,
    revision: u64,
}

impl ConnectionController {
    pub fn new(
        options: ConnectionOptions,
        tokens: SharedTokenSource,
        loader: SharedTransportLoader,
    ) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tokens,
                loader,
                state: Mutex::new(State {
                    options,
                    status: ConnectionStatus::Uninitialized,
                    handle: None,
                    transport: None,
                    cancel: None,
                    revision: 0,
                }),
                transitions,
            }),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock().status
    }

    pub fn handle(&self) -> Option<SharedHandle> {
        self.inner.lock().handle.clone()
    }

    /// Transport probe result of the latest connect sequence, once known.
    pub fn transport(&self) -> Option<TransportAvailability> {
        self.inner.lock().transport.clone()
    }

    pub fn options(&self) -> ConnectionOptions {
        self.inner.lock().options.clone()
    }

    /// Bumped whenever the status, handle or transport changes.
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let state = self.inner.lock();
        Snapshot {
            revision: state.revision,
            status: state.status,
            handle: state.handle.clone(),
            transport: state.transport.clone(),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.inner
            .lock()
            .cancel
            .as_ref()
            .is_some_and(|cancel| !cancel.is_cancelled())
    }

    /// Receives every status transition made after the call.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.inner.transitions.subscribe()
    }

    /// Starts the connect sequence. Must run inside a Tokio runtime; a second
    /// call while mounted does nothing.
    pub fn mount(&self) {
        let cancel = CancellationToken::new();
        let options = {
            let mut state = self.inner.lock();
            if state
                .cancel
                .as_ref()
                .is_some_and(|existing| !existing.is_cancelled())
            {
                return;
            }
            state.cancel = Some(cancel.clone());
            self.inner.set_status(&mut state, ConnectionStatus::Connecting);
            state.options.clone()
        };

        let span = telemetry::span_for("connect", &options.token_endpoint);
        tokio::spawn(connect(Arc::clone(&self.inner), options, cancel).instrument(span));
    }

    pub fn unmount(&self) {
        let released = {
            let mut state = self.inner.lock();
            if let Some(cancel) = state.cancel.take() {
                cancel.cancel();
            }
            let released = state.handle.take();
            if released.is_some() {
                state.revision += 1;
            }
            released
        };
        if let Some(handle) = released {
            handle.end();
        }
        debug!(target = "copilot.lifecycle", "connection controller unmounted");
    }

    /// Applies new connection settings. A change tears the current connection
    /// down, resets to `uninitialized` and, when mounted, connects again.
    /// Returns whether anything changed.
    pub fn reconfigure(&self, options: ConnectionOptions) -> bool {
        let (released, was_mounted) = {
            let mut state = self.inner.lock();
            if state.options == options {
                return false;
            }
            let was_mounted = match state.cancel.take() {
                Some(cancel) => {
                    let active = !cancel.is_cancelled();
                    cancel.cancel();
                    active
                }
                None => false,
            };
            state.options = options;
            state.transport = None;
            let released = state.handle.take();
            state.revision += 1;
            self.inner
                .set_status(&mut state, ConnectionStatus::Uninitialized);
            (released, was_mounted)
        };
        if let Some(handle) = released {
            handle.end();
        }
        if was_mounted {
            self.mount();
        }
        true
    }

    /// Posts a named user event. Does nothing while no handle is held.
    pub fn send_event(&self, name: &str, value: Option<Value>) {
        self.post(Activity::user_event(name, value));
    }

    /// Posts an activity built from `partial`. Does nothing while no handle is
    /// held.
    pub fn post_activity(&self, partial: PartialActivity) {
        self.post(partial.into_activity());
    }

    fn post(&self, activity: Activity) {
        let Some(handle) = self.handle() else {
            debug!(
                target = "copilot.lifecycle",
                kind = activity.kind.as_str(),
                "dropping outgoing activity: not connected"
            );
            return;
        };
        handle.post_activity(activity);
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, state: &mut State, status: ConnectionStatus) {
        if state.status == status {
            return;
        }
        state.status = status;
        state.revision += 1;
        let label = telemetry::status_label(status);
        counter!("copilot_status_transitions_total", "status" => label).increment(1);
        info!(
            target = "copilot.lifecycle",
            status = label,
            "connection status changed"
        );
        let _ = self.transitions.send(status);
    }

    fn fail(&self, cancel: &CancellationToken, transport: Option<TransportAvailability>) {
        let mut state = self.lock();
        if cancel.is_cancelled() {
            return;
        }
        if transport.is_some() {
            state.transport = transport;
        }
        self.set_status(&mut state, ConnectionStatus::Error);
    }

    fn connected(
        &self,
        cancel: &CancellationToken,
        handle: SharedHandle,
        transport: TransportAvailability,
    ) {
        let mut state = self.lock();
        if cancel.is_cancelled() {
            drop(state);
            handle.end();
            return;
        }
        state.handle = Some(handle);
        state.transport = Some(transport);
        self.set_status(&mut state, ConnectionStatus::Connected);
    }
}

async fn connect(inner: Arc<Inner>, options: ConnectionOptions, cancel: CancellationToken) {
    let credential = inner.tokens.fetch_token(&options.token_endpoint).await;
    if cancel.is_cancelled() {
        debug!(target = "copilot.lifecycle", "connect cancelled during token fetch");
        return;
    }
    let credential = match credential {
        Ok(credential) => credential,
        Err(err) => {
            warn!(
                target = "copilot.lifecycle",
                error = %err,
                "failed to obtain Direct Line credential"
            );
            inner.fail(&cancel, None);
            return;
        }
    };

    let availability = inner.loader.load().await;
    if cancel.is_cancelled() {
        debug!(target = "copilot.lifecycle", "connect cancelled during transport load");
        return;
    }
    let Some(transport) = availability.transport().cloned() else {
        warn!(target = "copilot.lifecycle", "chat transport is not available");
        counter!("copilot_errors_total", "kind" => "transport_unavailable").increment(1);
        inner.fail(&cancel, Some(availability));
        return;
    };

    let direct_line = DirectLineOptions::from_credential(credential, options.direct_line_domain);
    match transport.create_direct_line(direct_line) {
        Ok(handle) => inner.connected(&cancel, handle, availability),
        Err(err) => {
            warn!(
                target = "copilot.lifecycle",
                error = %err,
                "transport refused to open a Direct Line connection"
            );
            counter!("copilot_errors_total", "kind" => "direct_line_create").increment(1);
            inner.fail(&cancel, Some(availability));
        }
    }
}
