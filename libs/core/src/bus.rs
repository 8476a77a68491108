use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use metrics::counter;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::types::Activity;

type Listener = Arc<dyn Fn(&Activity) + Send + Sync>;

static PROCESS_BUS: Lazy<ActivityBus> = Lazy::new(ActivityBus::new);

/// Set of listeners notified of every inbound activity.
///
/// `ActivityBus::global()` lives for the whole process and is what providers
/// use unless another bus is injected. Clones share the same listener set.
#[derive(Clone, Default)]
pub struct ActivityBus {
    registry: Arc<Registry>,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl Registry {
    fn remove(&self, id: u64) -> bool {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

impl ActivityBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static ActivityBus {
        &PROCESS_BUS
    }

    pub fn add_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Activity) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
            active: AtomicBool::new(true),
        }
    }

    /// Delivers `activity` to every listener registered when the call starts.
    ///
    /// Listeners run outside the registry lock, so they may add or remove
    /// registrations; such changes take effect from the next publish. A
    /// panicking listener is logged and skipped. Returns the number of
    /// listeners that completed.
    pub fn publish(&self, activity: &Activity) -> usize {
        let snapshot: Vec<Listener> = self
            .registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let mut delivered = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(activity))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    warn!(
                        target = "copilot.bus",
                        kind = activity.kind.as_str(),
                        "activity listener panicked"
                    );
                    counter!("copilot_errors_total", "kind" => "listener_panic").increment(1);
                }
            }
        }
        debug!(
            target = "copilot.bus",
            kind = activity.kind.as_str(),
            delivered,
            "published activity"
        );
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Capability returned by [`ActivityBus::add_listener`].
///
/// Dropping it leaves the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "the listener stays registered until `unsubscribe` is called"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
    active: AtomicBool,
}

impl Subscription {
    /// Removes exactly this registration. Later calls do nothing.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
