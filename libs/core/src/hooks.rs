use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::{
    bus::{ActivityBus, Subscription},
    config::ActivityCallback,
    context,
    types::{Activity, ActivityKind},
};

/// Which activities an [`ActivityHook`] reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityFilter {
    pub kind: ActivityKind,
    pub name: Option<String>,
}

impl ActivityFilter {
    pub fn new(kind: ActivityKind, name: Option<&str>) -> Self {
        Self {
            kind,
            name: name.map(str::to_string),
        }
    }

    pub fn matches(&self, activity: &Activity) -> bool {
        if activity.kind != self.kind {
            return false;
        }
        match &self.name {
            Some(name) => activity.name.as_deref() == Some(name.as_str()),
            None => true,
        }
    }
}

/// Live subscription for one kind (and optionally name) of activity.
///
/// The callback sits behind a holder so it can be replaced without touching
/// the bus registration. Dropping the hook unsubscribes.
pub struct ActivityHook {
    bus: ActivityBus,
    filter: ActivityFilter,
    callback: Arc<RwLock<ActivityCallback>>,
    subscription: Subscription,
}

impl ActivityHook {
    pub fn on_bus(bus: ActivityBus, filter: ActivityFilter, callback: ActivityCallback) -> Self {
        let callback = Arc::new(RwLock::new(callback));
        let subscription = subscribe(&bus, filter.clone(), Arc::clone(&callback));
        Self {
            bus,
            filter,
            callback,
            subscription,
        }
    }

    pub fn filter(&self) -> &ActivityFilter {
        &self.filter
    }

    pub fn set_callback(&self, callback: ActivityCallback) {
        *self
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = callback;
    }

    /// Re-subscribes when `filter` differs from the current one. Returns
    /// whether it did.
    pub fn set_filter(&mut self, filter: ActivityFilter) -> bool {
        if filter == self.filter {
            return false;
        }
        self.subscription.unsubscribe();
        self.subscription = subscribe(&self.bus, filter.clone(), Arc::clone(&self.callback));
        debug!(
            target = "copilot.hooks",
            kind = filter.kind.as_str(),
            name = filter.name.as_deref(),
            "activity hook re-subscribed"
        );
        self.filter = filter;
        true
    }

    /// Applies a new set of hook arguments, the way a re-render would.
    pub fn update(&mut self, kind: ActivityKind, name: Option<&str>, callback: ActivityCallback) {
        self.set_callback(callback);
        self.set_filter(ActivityFilter::new(kind, name));
    }
}

impl Drop for ActivityHook {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

fn subscribe(
    bus: &ActivityBus,
    filter: ActivityFilter,
    callback: Arc<RwLock<ActivityCallback>>,
) -> Subscription {
    bus.add_listener(move |activity| {
        if !filter.matches(activity) {
            return;
        }
        let current = callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        current(activity);
    })
}

/// Subscribes `callback` to activities of `kind` (and `name`, when given) on
/// the enclosing provider's bus, or the process bus outside any provider.
pub fn use_copilot_activity(
    kind: impl Into<ActivityKind>,
    name: Option<&str>,
    callback: ActivityCallback,
) -> ActivityHook {
    let bus = context::current_bus().unwrap_or_else(|| ActivityBus::global().clone());
    ActivityHook::on_bus(bus, ActivityFilter::new(kind.into(), name), callback)
}
