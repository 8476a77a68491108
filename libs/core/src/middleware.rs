use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
};

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::{bus::ActivityBus, config::ActivityCallback, types::Activity};

/// Action type the transport dispatches for every activity it receives.
pub const INCOMING_ACTIVITY: &str = "DIRECT_LINE/INCOMING_ACTIVITY";

/// Redux-style action flowing through the transport's store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl StoreAction {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub fn incoming_activity(activity: &Activity) -> Result<Self, serde_json::Error> {
        let activity = serde_json::to_value(activity)?;
        Ok(Self::new(INCOMING_ACTIVITY, json!({ "activity": activity })))
    }

    pub fn is_incoming_activity(&self) -> bool {
        self.kind == INCOMING_ACTIVITY
    }

    fn embedded_activity(&self) -> Option<Result<Activity, serde_json::Error>> {
        self.payload
            .get("activity")
            .map(|raw| Activity::deserialize(raw))
    }
}

/// Store middleware that taps incoming activities.
///
/// Each `DIRECT_LINE/INCOMING_ACTIVITY` action is decoded, handed to the
/// optional callback and then published on the bus before the action
/// continues down the pipeline unchanged. Every other action passes straight
/// through.
#[derive(Clone)]
pub struct ActivityMiddleware {
    callback: Option<ActivityCallback>,
    bus: ActivityBus,
}

impl ActivityMiddleware {
    pub fn new(callback: Option<ActivityCallback>) -> Self {
        Self {
            callback,
            bus: ActivityBus::global().clone(),
        }
    }

    pub fn with_bus(mut self, bus: ActivityBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn bus(&self) -> &ActivityBus {
        &self.bus
    }

    pub fn handle<R>(&self, action: StoreAction, next: impl FnOnce(StoreAction) -> R) -> R {
        if action.is_incoming_activity() {
            self.intercept(&action);
        }
        next(action)
    }

    fn intercept(&self, action: &StoreAction) {
        match action.embedded_activity() {
            Some(Ok(activity)) => {
                counter!(
                    "copilot_activities_total",
                    "kind" => activity.kind.as_str().to_string()
                )
                .increment(1);
                self.notify(&activity);
            }
            Some(Err(err)) => {
                warn!(
                    target = "copilot.middleware",
                    error = %err,
                    "incoming activity does not match the activity schema"
                );
                counter!("copilot_errors_total", "kind" => "activity_decode").increment(1);
            }
            None => {
                warn!(
                    target = "copilot.middleware",
                    "incoming activity action without payload.activity"
                );
                counter!("copilot_errors_total", "kind" => "activity_missing").increment(1);
            }
        }
    }

    fn notify(&self, activity: &Activity) {
        if let Some(callback) = &self.callback
            && catch_unwind(AssertUnwindSafe(|| callback(activity))).is_err()
        {
            warn!(
                target = "copilot.middleware",
                kind = activity.kind.as_str(),
                "on_activity callback panicked"
            );
            counter!("copilot_errors_total", "kind" => "callback_panic").increment(1);
        }
        self.bus.publish(activity);
    }
}

impl fmt::Debug for ActivityMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityMiddleware")
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

/// Middleware wired to the process bus, for stores built outside a provider.
pub fn create_copilot_store(callback: Option<ActivityCallback>) -> ActivityMiddleware {
    ActivityMiddleware::new(callback)
}
