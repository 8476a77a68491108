//! Reference integration shapes over the transport's UI.
//!
//! Shells never draw anything themselves. They return a [`View`] describing
//! what the transport should render, and [`View::Empty`] until both a Direct
//! Line handle and a store exist.

mod element;
mod widget;

use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    middleware::ActivityMiddleware,
    transport::{SharedHandle, SharedStore, SharedTransport},
};

pub use element::{
    CopilotWidgetElement, DEFAULT_TAG, ElementFactory, ElementRegistry, HOST_STYLESHEET,
    HostElement, OBSERVED_ATTRIBUTES, ShadowScope, SharedHost,
};
pub use widget::{ChatWidget, ChatWidgetProps, CopilotComposer};

/// Style options forwarded to the transport renderer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bubble_border_radius: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StyleOptions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Render description handed to the transport.
#[derive(Clone, Debug)]
pub enum View {
    /// Nothing to render yet; not an error.
    Empty,
    /// The transport's full default chat UI.
    WebChat(WebChatView),
    /// The transport's passthrough container around application content.
    Composer {
        mount: ComposerMount,
        children: Vec<View>,
    },
    /// Content rendered without any transport wrapper.
    Fragment(Vec<View>),
    /// Application content, opaque to the shells.
    Content(String),
}

impl View {
    pub fn is_empty(&self) -> bool {
        matches!(self, View::Empty)
    }
}

#[derive(Clone)]
pub struct WebChatView {
    pub direct_line: SharedHandle,
    pub store: SharedStore,
    pub style_options: Option<StyleOptions>,
    pub activity_middleware: Option<Value>,
    pub attachment_middleware: Option<Value>,
    /// Props forwarded verbatim.
    pub passthrough: Map<String, Value>,
}

impl fmt::Debug for WebChatView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebChatView")
            .field("style_options", &self.style_options)
            .field("activity_middleware", &self.activity_middleware)
            .field("attachment_middleware", &self.attachment_middleware)
            .field("passthrough", &self.passthrough)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct ComposerMount {
    pub direct_line: SharedHandle,
    pub store: SharedStore,
    pub style_options: Option<StyleOptions>,
}

impl fmt::Debug for ComposerMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposerMount")
            .field("style_options", &self.style_options)
            .finish_non_exhaustive()
    }
}

/// Store built once per shell instance from the context middleware.
#[derive(Default)]
struct StoreCache {
    store: Mutex<Option<SharedStore>>,
}

impl StoreCache {
    fn get_or_create(
        &self,
        transport: &SharedTransport,
        middleware: &ActivityMiddleware,
    ) -> Option<SharedStore> {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = store.as_ref() {
            return Some(existing.clone());
        }
        match transport.create_store(middleware.clone()) {
            Ok(created) => {
                *store = Some(created.clone());
                Some(created)
            }
            Err(err) => {
                warn!(target = "copilot.shells", error = %err, "failed to create chat store");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn style_options_serialize_in_renderer_casing() {
        let options = StyleOptions {
            accent: Some("#00543e".into()),
            bubble_border_radius: Some(8),
            ..StyleOptions::default()
        };
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({"accent": "#00543e", "bubbleBorderRadius": 8})
        );
        assert!(StyleOptions::default().is_empty());
        assert!(!options.is_empty());
    }
}
