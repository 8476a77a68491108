use serde_json::{Map, Value};

use crate::{
    context::{CopilotContextValue, use_copilot_context},
    error::UsageError,
    transport::TransportAvailability,
};

use super::{ComposerMount, StoreCache, StyleOptions, View, WebChatView};

#[derive(Clone, Debug, Default)]
pub struct ChatWidgetProps {
    pub style_options: Option<StyleOptions>,
    pub activity_middleware: Option<Value>,
    pub attachment_middleware: Option<Value>,
    pub rest: Map<String, Value>,
}

/// Full default chat UI.
#[derive(Default)]
pub struct ChatWidget {
    props: ChatWidgetProps,
    store: StoreCache,
}

impl ChatWidget {
    pub fn new(props: ChatWidgetProps) -> Self {
        Self {
            props,
            store: StoreCache::default(),
        }
    }

    /// Adds a renderer prop that is forwarded untouched.
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.rest.insert(key.into(), value);
        self
    }

    pub fn render(&self, context: &CopilotContextValue) -> View {
        let Some(direct_line) = context.direct_line().cloned() else {
            return View::Empty;
        };
        let Some(transport) = context.transport().and_then(TransportAvailability::transport)
        else {
            return View::Empty;
        };
        let Some(store) = self
            .store
            .get_or_create(transport, context.store_middleware())
        else {
            return View::Empty;
        };

        View::WebChat(WebChatView {
            direct_line,
            store,
            style_options: self.props.style_options.clone(),
            activity_middleware: self.props.activity_middleware.clone(),
            attachment_middleware: self.props.attachment_middleware.clone(),
            passthrough: self.props.rest.clone(),
        })
    }

    /// Renders against the enclosing provider.
    pub fn render_in_scope(&self) -> Result<View, UsageError> {
        Ok(self.render(&*use_copilot_context()?))
    }
}

/// Composer-only shell: the transport's container around custom UI, with no
/// default chat UI.
pub struct CopilotComposer {
    children: Vec<View>,
    style_options: Option<StyleOptions>,
    store: StoreCache,
}

impl CopilotComposer {
    pub fn new(children: Vec<View>) -> Self {
        Self {
            children,
            style_options: None,
            store: StoreCache::default(),
        }
    }

    pub fn with_style_options(mut self, style_options: StyleOptions) -> Self {
        self.style_options = Some(style_options);
        self
    }

    /// Without a transport the children render bare so the surrounding tree
    /// still mounts.
    pub fn render(&self, context: &CopilotContextValue) -> View {
        if let Some(TransportAvailability::Absent) = context.transport() {
            return View::Fragment(self.children.clone());
        }
        let Some(direct_line) = context.direct_line().cloned() else {
            return View::Empty;
        };
        let Some(transport) = context.transport().and_then(TransportAvailability::transport)
        else {
            return View::Empty;
        };
        let Some(store) = self
            .store
            .get_or_create(transport, context.store_middleware())
        else {
            return View::Empty;
        };
        if !transport.has_composer() {
            return View::Fragment(self.children.clone());
        }

        View::Composer {
            mount: ComposerMount {
                direct_line,
                store,
                style_options: self.style_options.clone(),
            },
            children: self.children.clone(),
        }
    }

    pub fn render_in_scope(&self) -> Result<View, UsageError> {
        Ok(self.render(&*use_copilot_context()?))
    }
}
