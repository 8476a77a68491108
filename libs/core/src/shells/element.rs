use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use metrics::counter;
use once_cell::sync::Lazy;
use tracing::{Instrument, debug, warn};

use crate::{
    config::ConnectionOptions,
    connection::SharedTokenSource,
    error::{ConnectError, TransportError},
    middleware::ActivityMiddleware,
    telemetry,
    transport::{DirectLineOptions, SharedHandle, SharedTransportLoader},
};

use super::{StyleOptions, View, WebChatView};

pub const DEFAULT_TAG: &str = "copilot-widget";

pub const OBSERVED_ATTRIBUTES: [&str; 2] = ["token-endpoint", "direct-line-domain"];

/// Stylesheet installed into every element's shadow scope.
pub const HOST_STYLESHEET: &str = ":host{display:block;width:100%;height:100%;\
font-family:var(--copilot-font, system-ui, -apple-system, sans-serif)}\
.copilot-widget-root{width:100%;height:100%;background:var(--copilot-bg,#ffffff);\
border-radius:var(--copilot-radius,8px);overflow:hidden}";

const ROOT_CLASS: &str = "copilot-widget-root";

/// The document node an element is attached to.
pub trait HostElement: Send + Sync {
    fn attribute(&self, name: &str) -> Option<String>;

    /// Computed value of a CSS custom property, e.g. `--copilot-primary`.
    fn css_property(&self, name: &str) -> Option<String>;
}

pub type SharedHost = Arc<dyn HostElement>;

/// Isolated rendering scope owned by a connected element.
#[derive(Clone, Debug)]
pub struct ShadowScope {
    pub stylesheet: &'static str,
    pub root_class: &'static str,
    pub view: View,
}

struct ElementState {
    host: Option<SharedHost>,
    scope: Option<ShadowScope>,
    handle: Option<SharedHandle>,
}

/// Framework-agnostic embeddable widget.
///
/// Every `connected_callback` and attribute change starts a fresh
/// initialization; results of an initialization that was superseded or whose
/// element got disconnected are discarded.
pub struct CopilotWidgetElement {
    tag: String,
    tokens: SharedTokenSource,
    loader: SharedTransportLoader,
    generation: AtomicU64,
    state: Mutex<ElementState>,
}

impl CopilotWidgetElement {
    pub fn new(tokens: SharedTokenSource, loader: SharedTransportLoader) -> Self {
        Self::with_tag(DEFAULT_TAG, tokens, loader)
    }

    pub fn with_tag(
        tag: impl Into<String>,
        tokens: SharedTokenSource,
        loader: SharedTransportLoader,
    ) -> Self {
        Self {
            tag: tag.into(),
            tokens,
            loader,
            generation: AtomicU64::new(0),
            state: Mutex::new(ElementState {
                host: None,
                scope: None,
                handle: None,
            }),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn observed_attributes() -> &'static [&'static str] {
        &OBSERVED_ATTRIBUTES
    }

    pub fn shadow(&self) -> Option<ShadowScope> {
        self.lock().scope.clone()
    }

    /// Current render output; `None` while disconnected.
    pub fn view(&self) -> Option<View> {
        self.lock().scope.as_ref().map(|scope| scope.view.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.lock().scope.is_some()
    }

    /// Creates the shadow scope and initializes the widget.
    pub async fn connected_callback(&self, host: SharedHost) {
        {
            let mut state = self.lock();
            state.host = Some(host);
            state.scope = Some(ShadowScope {
                stylesheet: HOST_STYLESHEET,
                root_class: ROOT_CLASS,
                view: View::Empty,
            });
        }
        self.init().await;
    }

    /// Tears the scope down and releases the connection.
    pub fn disconnected_callback(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let released = {
            let mut state = self.lock();
            state.scope = None;
            state.host = None;
            state.handle.take()
        };
        if let Some(handle) = released {
            handle.end();
        }
        debug!(target = "copilot.element", tag = %self.tag, "element disconnected");
    }

    pub async fn attribute_changed_callback(&self, name: &str) {
        if !OBSERVED_ATTRIBUTES.contains(&name) {
            return;
        }
        self.init().await;
    }

    async fn init(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let Some(host) = self.lock().host.clone() else {
            return;
        };
        let Some(token_endpoint) = host
            .attribute("token-endpoint")
            .filter(|value| !value.is_empty())
        else {
            warn!(
                target = "copilot.element",
                tag = %self.tag,
                "token-endpoint attribute is required"
            );
            return;
        };
        let mut options = ConnectionOptions::new(token_endpoint);
        options.direct_line_domain = host.attribute("direct-line-domain");

        let span = telemetry::span_for_element("init", &self.tag);
        let result = self.build_view(host.as_ref(), &options).instrument(span).await;
        match result {
            Ok((handle, view)) => self.install(generation, handle, view),
            Err(err) => {
                warn!(
                    target = "copilot.element",
                    tag = %self.tag,
                    error = %err,
                    "failed to initialize"
                );
                counter!("copilot_errors_total", "kind" => "element_init").increment(1);
            }
        }
    }

    async fn build_view(
        &self,
        host: &dyn HostElement,
        options: &ConnectionOptions,
    ) -> Result<(SharedHandle, View), ConnectError> {
        let credential = self.tokens.fetch_token(&options.token_endpoint).await?;
        let availability = self.loader.load().await;
        let transport = availability
            .transport()
            .ok_or(TransportError::Unavailable)?;
        let handle = transport.create_direct_line(DirectLineOptions::from_credential(
            credential,
            options.direct_line_domain.clone(),
        ))?;
        let store = match transport.create_store(ActivityMiddleware::new(None)) {
            Ok(store) => store,
            Err(err) => {
                handle.end();
                return Err(err.into());
            }
        };

        let style_options = style_options_from_host(host);
        let view = View::WebChat(WebChatView {
            direct_line: handle.clone(),
            store,
            style_options: Some(style_options),
            activity_middleware: None,
            attachment_middleware: None,
            passthrough: Default::default(),
        });
        Ok((handle, view))
    }

    fn install(&self, generation: u64, handle: SharedHandle, view: View) {
        let mut state = self.lock();
        let current = self.generation.load(Ordering::Acquire) == generation;
        if !current || state.scope.is_none() {
            drop(state);
            debug!(
                target = "copilot.element",
                tag = %self.tag,
                "discarding stale initialization"
            );
            handle.end();
            return;
        }
        if let Some(scope) = state.scope.as_mut() {
            scope.view = view;
        }
        let previous = state.handle.replace(handle);
        drop(state);
        if let Some(previous) = previous {
            previous.end();
        }
    }

    fn lock(&self) -> MutexGuard<'_, ElementState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CopilotWidgetElement {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = state.handle.take() {
            handle.end();
        }
    }
}

/// Maps the host's `--copilot-*` custom properties into renderer options.
pub(crate) fn style_options_from_host(host: &dyn HostElement) -> StyleOptions {
    let property = |name: &str| {
        host.css_property(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    StyleOptions {
        accent: property("--copilot-primary"),
        background_color: property("--copilot-bg"),
        primary_font: property("--copilot-font"),
        bubble_border_radius: property("--copilot-radius").and_then(|radius| parse_px(&radius)),
        ..StyleOptions::default()
    }
}

fn parse_px(value: &str) -> Option<u32> {
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    number
        .parse::<u32>()
        .ok()
        .or_else(|| number.parse::<f64>().ok().map(|n| n.round() as u32))
}

pub type ElementFactory = Arc<dyn Fn() -> CopilotWidgetElement + Send + Sync>;

static GLOBAL_REGISTRY: Lazy<ElementRegistry> = Lazy::new(ElementRegistry::default);

/// Tag name to element factory map, the analogue of a custom-element
/// registry.
#[derive(Default)]
pub struct ElementRegistry {
    definitions: Mutex<HashMap<String, ElementFactory>>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static ElementRegistry {
        &GLOBAL_REGISTRY
    }

    /// Defines `tag` unless it is already defined. Returns whether this call
    /// defined it.
    pub fn register(&self, tag: &str, factory: ElementFactory) -> bool {
        let mut definitions = self
            .definitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if definitions.contains_key(tag) {
            return false;
        }
        definitions.insert(tag.to_string(), factory);
        debug!(target = "copilot.element", tag, "element registered");
        true
    }

    /// Defines the default `copilot-widget` tag.
    pub fn register_default(
        &self,
        tokens: SharedTokenSource,
        loader: SharedTransportLoader,
    ) -> bool {
        let factory: ElementFactory =
            Arc::new(move || CopilotWidgetElement::new(tokens.clone(), loader.clone()));
        self.register(DEFAULT_TAG, factory)
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.definitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(tag)
    }

    pub fn create(&self, tag: &str) -> Option<CopilotWidgetElement> {
        let factory = self
            .definitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tag)
            .cloned()?;
        let mut element = factory();
        element.tag = tag.to_string();
        Some(element)
    }
}
