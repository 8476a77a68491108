use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use copilot_widget_core::{
    Activity, ActivityBus, ActivityCallback, ActivityKind, ChannelAccount, ChatWidget,
    ChatWidgetProps, ConnectionStatus, CopilotComposer, CopilotConfig, CopilotProvider,
    PartialActivity, Store, StoreAction, StyleOptions, View, use_copilot, use_copilot_activity,
    use_copilot_context,
    testkit::{MockTransport, StaticTokenSource, absent_loader, loader_for},
};
use serde_json::json;

const ENDPOINT: &str = "https://app.example.com/api/copilot/token";

fn provider(
    config: CopilotConfig,
    transport: &Arc<MockTransport>,
    bus: &ActivityBus,
) -> CopilotProvider {
    CopilotProvider::builder(config, loader_for(transport))
        .token_source(StaticTokenSource::ok("dl-token").shared())
        .bus(bus.clone())
        .build()
}

async fn connect(provider: &CopilotProvider) {
    let mut transitions = provider.controller().subscribe();
    provider.mount();
    tokio::time::timeout(Duration::from_secs(5), async {
        while transitions.recv().await.expect("transition channel open")
            != ConnectionStatus::Connected
        {}
    })
    .await
    .expect("connected in time");
}

fn bot_event(name: &str) -> Activity {
    Activity {
        name: Some(name.into()),
        value: Some(json!({"orderId": "A-17"})),
        ..Activity::new(ActivityKind::Event, ChannelAccount::bot("copilot"))
    }
}

fn collector() -> (Arc<Mutex<Vec<Activity>>>, ActivityCallback) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ActivityCallback =
        Arc::new(move |activity: &Activity| sink.lock().unwrap().push(activity.clone()));
    (seen, callback)
}

#[tokio::test]
async fn incoming_activities_reach_callback_bus_and_reducer() {
    let transport = Arc::new(MockTransport::new());
    let bus = ActivityBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let config = CopilotConfig::new(ENDPOINT).with_on_activity({
        let received = Arc::clone(&received);
        move |activity: &Activity| received.lock().unwrap().push(activity.clone())
    });
    let provider = provider(config, &transport, &bus);
    connect(&provider).await;

    let (hooked, callback) = collector();
    let _hook = provider.sync_scope(|| {
        use_copilot_activity(ActivityKind::Event, Some("order:confirmed"), callback)
    });

    let widget = ChatWidget::default();
    let view = provider.sync_scope(|| widget.render_in_scope()).unwrap();
    assert!(matches!(view, View::WebChat(_)));

    let store = transport.last_store().unwrap();
    let activity = bot_event("order:confirmed");
    store.dispatch(StoreAction::incoming_activity(&activity).unwrap());
    store.dispatch(StoreAction::new("WEB_CHAT/SEND_TYPING", json!({})));

    assert_eq!(*received.lock().unwrap(), vec![activity.clone()]);
    assert_eq!(*hooked.lock().unwrap(), vec![activity]);
    let reduced = store.reduced();
    assert_eq!(reduced.len(), 2);
    assert!(reduced[0].is_incoming_activity());
    assert_eq!(reduced[1].kind, "WEB_CHAT/SEND_TYPING");
}

#[tokio::test]
async fn updated_callback_applies_without_reconnecting() {
    let transport = Arc::new(MockTransport::new());
    let bus = ActivityBus::new();
    let provider = provider(CopilotConfig::new(ENDPOINT), &transport, &bus);
    connect(&provider).await;
    let widget = ChatWidget::default();
    provider.sync_scope(|| widget.render_in_scope()).unwrap();

    let (seen, callback) = collector();
    let config = CopilotConfig::new(ENDPOINT).with_on_activity(move |activity| callback(activity));
    assert!(!provider.update(config));

    transport
        .last_store()
        .unwrap()
        .dispatch(StoreAction::incoming_activity(&bot_event("ping")).unwrap());

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(transport.handles().len(), 1);
}

#[tokio::test]
async fn context_value_is_stable_until_state_changes() {
    let transport = Arc::new(MockTransport::new());
    let bus = ActivityBus::new();
    let provider = provider(CopilotConfig::new(ENDPOINT), &transport, &bus);

    let before = provider.context();
    assert!(Arc::ptr_eq(&before, &provider.context()));
    assert_eq!(before.status(), ConnectionStatus::Uninitialized);

    connect(&provider).await;

    let after = provider.context();
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(Arc::ptr_eq(&after, &provider.context()));
    assert_eq!(after.status(), ConnectionStatus::Connected);
    assert!(after.direct_line().is_some());
}

#[tokio::test]
async fn consumer_accessors_need_a_provider_scope() {
    let err = use_copilot().err().unwrap();
    assert_eq!(
        err.to_string(),
        "use_copilot must be used within a CopilotProvider scope"
    );
    assert!(use_copilot_context().is_err());
    assert!(ChatWidget::default().render_in_scope().is_err());

    let transport = Arc::new(MockTransport::new());
    let bus = ActivityBus::new();
    let provider = provider(CopilotConfig::new(ENDPOINT), &transport, &bus);
    connect(&provider).await;

    let status = provider
        .scope(async {
            tokio::task::yield_now().await;
            use_copilot().map(|copilot| copilot.status())
        })
        .await
        .unwrap();
    assert_eq!(status, ConnectionStatus::Connected);
}

#[tokio::test]
async fn consumer_sends_through_the_held_handle() {
    let transport = Arc::new(MockTransport::new());
    let bus = ActivityBus::new();
    let provider = provider(CopilotConfig::new(ENDPOINT), &transport, &bus);
    connect(&provider).await;

    provider.sync_scope(|| {
        let copilot = use_copilot().unwrap();
        assert!(copilot.direct_line().is_some());
        copilot.send_event("page:viewed", Some(json!({"path": "/"})));
        copilot.post_activity(PartialActivity::message("hi"));
    });

    let posted = transport.last_handle().unwrap().posted();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[0].name.as_deref(), Some("page:viewed"));
    assert_eq!(posted[1].text.as_deref(), Some("hi"));
}

#[tokio::test]
async fn shells_render_nothing_before_connecting() {
    let transport = Arc::new(MockTransport::new());
    let bus = ActivityBus::new();
    let provider = provider(CopilotConfig::new(ENDPOINT), &transport, &bus);

    let context = provider.context();
    assert!(ChatWidget::default().render(&context).is_empty());
    let composer = CopilotComposer::new(vec![View::Content("custom-ui".into())]);
    assert!(composer.render(&context).is_empty());
}

#[tokio::test]
async fn chat_widget_forwards_props_verbatim() {
    let transport = Arc::new(MockTransport::new());
    let bus = ActivityBus::new();
    let provider = provider(CopilotConfig::new(ENDPOINT), &transport, &bus);
    connect(&provider).await;

    let widget = ChatWidget::new(ChatWidgetProps {
        style_options: Some(StyleOptions {
            accent: Some("#00543e".into()),
            ..StyleOptions::default()
        }),
        activity_middleware: Some(json!("custom-activity-renderer")),
        ..ChatWidgetProps::default()
    })
    .with_option("locale", json!("nb-NO"));

    let context = provider.context();
    let View::WebChat(first) = widget.render(&context) else {
        panic!("expected web chat view");
    };
    assert_eq!(
        first.style_options.as_ref().and_then(|s| s.accent.as_deref()),
        Some("#00543e")
    );
    assert_eq!(first.activity_middleware, Some(json!("custom-activity-renderer")));
    assert!(first.attachment_middleware.is_none());
    assert_eq!(first.passthrough["locale"], "nb-NO");

    widget.render(&context);
    assert_eq!(transport.stores().len(), 1);
}

#[tokio::test]
async fn composer_wraps_children_when_available() {
    let transport = Arc::new(MockTransport::new());
    let bus = ActivityBus::new();
    let provider = provider(CopilotConfig::new(ENDPOINT), &transport, &bus);
    connect(&provider).await;

    let composer = CopilotComposer::new(vec![View::Content("custom-ui".into())]);
    match composer.render(&provider.context()) {
        View::Composer { children, .. } => assert_eq!(children.len(), 1),
        other => panic!("expected composer, got {other:?}"),
    }
}

#[tokio::test]
async fn composer_renders_from_enclosing_provider() {
    let transport = Arc::new(MockTransport::new());
    let bus = ActivityBus::new();
    let provider = provider(CopilotConfig::new(ENDPOINT), &transport, &bus);
    connect(&provider).await;

    let composer = CopilotComposer::new(vec![View::Content("custom-ui".into())]);
    assert!(composer.render_in_scope().is_err());

    let view = provider.sync_scope(|| composer.render_in_scope()).unwrap();
    assert!(matches!(view, View::Composer { ref children, .. } if children.len() == 1));
    assert_eq!(transport.stores().len(), 1);
}

#[tokio::test]
async fn composer_falls_back_to_bare_children() {
    let bus = ActivityBus::new();
    let children = vec![View::Content("custom-ui".into())];

    let without_composer = Arc::new(MockTransport::new().without_composer());
    let provider_a = provider(CopilotConfig::new(ENDPOINT), &without_composer, &bus);
    connect(&provider_a).await;
    let view = CopilotComposer::new(children.clone()).render(&provider_a.context());
    assert!(matches!(view, View::Fragment(ref items) if items.len() == 1));

    let provider_b = CopilotProvider::builder(CopilotConfig::new(ENDPOINT), absent_loader())
        .token_source(StaticTokenSource::ok("dl-token").shared())
        .bus(bus.clone())
        .build();
    let mut transitions = provider_b.controller().subscribe();
    provider_b.mount();
    tokio::time::timeout(Duration::from_secs(5), async {
        while transitions.recv().await.unwrap() != ConnectionStatus::Error {}
    })
    .await
    .unwrap();
    let view = CopilotComposer::new(children).render(&provider_b.context());
    assert!(matches!(view, View::Fragment(ref items) if items.len() == 1));
}

#[tokio::test]
async fn dropping_the_provider_releases_the_connection() {
    let transport = Arc::new(MockTransport::new());
    let bus = ActivityBus::new();
    let provider = provider(CopilotConfig::new(ENDPOINT), &transport, &bus);
    connect(&provider).await;

    drop(provider);

    assert!(transport.last_handle().unwrap().is_ended());
}
