use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use copilot_widget_server::{
    GenerateTokenOptions, JsonResponseWriter, TokenExchangeError, generate_token, router,
    token_middleware,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

const SECRET: &str = "dl-secret-value";

async fn direct_line(status: u16, body: Value) -> (MockServer, GenerateTokenOptions) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/directline/tokens/generate"))
        .and(header("authorization", format!("Bearer {SECRET}").as_str()))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    let options = GenerateTokenOptions::new(SECRET).with_direct_line_url(format!(
        "{}/v3/directline/tokens/generate",
        server.uri()
    ));
    (server, options)
}

async fn post_token(options: GenerateTokenOptions) -> (StatusCode, String) {
    let response = router(options)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/copilot/token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn exchanges_secret_for_credential() {
    let (_server, options) = direct_line(
        200,
        json!({"token": "short-lived", "conversationId": "conv-1", "expires_in": 1800}),
    )
    .await;

    let credential = generate_token(&options).await.unwrap();

    assert_eq!(credential.token, "short-lived");
    assert_eq!(credential.conversation_id.as_deref(), Some("conv-1"));
    assert_eq!(credential.expires_in, Some(1800));
}

#[tokio::test]
async fn rejected_secret_is_a_remote_error() {
    let (_server, options) = direct_line(403, json!({"error": {"code": "BadArgument"}})).await;

    let err = generate_token(&options).await.unwrap_err();

    let TokenExchangeError::Remote { status, message } = &err else {
        panic!("expected remote error, got {err:?}");
    };
    assert_eq!(*status, StatusCode::FORBIDDEN);
    assert!(message.contains("BadArgument"));
}

#[tokio::test]
async fn route_returns_credential_json() {
    let (_server, options) = direct_line(
        200,
        json!({"token": "short-lived", "conversationId": "conv-1", "expires_in": 1800}),
    )
    .await;

    let (status, body) = post_token(options).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        body,
        json!({"token": "short-lived", "conversationId": "conv-1", "expires_in": 1800})
    );
}

#[tokio::test]
#[tracing_test::traced_test]
async fn route_failure_is_500_without_the_secret() {
    let (_server, options) = direct_line(401, json!({"message": "bad secret"})).await;

    let (status, body) = post_token(options).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json,
        json!({"error": "failed to generate Direct Line token: 401 Unauthorized"})
    );
    assert!(!body.contains(SECRET));
    assert!(logs_contain("token exchange failed"));
    assert!(!logs_contain(SECRET));
}

#[tokio::test]
async fn healthz_is_no_content() {
    let response = router(GenerateTokenOptions::new(SECRET))
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn middleware_writes_success_and_failure() {
    let (_server, options) = direct_line(200, json!({"token": "short-lived"})).await;
    let mut writer = JsonResponseWriter::default();
    token_middleware(&options, &mut writer).await;
    assert_eq!(writer.status, Some(StatusCode::OK));
    assert_eq!(writer.body, Some(json!({"token": "short-lived"})));

    let (_server, options) = direct_line(500, json!({})).await;
    let mut writer = JsonResponseWriter::default();
    token_middleware(&options, &mut writer).await;
    assert_eq!(writer.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
    let body = writer.body.unwrap();
    assert!(body["error"].as_str().unwrap().contains("500"));
    assert!(!body.to_string().contains(SECRET));
}
