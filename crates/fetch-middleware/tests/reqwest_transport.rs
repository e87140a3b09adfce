//! End-to-end tests against a mock HTTP server
//!
//! These tests use WireMock to serve responses and verify that the middleware,
//! driving the real `ReqwestTransport`, sends the expected requests.

use fetch_middleware::{
    fetch_middleware, Action, Credentials, Dispatcher, FetchDescriptor, FetchError, FetchHandler,
    FormData, MiddlewareConfig, NextAction,
};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Clone, Default)]
struct AppState {
    token: Option<String>,
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn handler(
    server: &MockServer,
    state: AppState,
    configure: impl FnOnce(MiddlewareConfig<AppState>) -> MiddlewareConfig<AppState>,
) -> (
    FetchHandler<AppState, ()>,
    UnboundedReceiver<NextAction<AppState>>,
) {
    init_logging();
    let base = Url::parse(&format!("{}/", server.uri())).expect("mock server uri");
    let config = configure(MiddlewareConfig::new().with_base_url(base));
    let (dispatcher, rx) = Dispatcher::channel();
    let handler = fetch_middleware(config)
        .bind(move || state.clone())
        .with_next(dispatcher.as_next());
    (handler, rx)
}

fn drain(rx: &mut UnboundedReceiver<NextAction<AppState>>) -> Vec<String> {
    let mut types = Vec::new();
    while let Ok(action) = rx.try_recv() {
        types.push(action.action_type().to_string());
    }
    types
}

#[tokio::test]
async fn test_fetches_resource() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/test.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": true})))
        .expect(1)
        .mount(&server)
        .await;

    let (handler, mut rx) = handler(&server, AppState::default(), |c| c);
    let body = handler
        .handle(Action::new("test").with_fetch(FetchDescriptor::get("test.json")))
        .into_fetch()
        .unwrap()
        .await
        .unwrap();

    assert_eq!(body, json!({"data": true}));
    assert_eq!(drain(&mut rx), vec!["test_PENDING", "test"]);
}

#[tokio::test]
async fn test_not_found_forwards_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/test.json"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "nope"})))
        .mount(&server)
        .await;

    let (handler, mut rx) = handler(&server, AppState::default(), |c| c);
    let err = handler
        .handle(Action::new("test").with_fetch(FetchDescriptor::get("/test.json")))
        .into_fetch()
        .unwrap()
        .await
        .unwrap_err();

    let request_error = err.as_request_error().expect("request error");
    assert_eq!(request_error.status, 404);
    assert_eq!(request_error.response.status_text, "Not Found");
    assert_eq!(request_error.body, json!({"error": "nope"}));
    assert_eq!(drain(&mut rx), vec!["test_PENDING", "test_FAILURE"]);
}

#[tokio::test]
async fn test_plain_text_error_body_rejects_with_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&server)
        .await;

    let (handler, mut rx) = handler(&server, AppState::default(), |c| c);
    let err = handler
        .handle(Action::new("test").with_fetch(FetchDescriptor::get("/test.json")))
        .into_fetch()
        .unwrap()
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::BodyParse { status: 404, .. }));
    assert_eq!(drain(&mut rx), vec!["test_PENDING"]);
}

#[tokio::test]
async fn test_post_sends_json_with_auth_and_merged_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("authorization", "Bearer secret"))
        .and(header("x-app-id", "fetch"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .and(body_json(json!({"name": "ferris"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
        .expect(1)
        .mount(&server)
        .await;

    let state = AppState {
        token: Some("secret".into()),
    };
    let (handler, _rx) = handler(&server, state, |c| {
        c.with_header("X-App-Id", "config")
            .with_auth_provider(|state: &AppState, _| {
                Ok(state.token.as_ref().map(|t| format!("Bearer {}", t)))
            })
    });

    let body = handler
        .handle(
            Action::new("create_user")
                .with_payload(json!({"name": "ferris"}))
                .with_fetch(
                    FetchDescriptor::get("/users")
                        .method("POST")
                        .header("X-App-Id", "fetch"),
                ),
        )
        .into_fetch()
        .unwrap()
        .await
        .unwrap();

    assert_eq!(body, json!({"id": 7}));
}

#[tokio::test]
async fn test_disabled_auth_sends_no_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(|request: &Request| {
            let has_auth = request.headers.contains_key("authorization");
            ResponseTemplate::new(200).set_body_json(json!({ "auth": has_auth }))
        })
        .mount(&server)
        .await;

    let (handler, _rx) = handler(&server, AppState::default(), |c| {
        c.with_auth_provider(|_: &AppState, _| Ok(Some("Bearer global".into())))
    });

    let body = handler
        .handle(Action::new("public").with_fetch(FetchDescriptor::get("/public").auth(false)))
        .into_fetch()
        .unwrap()
        .await
        .unwrap();

    assert_eq!(body, json!({"auth": false}));
}

#[tokio::test]
async fn test_multipart_upload_gets_boundary_from_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(|request: &Request| {
            let content_type = request
                .headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            ResponseTemplate::new(200).set_body_json(json!({ "content_type": content_type }))
        })
        .mount(&server)
        .await;

    let (handler, _rx) = handler(&server, AppState::default(), |c| c);
    let form = FormData::new()
        .text("title", "avatar")
        .file("file", "a.png", Some("image/png"), vec![137u8, 80, 78, 71]);

    let body = handler
        .handle(
            Action::new("upload")
                .with_payload(form)
                .with_fetch(FetchDescriptor::get("/upload").method("POST")),
        )
        .into_fetch()
        .unwrap()
        .await
        .unwrap();

    let content_type = body["content_type"].as_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
}

#[tokio::test]
async fn test_cookies_follow_credentials_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=abc; Path=/")
                .set_body_json(json!({"ok": true})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(|request: &Request| {
            let cookie = request
                .headers
                .get("cookie")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            ResponseTemplate::new(200).set_body_json(json!({ "cookie": cookie }))
        })
        .mount(&server)
        .await;

    let (handler, _rx) = handler(&server, AppState::default(), |c| {
        c.with_credentials(Credentials::SameOrigin)
    });
    let run = |descriptor: FetchDescriptor<AppState>| {
        let handle = handler
            .handle(Action::new("session").with_fetch(descriptor))
            .into_fetch()
            .unwrap();
        async move { handle.await.unwrap() }
    };

    run(FetchDescriptor::get("/login").method("POST")).await;

    let me = run(FetchDescriptor::get("/me")).await;
    assert_eq!(me, json!({"cookie": "session=abc"}));

    let me = run(FetchDescriptor::get("/me").credentials(Credentials::Omit)).await;
    assert_eq!(me, json!({"cookie": null}));
}

#[tokio::test]
async fn test_unreachable_host_forwards_failure_with_500() {
    init_logging();
    let (dispatcher, mut rx) = Dispatcher::<AppState>::channel();
    let handler = fetch_middleware(MiddlewareConfig::new())
        .bind(AppState::default)
        .with_next(dispatcher.as_next());

    let err = handler
        .handle(Action::new("down").with_fetch(FetchDescriptor::get("http://127.0.0.1:1/")))
        .into_fetch()
        .unwrap()
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transport(_)));
    let forwarded: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert_eq!(forwarded.len(), 2);
    match &forwarded[1] {
        NextAction::Failure(failure) => assert_eq!(failure.meta.status, 500),
        other => panic!("expected failure, got {:?}", other),
    }
}
