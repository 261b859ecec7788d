//! End-to-end smoke tests for the full mimsd stack.
//!
//! Each test spins up the complete application (in-memory `SQLite`, real repos,
//! real services, real axum router) and exercises the HTTP layer via
//! `tower::ServiceExt::oneshot`. Only the webhook test binds a port, for the
//! receiving side.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use mims_adapter_http_axum::router;
use mims_adapter_http_axum::state::AppState;
use mims_adapter_storage_sqlite_sqlx::Config as StorageConfig;
use mims_adapter_webhook_reqwest::{EVENT_HEADER, SIGNATURE_HEADER};
use mims_domain::webhook::signature;
use mimsd::config::Config;
use mimsd::wiring::{Events, SqliteBackend, assemble};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "correct-horse-battery";

struct TestApp {
    state: AppState<SqliteBackend>,
    events: Option<Events>,
    _attachments: TempDir,
}

/// Wire the whole application against an in-memory database.
async fn app() -> TestApp {
    let attachments = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();
    config.attachments.directory = attachments.path().display().to_string();

    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .expect("in-memory database should initialise");
    let mims = assemble(&config, &db).await.unwrap();
    mims.state
        .auth
        .bootstrap_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
        .await
        .unwrap()
        .expect("empty database gets an administrator");

    TestApp {
        state: mims.state,
        events: Some(mims.events),
        _attachments: attachments,
    }
}

impl TestApp {
    fn router(&self) -> axum::Router {
        router::build(self.state.clone())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Bytes) {
        let resp = self.router().oneshot(request).await.unwrap();
        let status = resp.status();
        (status, resp.into_body().collect().await.unwrap().to_bytes())
    }

    async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, bytes) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn login(&self) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_return_ok_when_health_check_called() {
    let app = app().await;
    let (status, body) = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"OK");
}

// ---------------------------------------------------------------------------
// Sessions and cases
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_reject_api_calls_without_session() {
    let app = app().await;
    let (status, _) = app.json("GET", "/api/cases", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn should_reject_wrong_password() {
    let app = app().await;
    let (status, _) = app
        .json(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": ADMIN_EMAIL, "password": "not-the-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn should_create_and_list_cases_as_bootstrap_admin() {
    let app = app().await;
    let token = app.login().await;

    let (status, me) = app.json("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "admin");

    let (status, created) = app
        .json(
            "POST",
            "/api/cases",
            Some(&token),
            Some(json!({"title": "Water leak", "severity": "high", "location": "Lobby"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "new");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, page) = app.json("GET", "/api/cases", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["title"], "Water leak");

    let (status, activities) = app
        .json("GET", &format!("/api/cases/{id}/activities"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!activities.as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_store_and_serve_attachment_from_disk() {
    let app = app().await;
    let token = app.login().await;
    let (_, created) = app
        .json(
            "POST",
            "/api/cases",
            Some(&token),
            Some(json!({"title": "Broken window"})),
        )
        .await;
    let case_id = created["id"].as_str().unwrap();

    let (status, bytes) = app
        .send(
            Request::builder()
                .method("POST")
                .uri(format!("/api/cases/{case_id}/attachments?file_name=photo.txt"))
                .header("authorization", format!("Bearer {token}"))
                .header("content-type", "text/plain")
                .body(Body::from("glass everywhere"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let attachment: Value = serde_json::from_slice(&bytes).unwrap();
    let attachment_id = attachment["id"].as_str().unwrap();

    let (status, bytes) = app
        .send(
            Request::builder()
                .uri(format!("/api/attachments/{attachment_id}"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&bytes[..], b"glass everywhere");
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

/// Start a receiver that forwards each delivery's headers and body.
async fn webhook_receiver() -> (String, mpsc::Receiver<(HeaderMap, Bytes)>) {
    let (tx, rx) = mpsc::channel(8);
    let receiver = axum::Router::new().route(
        "/hook",
        axum::routing::post(move |headers: HeaderMap, body: Bytes| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((headers, body)).await;
                StatusCode::NO_CONTENT
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, receiver).await });
    (format!("http://{addr}/hook"), rx)
}

#[tokio::test]
async fn should_deliver_signed_webhook_when_case_is_created() {
    let mut app = app().await;
    let events = app.events.take().unwrap();
    tokio::spawn(events.run(app.state.event_bus.subscribe(), std::future::pending()));
    let (url, mut deliveries) = webhook_receiver().await;
    let secret = "integration-test-secret-0001";
    let token = app.login().await;

    let (status, webhook) = app
        .json(
            "POST",
            "/api/webhooks",
            Some(&token),
            Some(json!({
                "name": "erp",
                "url": url,
                "events": ["case.created"],
                "secret": secret,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(webhook["secret"], secret);

    let (status, created) = app
        .json(
            "POST",
            "/api/cases",
            Some(&token),
            Some(json!({"title": "Gate jammed"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (headers, body) = tokio::time::timeout(Duration::from_secs(5), deliveries.recv())
        .await
        .expect("delivery should arrive")
        .unwrap();
    assert_eq!(headers[EVENT_HEADER], "case.created");
    let signature_header = headers[SIGNATURE_HEADER].to_str().unwrap();
    assert!(signature::verify(secret, &body, signature_header));

    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["event"], "case.created");
    assert_eq!(payload["case_id"], created["id"]);
}

// ---------------------------------------------------------------------------
// Notification outbox
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_queue_deleted_case_notification_after_row_is_gone() {
    let mut app = app().await;
    let events = app.events.take().unwrap();
    tokio::spawn(events.run(app.state.event_bus.subscribe(), std::future::pending()));
    let token = app.login().await;

    let (status, channel) = app
        .json(
            "POST",
            "/api/line-channels",
            Some(&token),
            Some(json!({"name": "Ops", "access_token": "line-token", "default_target": "Cgroup"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    for (event, body) in [
        ("case.created", "opened {{ case.reference }}"),
        ("case.deleted", "removed {{ case.reference }}"),
    ] {
        let (status, _) = app
            .json(
                "POST",
                "/api/notification-templates",
                Some(&token),
                Some(json!({
                    "name": event,
                    "event": event,
                    "channel_id": channel["id"],
                    "body": body,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, created) = app
        .json(
            "POST",
            "/api/cases",
            Some(&token),
            Some(json!({"title": "Flooded basement"})),
        )
        .await;
    let reference = created["reference"].as_str().unwrap().to_string();
    let (status, _) = app
        .json(
            "DELETE",
            &format!("/api/cases/{}", created["id"].as_str().unwrap()),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let mut messages = Vec::new();
    for _ in 0..100 {
        let (_, rows) = app
            .json("GET", "/api/notifications", Some(&token), None)
            .await;
        messages = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["message"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        if messages.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    messages.sort();
    assert_eq!(
        messages,
        vec![format!("opened {reference}"), format!("removed {reference}")]
    );
}
