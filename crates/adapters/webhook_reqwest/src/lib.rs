//! # mims-adapter-webhook-reqwest
//!
//! Delivers signed webhook requests over HTTP.
//!
//! ## Headers
//! Every POST carries `Content-Type: application/json`,
//! `X-Webhook-Signature`, `X-Webhook-Event`, `X-Webhook-Delivery` and
//! `User-Agent: mims-webhook/<version>`.
//!
//! ## Dependency rule
//! Depends on `mims-app` (for the [`WebhookSender`] port) and `mims-domain`.

mod config;
mod error;

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use mims_app::ports::{WebhookRequest, WebhookSender};
use mims_domain::error::DeliveryError;

pub use config::WebhookClientConfig;
pub use error::WebhookClientError;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const EVENT_HEADER: &str = "x-webhook-event";
pub const DELIVERY_HEADER: &str = "x-webhook-delivery";

const USER_AGENT: &str = concat!("mims-webhook/", env!("CARGO_PKG_VERSION"));

/// [`WebhookSender`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestWebhookSender {
    client: Client,
}

impl ReqwestWebhookSender {
    /// Build a sender from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookClientError::Build`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: &WebhookClientConfig) -> Result<Self, WebhookClientError> {
        Self::with_timeout(Duration::from_secs(config.timeout_secs))
    }

    /// Build a sender whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookClientError::Build`] if the TLS backend cannot be
    /// initialised.
    pub fn with_timeout(timeout: Duration) -> Result<Self, WebhookClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(WebhookClientError::Build)?;
        Ok(Self { client })
    }
}

/// Map a reqwest failure onto the delivery error reported to services.
fn delivery_error(err: reqwest::Error) -> DeliveryError {
    if err.is_timeout() {
        DeliveryError::Timeout
    } else {
        DeliveryError::Transport(Box::new(err))
    }
}

impl WebhookSender for ReqwestWebhookSender {
    async fn send(&self, request: WebhookRequest) -> Result<u16, DeliveryError> {
        let response = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, &request.signature)
            .header(EVENT_HEADER, &request.event)
            .header(DELIVERY_HEADER, &request.delivery_id)
            .body(request.body)
            .send()
            .await
            .map_err(delivery_error)?;

        let status = response.status();
        tracing::debug!(
            url = %request.url,
            event = %request.event,
            delivery = %request.delivery_id,
            status = status.as_u16(),
            "webhook answered"
        );
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    type Seen = Arc<Mutex<Vec<(HeaderMap, String)>>>;

    async fn serve(status: StatusCode, delay: Duration) -> (SocketAddr, Seen) {
        let seen: Seen = Arc::default();
        let recorded = Arc::clone(&seen);
        let app = Router::new().route(
            "/hook",
            post(move |headers: HeaderMap, body: String| {
                let recorded = Arc::clone(&recorded);
                async move {
                    recorded.lock().unwrap().push((headers, body));
                    tokio::time::sleep(delay).await;
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (addr, seen)
    }

    fn request(addr: SocketAddr) -> WebhookRequest {
        WebhookRequest {
            url: format!("http://{addr}/hook"),
            event: "case.created".into(),
            delivery_id: "d-1".into(),
            signature: "sha256=abc".into(),
            body: br#"{"event":"case.created"}"#.to_vec(),
        }
    }

    #[tokio::test]
    async fn should_post_body_with_signed_headers() {
        let (addr, seen) = serve(StatusCode::NO_CONTENT, Duration::ZERO).await;
        let sender = ReqwestWebhookSender::with_timeout(Duration::from_secs(5)).unwrap();

        let status = sender.send(request(addr)).await.unwrap();
        assert_eq!(status, 204);

        let seen = seen.lock().unwrap();
        let (headers, body) = &seen[0];
        assert_eq!(body, r#"{"event":"case.created"}"#);
        assert_eq!(headers[SIGNATURE_HEADER], "sha256=abc");
        assert_eq!(headers[EVENT_HEADER], "case.created");
        assert_eq!(headers[DELIVERY_HEADER], "d-1");
        assert_eq!(headers["content-type"], "application/json");
        assert!(
            headers["user-agent"]
                .to_str()
                .unwrap()
                .starts_with("mims-webhook/")
        );
    }

    #[tokio::test]
    async fn should_report_non_success_status() {
        let (addr, _) = serve(StatusCode::SERVICE_UNAVAILABLE, Duration::ZERO).await;
        let sender = ReqwestWebhookSender::with_timeout(Duration::from_secs(5)).unwrap();

        let err = sender.send(request(addr)).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Status(503)));
    }

    #[tokio::test]
    async fn should_time_out_on_slow_receiver() {
        let (addr, _) = serve(StatusCode::OK, Duration::from_secs(2)).await;
        let sender = ReqwestWebhookSender::with_timeout(Duration::from_millis(100)).unwrap();

        let err = sender.send(request(addr)).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Timeout));
    }

    #[tokio::test]
    async fn should_report_transport_error_when_nobody_listens() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let sender = ReqwestWebhookSender::with_timeout(Duration::from_secs(5)).unwrap();

        let err = sender.send(request(addr)).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }
}
