//! Server-Sent Events stream of case events.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_stream::{Stream, StreamExt};

use mims_app::ports::Backend;
use mims_domain::user::Permission;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/events/stream`
///
/// Each case event is sent as an SSE frame named after the event kind, with
/// the JSON-encoded event as `data`. The stream ends when the client
/// disconnects or the bus starts closing, so open streams never hold up a
/// graceful shutdown.
///
/// # Errors
///
/// Returns 401 without a session and 403 without `view_cases`.
pub async fn stream<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    current.require(Permission::ViewCases)?;
    let user_id = current.user.id;
    tracing::debug!(user = %user_id, "event stream opened");

    let events = BroadcastStream::new(state.event_bus.subscribe()).filter_map(move |result| {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default()
                    .event(event.kind.as_str())
                    .id(event.id.to_string())
                    .data(json))),
                Err(err) => {
                    tracing::warn!(%err, "failed to encode event for stream");
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(user = %user_id, skipped, "event stream lagged, events dropped");
                None
            }
        }
    });

    let closing = WatchStream::new(state.event_bus.closing())
        .filter(|closing| *closing)
        .map(|_| None::<Result<Event, Infallible>>);
    let stream = events.map(Some).merge(closing).map_while(|frame| frame);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{TestApp, request};
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use mims_app::ports::EventPublisher;
    use mims_domain::event::{CaseEvent, EventKind};
    use mims_domain::id::CaseId;
    use mims_domain::user::Role;
    use tower::ServiceExt;

    #[tokio::test]
    async fn should_stream_published_events() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Viewer).await;

        let response = app
            .router()
            .oneshot(request("GET", "/api/events/stream", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/event-stream"
        );

        let case_id = CaseId::new();
        app.bus
            .publish(CaseEvent::new(
                EventKind::CaseCreated,
                Some(case_id),
                None,
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        let mut body = response.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
        assert!(text.contains("event: case.created"));
        assert!(text.contains(&case_id.to_string()));
    }

    #[tokio::test]
    async fn should_end_stream_when_bus_closes() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Viewer).await;
        let response = app
            .router()
            .oneshot(request("GET", "/api/events/stream", Some(&token), None))
            .await
            .unwrap();

        app.bus.close();

        let mut body = response.into_body();
        let end = tokio::time::timeout(std::time::Duration::from_secs(5), body.frame())
            .await
            .expect("stream should end once the bus closes");
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn should_require_session() {
        let app = TestApp::new();
        let response = app
            .router()
            .oneshot(request("GET", "/api/events/stream", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
