use crate::controller::health_check_controller;
use crate::sse::handler;
use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use log::*;
use service::{config::Config, AppState};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub fn define_routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config);

    Router::new()
        .merge(health_routes())
        .merge(sse_routes(app_state))
        .layer(cors)
}

fn health_routes() -> Router {
    Router::new()
        .route("/", get(health_check_controller::health_check))
        .route("/health_check", get(health_check_controller::health_check))
}

/// Long-lived event streams. Unauthenticated: the browser's EventSource
/// cannot attach custom headers.
fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/listen/:identity", get(handler::listen))
        .route(
            "/events/patient/:hospital_key",
            get(handler::patient_events),
        )
        .with_state(app_state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any);

    if config.allows_any_origin() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use bytes::Bytes;
    use clap::Parser;
    use http_body_util::BodyExt;
    use sea_orm::DatabaseConnection;
    use serde_json::{json, Value};
    use sse::message::Notification;
    use sse::{Manager, SubscriberId};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tower::ServiceExt;

    fn app(args: &[&str]) -> (Router, Manager) {
        let (router, manager, _hub) = app_with_hub(args);
        (router, manager)
    }

    fn app_with_hub(args: &[&str]) -> (Router, Manager, JoinHandle<()>) {
        let config =
            Config::try_parse_from(std::iter::once("vitalsign_api").chain(args.iter().copied()))
                .unwrap();
        let (manager, hub) = Manager::start(config.hub_config());
        let db = Arc::new(DatabaseConnection::Disconnected);
        let app_state = AppState::new(config, &db, manager.clone());

        (define_routes(app_state), manager, hub)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn next_frame(body: &mut Body) -> Option<Bytes> {
        let frame = timeout(Duration::from_secs(1), body.frame()).await.ok()??;
        frame.unwrap().into_data().ok()
    }

    #[tokio::test]
    async fn health_endpoints_report_ok() {
        let (router, _manager) = app(&[]);

        for uri in ["/", "/health_check"] {
            let response = router.clone().oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);

            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body, json!({"ok": true}));
        }
    }

    #[tokio::test]
    async fn listen_streams_group_notifications_as_data_frames() {
        let (router, manager) = app(&[]);

        let response = router.oneshot(get_request("/listen/hosp-42")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()[header::CONNECTION], "keep-alive");

        let registry = manager.inspect().await.unwrap();
        let entry = registry.get(&SubscriberId::from("hosp-42")).unwrap();
        assert_eq!(entry.group.as_deref(), Some("hosp-42"));

        manager
            .publish(Notification::to_group("hosp-42", r#"{"n":1}"#))
            .unwrap();

        let mut body = response.into_body();
        assert_eq!(
            next_frame(&mut body).await,
            Some(Bytes::from_static(b"data: {\"n\":1}\n\n"))
        );
    }

    #[tokio::test]
    async fn other_hospitals_receive_nothing() {
        let (router, manager) = app(&["--sse-patience-ms", "200"]);

        let hosp_1 = router.clone().oneshot(get_request("/listen/hosp-1")).await.unwrap();
        let hosp_2 = router.oneshot(get_request("/listen/hosp-2")).await.unwrap();
        assert_eq!(manager.inspect().await.unwrap().len(), 2);

        manager
            .publish(Notification::to_group("hosp-1", "update"))
            .unwrap();

        let mut hosp_1 = hosp_1.into_body();
        assert_eq!(
            next_frame(&mut hosp_1).await,
            Some(Bytes::from_static(b"data: update\n\n"))
        );

        let mut hosp_2 = hosp_2.into_body();
        let nothing = timeout(Duration::from_millis(200), hosp_2.frame()).await;
        assert!(nothing.is_err(), "hosp-2 should not receive hosp-1 updates");
    }

    #[tokio::test]
    async fn patient_event_streams_share_their_hospital_group() {
        let (router, manager) = app(&[]);

        let first = router
            .clone()
            .oneshot(get_request("/events/patient/hosp-7"))
            .await
            .unwrap();
        let second = router
            .oneshot(get_request("/events/patient/hosp-7"))
            .await
            .unwrap();

        let registry = manager.inspect().await.unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry
            .entries
            .iter()
            .all(|entry| entry.group.as_deref() == Some("hosp-7")
                && entry.identity.as_str() == entry.connection_id.as_str()));

        manager
            .publish(Notification::to_group("hosp-7", "[]"))
            .unwrap();

        for response in [first, second] {
            let mut body = response.into_body();
            assert_eq!(
                next_frame(&mut body).await,
                Some(Bytes::from_static(b"data: []\n\n"))
            );
        }
    }

    #[tokio::test]
    async fn multi_line_payloads_become_one_event() {
        let (router, manager) = app(&[]);

        let response = router.oneshot(get_request("/listen/hosp-3")).await.unwrap();
        manager.inspect().await.unwrap();
        manager
            .publish(Notification::to_group("hosp-3", "line one\r\nline two"))
            .unwrap();

        let mut body = response.into_body();
        assert_eq!(
            next_frame(&mut body).await,
            Some(Bytes::from_static(b"data: line one\ndata: line two\n\n"))
        );
    }

    #[tokio::test]
    async fn closing_the_stream_unregisters_the_subscriber() {
        let (router, manager) = app(&[]);

        let response = router.oneshot(get_request("/listen/hosp-9")).await.unwrap();
        assert!(manager
            .inspect()
            .await
            .unwrap()
            .contains(&SubscriberId::from("hosp-9")));

        drop(response);

        assert!(!manager
            .inspect()
            .await
            .unwrap()
            .contains(&SubscriberId::from("hosp-9")));
    }

    #[tokio::test]
    async fn listen_without_a_running_hub_is_streaming_unsupported() {
        let (router, manager, hub) = app_with_hub(&[]);
        manager.shutdown().await;
        hub.await.unwrap();

        let response = router.oneshot(get_request("/listen/hosp-1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"code": 500, "message": "streaming unsupported"}));
    }

    #[tokio::test]
    async fn configured_origins_are_echoed_back() {
        let (router, _manager) = app(&["--allowed-origins", "https://ward.example.org"]);

        let request = Request::builder()
            .uri("/health_check")
            .header(header::ORIGIN, "https://ward.example.org")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://ward.example.org"
        );
    }
}
