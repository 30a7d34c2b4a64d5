//! Axum Router Configuration
//!
//! Wires the health probe and the WebSocket endpoint to the shared state.

use crate::{handlers, state::AppState, ws::ws_handler};
use axum::{Router, routing::get};
use std::sync::Arc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ProviderKind};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use glimpse_core::capture::{MockAudioSource, MockScreenSource};
    use glimpse_core::completion::{ChatMessage, CompletionClient, CompletionError};
    use std::time::Duration;
    use tower::util::ServiceExt; // for `oneshot`

    struct StubCompletion;

    #[async_trait::async_trait]
    impl CompletionClient for StubCompletion {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, CompletionError> {
            Ok(String::new())
        }
    }

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            screen: Arc::new(MockScreenSource::new("screen")),
            audio: Arc::new(MockAudioSource::new("")),
            completion: Arc::new(StubCompletion),
            config: Arc::new(Config {
                bind_address: "127.0.0.1:8000".parse().unwrap(),
                auth_token: "shared-secret".to_string(),
                provider: ProviderKind::OpenRouter,
                openai_api_key: None,
                openrouter_api_key: Some("k".to_string()),
                model: "test-model".to_string(),
                temperature: 0.1,
                max_tokens: 256,
                timeout: Duration::from_secs(5),
                referer: "http://localhost:3000".to_string(),
                title: "Assistant".to_string(),
                log_level: tracing::Level::INFO,
            }),
        })
    }

    fn ws_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("connection", "upgrade")
            .header("upgrade", "websocket")
            .header("sec-websocket-version", "13")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn health_probe_answers_ok() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "glimpse backend is running");
    }

    #[tokio::test]
    async fn websocket_with_wrong_token_is_refused_before_upgrade() {
        let app = create_router(test_state());

        let response = app.oneshot(ws_request("/ws?token=wrong")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "unauthorized");
    }

    #[tokio::test]
    async fn websocket_without_token_is_refused() {
        let app = create_router(test_state());

        let response = app.oneshot(ws_request("/ws")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn websocket_with_valid_token_upgrades() {
        let app = create_router(test_state());

        let response = app
            .oneshot(ws_request("/ws?token=shared-secret"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
    }
}
