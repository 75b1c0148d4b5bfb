//! Integration tests that run the relay on a real socket.

use reqwest::Client;
use serde_json::json;
use service_core::config::Config;
use std::sync::Arc;
use std::time::Duration;
use vertex_relay::config::{GcpConfig, RelayConfig, VertexSettings};
use vertex_relay::services::providers::MockInferenceClient;
use vertex_relay::startup::Application;

fn test_config() -> RelayConfig {
    RelayConfig {
        common: Config { port: 0 }, // Random port
        gcp: GcpConfig {
            project_id: "demo-project".to_string(),
            location: "us-central1".to_string(),
        },
        vertex: VertexSettings {
            api_base: "http://127.0.0.1:9".to_string(),
            metadata_host: "127.0.0.1:9".to_string(),
            access_token: None,
        },
    }
}

/// Spawn the application on a random port and return the port number.
async fn spawn_app(text: &str) -> u16 {
    let app = Application::build_with_client(
        test_config(),
        Arc::new(MockInferenceClient::with_text(text)),
    )
    .await
    .expect("Failed to build application");

    let port = app.port();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    port
}

#[tokio::test]
async fn health_check_returns_ok() {
    let port = spawn_app("unused").await;

    let response = Client::new()
        .get(format!("http://localhost:{}/health", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "vertex-relay");
}

#[tokio::test]
async fn relay_round_trip_over_http() {
    let port = spawn_app("hello from the relay").await;

    let response = Client::new()
        .post(format!("http://localhost:{}/", port))
        .json(&json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]}))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(
        body["candidates"][0]["content"]["parts"][0]["text"],
        "hello from the relay"
    );
    assert_eq!(body["modelVersion"], "gemini-1.5-flash");
}

#[tokio::test]
async fn build_uses_static_token_when_configured() {
    let mut config = test_config();
    config.vertex.access_token = Some(secrecy::Secret::new("ya29.local".to_string()));

    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    assert_ne!(app.port(), 0);
}
