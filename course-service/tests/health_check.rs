//! End-to-end tests against a running PostgreSQL.
//!
//! Run with: TEST_DATABASE_URL=postgres://... cargo test -p course-service --test health_check -- --ignored

mod common;

use course_service::config::{
    CourseConfig, DatabaseConfig, GenerationConfig, ProvidersConfig,
};
use course_service::startup::Application;
use reqwest::Client;
use secrecy::Secret;
use service_core::config::Config as CommonConfig;
use std::time::Duration;

/// Spawn the application on a random port and return the port number.
async fn spawn_app() -> u16 {
    common::init_tracing();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run database tests");

    let config = CourseConfig {
        common: CommonConfig {
            port: 0,
            log_level: "debug".to_string(),
        },
        database: DatabaseConfig {
            url: Secret::new(database_url),
            max_connections: 2,
            min_connections: 1,
        },
        generation: GenerationConfig {
            step_delay: Duration::ZERO,
        },
        providers: ProvidersConfig::with_base_url("http://127.0.0.1:9"),
        otlp_endpoint: None,
    };

    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let port = app.port();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    port
}

#[tokio::test]
#[ignore] // Requires database
async fn health_check_returns_ok() {
    let port = spawn_app().await;
    let client = Client::new();

    let response = client
        .get(format!("http://localhost:{}/health", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "course-service");
}

#[tokio::test]
#[ignore] // Requires database
async fn migrations_seed_default_content_types() {
    let port = spawn_app().await;
    let client = Client::new();

    let types: Vec<String> = client
        .get(format!("http://localhost:{}/api/tipos-contenido-ia", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");

    assert!(types.contains(&"definicion".to_string()));
    assert!(!types.contains(&"código".to_string()));
}

#[tokio::test]
#[ignore] // Requires database
async fn credentials_round_trip_through_postgres() {
    let port = spawn_app().await;
    let client = Client::new();

    let response = client
        .post(format!("http://localhost:{}/api/configuracion", port))
        .json(&serde_json::json!({"DEEPSEEK_API_KEY": " sk-test "}))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: serde_json::Value = client
        .get(format!("http://localhost:{}/api/obtener-apikey/DeepSeek", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(body["apiKey"], "sk-test");

    let metrics = client
        .get(format!("http://localhost:{}/metrics", port))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read metrics");
    for operation in ["save_credential", "credential"] {
        assert!(
            metrics.contains(&format!("operation=\"{}\"", operation)),
            "missing timer for {}",
            operation
        );
    }
}
