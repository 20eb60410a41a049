//! Ollama generator integration tests
//!
//! Tests the `OllamaGenerator` against a `wiremock` mock server:
//! model availability checks, NDJSON chunk streaming, and error
//! surfacing for server and stream failures.

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use calchat::config::GeneratorConfig;
use calchat::error::CalchatError;
use calchat::generator::{Generator, OllamaGenerator};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config_for(server: &MockServer) -> GeneratorConfig {
    GeneratorConfig {
        host: server.uri(),
        model: "llama3.2:latest".to_string(),
        timeout_seconds: 5,
    }
}

/// Mounts a /api/tags response advertising the given models.
async fn mount_tags(server: &MockServer, models: &[&str]) {
    let tags: Vec<_> = models
        .iter()
        .map(|name| serde_json::json!({ "name": name }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": tags,
        })))
        .mount(server)
        .await;
}

/// A generator already verified against the mock server.
async fn ready_generator(server: &MockServer) -> OllamaGenerator {
    mount_tags(server, &["llama3.2:latest"]).await;
    let generator = OllamaGenerator::new(config_for(server)).unwrap();
    generator.load_model().await.unwrap();
    generator
}

// ---------------------------------------------------------------------------
// Model availability
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_load_model_succeeds_when_installed() {
    let server = MockServer::start().await;
    mount_tags(&server, &["mistral:latest", "llama3.2:latest"]).await;

    let generator = OllamaGenerator::new(config_for(&server)).unwrap();
    assert!(!generator.is_ready());
    generator.load_model().await.unwrap();
    assert!(generator.is_ready());
}

#[tokio::test]
async fn test_load_model_fails_when_missing() {
    let server = MockServer::start().await;
    mount_tags(&server, &["mistral:latest"]).await;

    let generator = OllamaGenerator::new(config_for(&server)).unwrap();
    let err = generator.load_model().await.unwrap_err();
    assert!(err.to_string().contains("not installed"));
    assert!(!generator.is_ready());
}

#[tokio::test]
async fn test_load_model_fails_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let generator = OllamaGenerator::new(config_for(&server)).unwrap();
    assert!(generator.load_model().await.is_err());
}

#[tokio::test]
async fn test_stream_prompt_before_load_is_session_not_ready() {
    let server = MockServer::start().await;
    let generator = OllamaGenerator::new(config_for(&server)).unwrap();

    let err = generator.stream_prompt("hi").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CalchatError>(),
        Some(CalchatError::SessionNotReady)
    ));
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stream_prompt_concatenates_ndjson_chunks() {
    let server = MockServer::start().await;

    let body = concat!(
        "{\"response\":\"You \",\"done\":false}\n",
        "{\"response\":\"are \",\"done\":false}\n",
        "{\"response\":\"free.\",\"done\":false}\n",
        "{\"response\":\"\",\"done\":true}\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "llama3.2:latest",
            "stream": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let generator = ready_generator(&server).await;
    let mut handle = generator.stream_prompt("am I free?").await.unwrap();
    assert_eq!(handle.collect_text().await.unwrap(), "You are free.");
}

#[tokio::test]
async fn test_stream_prompt_sends_prompt_in_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "prompt": "classify this",
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("{\"response\":\"1\",\"done\":true}\n", "application/x-ndjson"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let generator = ready_generator(&server).await;
    let mut handle = generator.stream_prompt("classify this").await.unwrap();
    assert_eq!(handle.collect_text().await.unwrap(), "1");
}

#[tokio::test]
async fn test_generate_http_error_fails_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let generator = ready_generator(&server).await;
    let err = generator.stream_prompt("hi").await.unwrap_err();
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_error_line_in_stream_surfaces_as_chunk_error() {
    let server = MockServer::start().await;

    let body = concat!(
        "{\"response\":\"par\",\"done\":false}\n",
        "{\"error\":\"out of memory\"}\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let generator = ready_generator(&server).await;
    let mut handle = generator.stream_prompt("hi").await.unwrap();

    assert_eq!(handle.next_chunk().await.unwrap().unwrap(), "par");
    let err = handle.next_chunk().await.unwrap().unwrap_err();
    assert!(err.to_string().contains("out of memory"));
}

#[tokio::test]
async fn test_reset_is_ok_once_ready() {
    let server = MockServer::start().await;
    let generator = ready_generator(&server).await;
    assert!(generator.reset().await.is_ok());
}
