use httpmock::prelude::*;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use vision_crew::config::crew_config::VisionConfig;
use vision_crew::core::functions::{FunctionRegistry, SendImageToApi};
use vision_crew::core::image::{encode_bytes, encode_image};
use vision_crew::domain::model::FunctionCall;
use vision_crew::{CrewError, VisionClient};

fn jpeg_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00])
        .unwrap();
    file
}

fn client(server: &MockServer) -> VisionClient {
    VisionClient::new(
        VisionConfig {
            endpoint: server.url("/v1/chat/completions"),
            ..VisionConfig::default()
        },
        "sk-integration".to_string(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_describe_image_end_to_end() {
    let server = MockServer::start();
    let file = jpeg_file();
    let encoded = encode_image(file.path()).unwrap();

    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("Authorization", "Bearer sk-integration")
            .body_contains(format!("data:image/jpeg;base64,{}", encoded))
            .body_contains(r#""max_tokens":1000"#);
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "id": "chatcmpl-1",
                "choices": [{"message": {"role": "assistant", "content": "A timer app mockup."}}]
            }));
    });

    let response = client(&server)
        .send_image(file.path(), Some("Describe the UI"))
        .await
        .unwrap();

    api_mock.assert();
    assert_eq!(response["choices"][0]["message"]["content"], "A timer app mockup.");
}

#[tokio::test]
async fn test_send_image_to_api_function_call() {
    let server = MockServer::start();
    let file = jpeg_file();
    let bytes = std::fs::read(file.path()).unwrap();

    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains(encode_bytes(&bytes));
        then.status(200)
            .json_body(serde_json::json!({"choices": [{"message": {"content": "ok"}}]}));
    });

    let mut registry = FunctionRegistry::new();
    registry.register(Arc::new(SendImageToApi::new(Arc::new(client(&server)))));

    let result = registry
        .execute(&FunctionCall {
            name: "send_image_to_api".to_string(),
            arguments: serde_json::json!({"image_path": file.path()}).to_string(),
        })
        .await
        .unwrap();

    api_mock.assert();
    assert_eq!(result["choices"][0]["message"]["content"], "ok");
    assert_eq!(registry.specs()[0].name, "send_image_to_api");
}

#[tokio::test]
async fn test_function_call_with_missing_argument() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST);
        then.status(200);
    });

    let mut registry = FunctionRegistry::new();
    registry.register(Arc::new(SendImageToApi::new(Arc::new(client(&server)))));

    let err = registry
        .execute(&FunctionCall {
            name: "send_image_to_api".to_string(),
            arguments: r#"{"path": "cat.jpg"}"#.to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CrewError::ValidationError { .. }));
    api_mock.assert_hits(0);
}

#[tokio::test]
async fn test_rate_limit_is_retryable_error() {
    let server = MockServer::start();
    let file = jpeg_file();

    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(429).body(r#"{"error": {"message": "Rate limit reached"}}"#);
    });

    let err = client(&server).send_image(file.path(), None).await.unwrap_err();

    assert!(err.is_retryable());
    assert!(err.recovery_suggestion().contains("Rate limited"));
}
