use crate::config::cli::LocalStorage;
use crate::config::config_list::ModelConfig;
use crate::config::crew_config::LlmConfig;
use crate::core::cache::ResponseCache;
use crate::core::ChatBackend;
use crate::domain::model::{ChatReply, ChatRequest, FunctionCall};
use crate::utils::error::{CrewError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI 相容的 chat completions 後端，依序嘗試 config list 中的每個模型
pub struct OpenAiChat {
    client: Client,
    config_list: Vec<ModelConfig>,
    cache: Option<ResponseCache<LocalStorage>>,
}

impl OpenAiChat {
    pub fn new(config_list: Vec<ModelConfig>, timeout: Duration) -> Result<Self> {
        if config_list.is_empty() {
            return Err(CrewError::ConfigError {
                message: "model config list is empty after filtering".to_string(),
            });
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            config_list,
            cache: None,
        })
    }

    /// 依 `[llm]` 設定建立後端，只有非空白的 seed 才啟用快取
    pub fn from_config(config_list: Vec<ModelConfig>, llm: &LlmConfig) -> Result<Self> {
        let backend = Self::new(
            config_list,
            Duration::from_secs(llm.request_timeout_seconds),
        )?;

        Ok(match llm.cache_seed() {
            Some(seed) => {
                tracing::debug!("Response cache enabled under {}/{}", llm.cache_dir, seed);
                backend.with_cache(Path::new(&llm.cache_dir), seed)
            }
            None => backend,
        })
    }

    /// 啟用 `<cache_dir>/<seed>` 快取
    pub fn with_cache(mut self, cache_dir: &Path, seed: &str) -> Self {
        self.cache = Some(ResponseCache::new(LocalStorage::new(cache_dir.join(seed))));
        self
    }

    fn request_body(config: &ModelConfig, request: &ChatRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": config.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });
        if !request.functions.is_empty() {
            body["functions"] = serde_json::json!(request.functions);
        }
        body
    }

    async fn complete_with(
        &self,
        config: &ModelConfig,
        body: &serde_json::Value,
    ) -> Result<ChatReply> {
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        tracing::debug!("Chat completion request to {} (model: {})", url, config.model);

        let mut builder = self.client.post(&url).json(body);
        if let Some(key) = &config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrewError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response.json().await?;
        parse_reply(&json)
    }
}

/// 解析 `choices[0].message`，function_call 優先於文字內容
pub fn parse_reply(json: &serde_json::Value) -> Result<ChatReply> {
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| CrewError::ValidationError {
            message: "response has no choices[0].message".to_string(),
        })?;

    if let Some(call) = message.get("function_call").filter(|c| !c.is_null()) {
        let call: FunctionCall = serde_json::from_value(call.clone())?;
        return Ok(ChatReply::FunctionCall(call));
    }

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default();
    Ok(ChatReply::Text(content.to_string()))
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatReply> {
        let mut last_error = None;

        for config in &self.config_list {
            let body = Self::request_body(config, request);
            let cache_key = ResponseCache::<LocalStorage>::key_for(&body);

            if let Some(cache) = &self.cache {
                if let Some(reply) = cache.get(&cache_key).await {
                    tracing::debug!("Cache hit for model {}", config.model);
                    return Ok(reply);
                }
            }

            match self.complete_with(config, &body).await {
                Ok(reply) => {
                    if let Some(cache) = &self.cache {
                        if let Err(e) = cache.put(&cache_key, &reply).await {
                            tracing::warn!("Failed to write response cache: {}", e);
                        }
                    }
                    return Ok(reply);
                }
                Err(e) => {
                    tracing::warn!("⚠️  Model {} failed: {}", config.model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CrewError::ConfigError {
            message: "no model configured".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{FunctionSpec, WireMessage};
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn model(name: &str, base_url: String) -> ModelConfig {
        ModelConfig {
            model: name.to_string(),
            api_key: Some("sk-test".to_string()),
            base_url: Some(base_url),
            api_type: None,
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![
                WireMessage::system("Critic. Double check plan."),
                WireMessage::user("Here is the plan."),
            ],
            temperature: 0.0,
            functions: vec![],
        }
    }

    #[test]
    fn test_parse_text_reply() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Looks good."}}]
        });
        assert_eq!(parse_reply(&json).unwrap(), ChatReply::Text("Looks good.".to_string()));
    }

    #[test]
    fn test_parse_function_call_reply() {
        let json = serde_json::json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "function_call": {"name": "send_image_to_api", "arguments": "{\"image_path\": \"a.jpg\"}"}
            }}]
        });

        match parse_reply(&json).unwrap() {
            ChatReply::FunctionCall(call) => {
                assert_eq!(call.name, "send_image_to_api");
                assert!(call.arguments.contains("a.jpg"));
            }
            other => panic!("expected function call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_reply_without_choices() {
        let err = parse_reply(&serde_json::json!({"error": "x"})).unwrap_err();
        assert!(matches!(err, CrewError::ValidationError { .. }));
    }

    #[test]
    fn test_empty_config_list_rejected() {
        let result = OpenAiChat::new(vec![], Duration::from_secs(5));
        assert!(matches!(result, Err(CrewError::ConfigError { .. })));
    }

    #[tokio::test]
    async fn test_complete_sends_model_and_functions() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("Authorization", "Bearer sk-test")
                .json_body_partial(r#"{"model": "gpt-4", "temperature": 0.0}"#)
                .body_contains("send_image_to_api");
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Plan approved."}}]
            }));
        });

        let backend =
            OpenAiChat::new(vec![model("gpt-4", server.url("/v1"))], Duration::from_secs(5))
                .unwrap();

        let mut req = request();
        req.functions.push(FunctionSpec {
            name: "send_image_to_api".to_string(),
            description: "Gets image path and sends it to the API.".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        });

        let reply = backend.complete(&req).await.unwrap();

        api_mock.assert();
        assert_eq!(reply, ChatReply::Text("Plan approved.".to_string()));
    }

    #[tokio::test]
    async fn test_falls_back_to_next_model() {
        let server = MockServer::start();
        let failing = server.mock(|when, then| {
            when.method(POST)
                .path("/broken/chat/completions");
            then.status(500).body("internal error");
        });
        let working = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .json_body_partial(r#"{"model": "gpt-4-32k"}"#);
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"content": "from fallback"}}]
            }));
        });

        let backend = OpenAiChat::new(
            vec![
                model("gpt-4", server.url("/broken")),
                model("gpt-4-32k", server.url("/v1")),
            ],
            Duration::from_secs(5),
        )
        .unwrap();

        let reply = backend.complete(&request()).await.unwrap();

        failing.assert();
        working.assert();
        assert_eq!(reply.text(), "from fallback");
    }

    #[tokio::test]
    async fn test_all_models_failing_returns_last_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(401).body("bad key");
        });

        let backend =
            OpenAiChat::new(vec![model("gpt-4", server.url("/v1"))], Duration::from_secs(5))
                .unwrap();

        let err = backend.complete(&request()).await.unwrap_err();
        assert!(matches!(err, CrewError::ApiError { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_seeded_cache_skips_second_request() {
        let server = MockServer::start();
        let temp_dir = TempDir::new().unwrap();
        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"content": "only once"}}]
            }));
        });

        let backend =
            OpenAiChat::new(vec![model("gpt-4", server.url("/v1"))], Duration::from_secs(5))
                .unwrap()
                .with_cache(temp_dir.path(), "openai_spend_tracker");

        let first = backend.complete(&request()).await.unwrap();
        let second = backend.complete(&request()).await.unwrap();

        api_mock.assert_hits(1);
        assert_eq!(first, second);
        assert!(temp_dir.path().join("openai_spend_tracker").is_dir());
    }

    #[tokio::test]
    async fn test_blank_seed_sends_every_request() {
        let server = MockServer::start();
        let temp_dir = TempDir::new().unwrap();
        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"content": "not cached"}}]
            }));
        });

        let llm = LlmConfig {
            seed: Some("  ".to_string()),
            cache_dir: temp_dir.path().to_string_lossy().into_owned(),
            request_timeout_seconds: 5,
            ..LlmConfig::default()
        };
        let backend =
            OpenAiChat::from_config(vec![model("gpt-4", server.url("/v1"))], &llm).unwrap();

        backend.complete(&request()).await.unwrap();
        backend.complete(&request()).await.unwrap();

        api_mock.assert_hits(2);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_seed_from_config_enables_cache() {
        let server = MockServer::start();
        let temp_dir = TempDir::new().unwrap();
        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"content": "cached"}}]
            }));
        });

        let llm = LlmConfig {
            seed: Some("run-42".to_string()),
            cache_dir: temp_dir.path().to_string_lossy().into_owned(),
            ..LlmConfig::default()
        };
        let backend =
            OpenAiChat::from_config(vec![model("gpt-4", server.url("/v1"))], &llm).unwrap();

        backend.complete(&request()).await.unwrap();
        backend.complete(&request()).await.unwrap();

        api_mock.assert_hits(1);
        assert!(temp_dir.path().join("run-42").is_dir());
    }
}
