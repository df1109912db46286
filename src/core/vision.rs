use crate::config::crew_config::VisionConfig;
use crate::core::image::{encode_image_with_limit, image_data_url};
use crate::domain::model::{ContentPart, ImageUrl, Role, VisionMessage, VisionPayload};
use crate::utils::error::{CrewError, Result};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

impl VisionPayload {
    /// 單一 user 訊息，內容為 base64 data URL 圖片，可附加一段文字說明
    pub fn for_image(
        model: &str,
        base64_image: &str,
        max_tokens: u32,
        prompt: Option<&str>,
    ) -> Self {
        let mut content = vec![ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image_data_url(base64_image),
            },
        }];
        if let Some(text) = prompt {
            content.push(ContentPart::Text {
                text: text.to_string(),
            });
        }

        Self {
            model: model.to_string(),
            messages: vec![VisionMessage {
                role: Role::User,
                content,
            }],
            max_tokens,
        }
    }
}

pub struct VisionClient {
    client: Client,
    config: VisionConfig,
    api_key: String,
}

impl VisionClient {
    pub fn new(config: VisionConfig, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(CrewError::MissingConfigError {
                field: crate::config::config_list::API_KEY_ENV.to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn build_payload(&self, image_path: &Path, prompt: Option<&str>) -> Result<VisionPayload> {
        let base64_image = encode_image_with_limit(image_path, self.config.max_image_bytes)?;
        Ok(VisionPayload::for_image(
            &self.config.model,
            &base64_image,
            self.config.max_tokens,
            prompt,
        ))
    }

    pub async fn send_image(&self, image_path: &Path, prompt: Option<&str>) -> Result<serde_json::Value> {
        let payload = self.build_payload(image_path, prompt)?;

        tracing::info!(
            "🖼️  Sending {} to {} (model: {})",
            image_path.display(),
            self.config.endpoint,
            self.config.model
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Vision API response status: {}", status);

        let body = response.text().await?;
        if !status.is_success() {
            return Err(CrewError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = serde_json::from_str(&body)?;
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::image::encode_bytes;
    use httpmock::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn image_file(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    fn test_config(endpoint: String) -> VisionConfig {
        VisionConfig {
            endpoint,
            ..VisionConfig::default()
        }
    }

    #[test]
    fn test_payload_has_single_image_message() {
        let payload = VisionPayload::for_image("gpt-4-vision-preview", "QUJD", 1000, None);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["model"], "gpt-4-vision-preview");
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");

        let content = json["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "image_url");
        assert_eq!(content[0]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn test_payload_with_prompt_stays_one_message() {
        let payload =
            VisionPayload::for_image("gpt-4-vision-preview", "QUJD", 300, Some("What is this?"));
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        let content = json["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "image_url");
        assert_eq!(content[1]["type"], "text");
        assert_eq!(content[1]["text"], "What is this?");
    }

    #[test]
    fn test_build_payload_embeds_encoded_file() {
        let file = image_file(b"fake jpeg bytes");
        let client =
            VisionClient::new(VisionConfig::default(), "sk-test".to_string()).unwrap();

        let payload = client.build_payload(file.path(), None).unwrap();

        let ContentPart::ImageUrl { image_url } = &payload.messages[0].content[0] else {
            panic!("first part must be an image");
        };
        assert_eq!(
            image_url.url,
            format!("data:image/jpeg;base64,{}", encode_bytes(b"fake jpeg bytes"))
        );
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let result = VisionClient::new(VisionConfig::default(), "  ".to_string());
        assert!(matches!(result, Err(CrewError::MissingConfigError { .. })));
    }

    #[tokio::test]
    async fn test_send_image_posts_payload() {
        let server = MockServer::start();
        let file = image_file(b"\xFF\xD8\xFF");
        let expected_url = format!("data:image/jpeg;base64,{}", encode_bytes(b"\xFF\xD8\xFF"));

        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("Authorization", "Bearer sk-test")
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "model": "gpt-4-vision-preview",
                    "max_tokens": 1000,
                    "messages": [{
                        "role": "user",
                        "content": [{"type": "image_url", "image_url": {"url": expected_url}}]
                    }]
                }));
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "A cat."}}]
                }));
        });

        let client = VisionClient::new(
            test_config(server.url("/v1/chat/completions")),
            "sk-test".to_string(),
        )
        .unwrap();

        let response = client.send_image(file.path(), None).await.unwrap();

        api_mock.assert();
        assert_eq!(response["choices"][0]["message"]["content"], "A cat.");
    }

    #[tokio::test]
    async fn test_error_status_is_api_error() {
        let server = MockServer::start();
        let file = image_file(b"img");

        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(401)
                .json_body(serde_json::json!({"error": {"message": "Incorrect API key"}}));
        });

        let client = VisionClient::new(
            test_config(server.url("/v1/chat/completions")),
            "sk-bad".to_string(),
        )
        .unwrap();

        let err = client.send_image(file.path(), None).await.unwrap_err();

        api_mock.assert();
        match err {
            CrewError::ApiError { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Incorrect API key"));
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_serialization_error() {
        let server = MockServer::start();
        let file = image_file(b"img");

        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).body("<html>gateway</html>");
        });

        let client = VisionClient::new(
            test_config(server.url("/v1/chat/completions")),
            "sk-test".to_string(),
        )
        .unwrap();

        let err = client.send_image(file.path(), None).await.unwrap_err();
        assert!(matches!(err, CrewError::SerializationError(_)));
    }

    #[tokio::test]
    async fn test_missing_image_never_hits_network() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200);
        });

        let client = VisionClient::new(
            test_config(server.url("/v1/chat/completions")),
            "sk-test".to_string(),
        )
        .unwrap();

        let err = client
            .send_image(Path::new("/no/such/image.jpg"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, CrewError::IoError(_)));
        api_mock.assert_hits(0);
    }
}
