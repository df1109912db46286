use crate::utils::error::{CrewError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_LIST: &str = "OAI_CONFIG_LIST";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const GPT4_MODELS: [&str; 6] = [
    "gpt-4",
    "gpt-4-0314",
    "gpt4",
    "gpt-4-32k",
    "gpt-4-32k-0314",
    "gpt-4-32k-v0314",
];

/// OAI_CONFIG_LIST 中的一個模型設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, alias = "api_base", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_type: Option<String>,
}

impl ModelConfig {
    /// 只支援 OpenAI 相容的 chat completions 介面 (未填 api_type 視為 openai)
    pub fn is_openai_compatible(&self) -> bool {
        match self.api_type.as_deref() {
            None => true,
            Some(api_type) => matches!(api_type.trim(), "" | "openai" | "open_ai"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    models: Vec<String>,
}

impl ModelFilter {
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: models.into_iter().map(Into::into).collect(),
        }
    }

    pub fn gpt4() -> Self {
        Self::new(GPT4_MODELS)
    }

    /// 空的過濾條件代表全部保留
    pub fn matches(&self, config: &ModelConfig) -> bool {
        self.models.is_empty() || self.models.iter().any(|m| m == &config.model)
    }
}

/// 解析 JSON 陣列並套用過濾條件，略過非 OpenAI 相容的項目
pub fn parse_config_list(json: &str, filter: &ModelFilter) -> Result<Vec<ModelConfig>> {
    let configs: Vec<ModelConfig> = serde_json::from_str(json)?;
    Ok(configs
        .into_iter()
        .filter(|c| filter.matches(c))
        .filter(|c| {
            let supported = c.is_openai_compatible();
            if !supported {
                tracing::warn!(
                    "⚠️  Skipping model {}: api_type '{}' is not supported",
                    c.model,
                    c.api_type.as_deref().unwrap_or_default()
                );
            }
            supported
        })
        .collect())
}

/// 先找同名環境變數，找不到才讀檔案
pub fn config_list_from_json(
    env_or_file: &str,
    file_location: Option<&Path>,
    filter: &ModelFilter,
) -> Result<Vec<ModelConfig>> {
    if let Ok(json) = std::env::var(env_or_file) {
        tracing::debug!("Loading config list from environment variable {}", env_or_file);
        return parse_config_list(&json, filter);
    }

    let path = match file_location {
        Some(dir) => dir.join(env_or_file),
        None => PathBuf::from(env_or_file),
    };
    tracing::debug!("Loading config list from {}", path.display());

    let content = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CrewError::MissingConfigError {
                field: format!("{} (no such env var or file {})", env_or_file, path.display()),
            }
        } else {
            CrewError::IoError(e)
        }
    })?;

    parse_config_list(&content, filter)
}

/// 沒有 api_key 的項目沿用 OPENAI_API_KEY
pub fn with_default_api_key(configs: Vec<ModelConfig>, api_key: Option<&str>) -> Vec<ModelConfig> {
    configs
        .into_iter()
        .map(|mut config| {
            if config.api_key.is_none() {
                config.api_key = api_key.map(str::to_string);
            }
            config
        })
        .collect()
}

/// 記錄日誌用，隱藏金鑰
pub fn redacted(configs: &[ModelConfig]) -> Vec<ModelConfig> {
    configs
        .iter()
        .cloned()
        .map(|mut config| {
            config.api_key = config.api_key.map(|key| mask_key(&key));
            config
        })
        .collect()
}

fn mask_key(key: &str) -> String {
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    if key.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("****{}", tail)
    }
}
