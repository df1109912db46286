use crate::config::config_list::{DEFAULT_CONFIG_LIST, GPT4_MODELS};
use crate::utils::error::{CrewError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

pub const DEFAULT_SEED_MESSAGE: &str = "i would like to create a switft app that runs on osx that shows a timer that has a start and stop time";

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// crew.toml 的完整內容，所有區段都可省略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrewConfig {
    pub llm: LlmConfig,
    pub chat: ChatConfig,
    pub vision: VisionConfig,
    pub agents: HashMap<String, AgentOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub config_list: String,
    pub models: Vec<String>,
    pub temperature: f32,
    pub seed: Option<String>,
    pub cache_dir: String,
    pub request_timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            config_list: DEFAULT_CONFIG_LIST.to_string(),
            models: GPT4_MODELS.iter().map(|m| m.to_string()).collect(),
            temperature: 0.0,
            seed: Some("openai_spend_tracker".to_string()),
            cache_dir: ".cache".to_string(),
            request_timeout_seconds: 120,
        }
    }
}

impl LlmConfig {
    /// 空白的 seed 等同未設定，不啟用快取
    pub fn cache_seed(&self) -> Option<&str> {
        self.seed
            .as_deref()
            .map(str::trim)
            .filter(|seed| !seed.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub max_round: usize,
    pub work_dir: String,
    pub last_n_messages: usize,
    pub execution_timeout_seconds: u64,
    pub message: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_round: 50,
            work_dir: "feedback".to_string(),
            last_n_messages: 3,
            execution_timeout_seconds: 60,
            message: DEFAULT_SEED_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub max_image_bytes: u64,
    pub request_timeout_seconds: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4-vision-preview".to_string(),
            max_tokens: 1000,
            max_image_bytes: 20 * 1024 * 1024,
            request_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOverride {
    pub system_message: Option<String>,
}

impl CrewConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| CrewError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OPENAI_BASE_URL})，找不到的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn system_message_override(&self, agent: &str) -> Option<&str> {
        self.agents
            .get(agent)
            .and_then(|a| a.system_message.as_deref())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_range("llm.temperature", self.llm.temperature, 0.0, 2.0)?;
        validation::validate_positive_number(
            "llm.request_timeout_seconds",
            self.llm.request_timeout_seconds as usize,
            1,
        )?;
        validation::validate_path("llm.cache_dir", &self.llm.cache_dir)?;

        validation::validate_positive_number("chat.max_round", self.chat.max_round, 1)?;
        validation::validate_positive_number("chat.last_n_messages", self.chat.last_n_messages, 1)?;
        validation::validate_path("chat.work_dir", &self.chat.work_dir)?;
        validation::validate_non_empty_string("chat.message", &self.chat.message)?;

        validation::validate_url("vision.endpoint", &self.vision.endpoint)?;
        validation::validate_non_empty_string("vision.model", &self.vision.model)?;
        validation::validate_positive_number("vision.max_tokens", self.vision.max_tokens as usize, 1)?;
        validation::validate_positive_number(
            "vision.max_image_bytes",
            self.vision.max_image_bytes as usize,
            1,
        )?;

        Ok(())
    }
}

impl Validate for CrewConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
