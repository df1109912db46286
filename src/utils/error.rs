use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrewError {
    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Code execution error: {message}")]
    ExecutionError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    FileSystem,
    Data,
    Configuration,
    Execution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CrewError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CrewError::HttpError(_) | CrewError::ApiError { .. } => ErrorCategory::Network,
            CrewError::IoError(_) => ErrorCategory::FileSystem,
            CrewError::SerializationError(_) | CrewError::ValidationError { .. } => {
                ErrorCategory::Data
            }
            CrewError::ConfigError { .. }
            | CrewError::MissingConfigError { .. }
            | CrewError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            CrewError::ExecutionError { .. } => ErrorCategory::Execution,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 網路問題通常可以重試
            CrewError::HttpError(_) => ErrorSeverity::Medium,
            CrewError::ApiError { status, .. } if *status == 429 || *status >= 500 => {
                ErrorSeverity::Medium
            }
            CrewError::ApiError { .. } => ErrorSeverity::High,
            CrewError::IoError(_) => ErrorSeverity::High,
            CrewError::SerializationError(_) => ErrorSeverity::High,
            CrewError::ValidationError { .. } => ErrorSeverity::High,
            CrewError::ExecutionError { .. } => ErrorSeverity::High,
            CrewError::ConfigError { .. }
            | CrewError::MissingConfigError { .. }
            | CrewError::InvalidConfigValueError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Medium
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CrewError::HttpError(e) if e.is_timeout() => {
                "The request to the model API timed out".to_string()
            }
            CrewError::HttpError(_) => "Could not reach the model API".to_string(),
            CrewError::ApiError { status: 401, .. } => {
                "The model API rejected the API key".to_string()
            }
            CrewError::ApiError { status, .. } => {
                format!("The model API answered with HTTP {}", status)
            }
            CrewError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
                format!("File not found: {}", e)
            }
            CrewError::IoError(e) => format!("File access failed: {}", e),
            CrewError::SerializationError(e) => format!("Unexpected JSON: {}", e),
            CrewError::ConfigError { message } => format!("Invalid configuration: {}", message),
            CrewError::MissingConfigError { field } => {
                format!("Required setting '{}' is not set", field)
            }
            CrewError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            CrewError::ValidationError { message } => message.clone(),
            CrewError::ExecutionError { message } => format!("Code execution failed: {}", message),
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self.category() {
            ErrorCategory::Network => match self {
                CrewError::ApiError { status: 401, .. } => {
                    "Check OPENAI_API_KEY or the api_key entries in OAI_CONFIG_LIST".to_string()
                }
                CrewError::ApiError { status: 429, .. } => {
                    "Rate limited, wait a moment and try again".to_string()
                }
                _ => "Check the network connection and the endpoint URL, then retry".to_string(),
            },
            ErrorCategory::FileSystem => "Check that the path exists and is readable".to_string(),
            ErrorCategory::Data => "Check the input file or the API response format".to_string(),
            ErrorCategory::Configuration => {
                "Review crew.toml, OAI_CONFIG_LIST and the environment variables".to_string()
            }
            ErrorCategory::Execution => {
                "Make sure python3 and sh are installed and the work dir is writable".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CrewError>;
