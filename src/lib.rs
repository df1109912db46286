pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::cli::LocalStorage;
pub use config::crew_config::CrewConfig;
pub use core::group_chat::{ChatTranscript, GroupChat, GroupChatManager};
pub use core::llm::OpenAiChat;
pub use core::vision::VisionClient;
pub use utils::error::{CrewError, Result};
