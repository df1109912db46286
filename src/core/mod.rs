pub mod agent;
pub mod cache;
pub mod code_exec;
pub mod crew;
pub mod functions;
pub mod group_chat;
pub mod image;
pub mod llm;
pub mod vision;

pub use crate::domain::model::{AgentReply, ChatMessage, ChatReply, ChatRequest};
pub use crate::domain::ports::{Agent, ChatBackend, HumanInput, Storage};
pub use crate::utils::error::Result;
