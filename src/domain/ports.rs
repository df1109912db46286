use crate::domain::model::{AgentReply, ChatMessage, ChatReply, ChatRequest};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatReply>;
}

/// 人類輸入來源（終端機或測試腳本）
#[async_trait]
pub trait HumanInput: Send + Sync {
    async fn prompt(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    fn system_message(&self) -> &str;
    async fn generate_reply(&self, history: &[ChatMessage]) -> Result<AgentReply>;
}
