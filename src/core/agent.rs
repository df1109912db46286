use crate::core::code_exec::{extract_code, CodeExecutor, ExecutionOutcome};
use crate::core::functions::FunctionRegistry;
use crate::core::{Agent, ChatBackend, HumanInput, Storage};
use crate::domain::model::{
    AgentReply, ChatMessage, ChatReply, ChatRequest, FunctionSpec, Role, WireMessage,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;

pub const HUMAN_INPUT_PROMPT: &str = "Provide feedback to chat_manager. Press enter to skip and use auto-reply, or type 'exit' to end the conversation: ";

/// 把群組對話歷史轉成某個 agent 視角的 chat completions 訊息
pub fn to_wire_messages(
    agent_name: &str,
    system_message: &str,
    history: &[ChatMessage],
) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(WireMessage::system(system_message));

    for message in history {
        if message.name == agent_name {
            messages.push(WireMessage {
                role: Role::Assistant,
                content: if message.function_call.is_some() && message.content.is_empty() {
                    None
                } else {
                    Some(message.content.clone())
                },
                name: None,
                function_call: message.function_call.clone(),
            });
        } else {
            let mut content = message.content.clone();
            if let Some(call) = &message.function_call {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(&format!(
                    "Suggested function call: {}({})",
                    call.name, call.arguments
                ));
            }
            messages.push(WireMessage {
                role: Role::User,
                content: Some(content),
                name: Some(message.name.clone()),
                function_call: None,
            });
        }
    }

    messages
}

/// 由模型產生回覆的 agent（Engineer、Planner、Critic）
pub struct AssistantAgent {
    name: String,
    system_message: String,
    backend: Arc<dyn ChatBackend>,
    temperature: f32,
    functions: Vec<FunctionSpec>,
}

impl AssistantAgent {
    pub fn new(
        name: impl Into<String>,
        system_message: impl Into<String>,
        backend: Arc<dyn ChatBackend>,
        temperature: f32,
        functions: Vec<FunctionSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            system_message: system_message.into(),
            backend,
            temperature,
            functions,
        }
    }
}

#[async_trait]
impl Agent for AssistantAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn system_message(&self) -> &str {
        &self.system_message
    }

    async fn generate_reply(&self, history: &[ChatMessage]) -> Result<AgentReply> {
        let request = ChatRequest {
            messages: to_wire_messages(&self.name, &self.system_message, history),
            temperature: self.temperature,
            functions: self.functions.clone(),
        };

        let message = match self.backend.complete(&request).await? {
            ChatReply::Text(text) => ChatMessage::new(&self.name, text),
            ChatReply::FunctionCall(call) => {
                tracing::info!("🔧 {} suggests calling {}", self.name, call.name);
                ChatMessage {
                    name: self.name.clone(),
                    content: String::new(),
                    function_call: Some(call),
                }
            }
        };

        Ok(AgentReply::Speak(message))
    }
}

/// 人類管理者，不執行程式碼
pub struct UserProxyAgent {
    name: String,
    system_message: String,
    input: Arc<dyn HumanInput>,
}

impl UserProxyAgent {
    pub fn new(
        name: impl Into<String>,
        system_message: impl Into<String>,
        input: Arc<dyn HumanInput>,
    ) -> Self {
        Self {
            name: name.into(),
            system_message: system_message.into(),
            input,
        }
    }
}

#[async_trait]
impl Agent for UserProxyAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn system_message(&self) -> &str {
        &self.system_message
    }

    async fn generate_reply(&self, _history: &[ChatMessage]) -> Result<AgentReply> {
        let answer = self.input.prompt(HUMAN_INPUT_PROMPT).await?;
        let answer = answer.trim();

        Ok(match answer {
            "exit" => AgentReply::Exit,
            "" => AgentReply::Pass,
            text => AgentReply::Speak(ChatMessage::new(&self.name, text)),
        })
    }
}

/// 執行最近訊息中的程式碼或 function call，並回報結果
pub struct ExecutorAgent<S: Storage> {
    name: String,
    system_message: String,
    executor: CodeExecutor<S>,
    functions: FunctionRegistry,
    last_n_messages: usize,
}

impl<S: Storage> ExecutorAgent<S> {
    pub fn new(
        name: impl Into<String>,
        system_message: impl Into<String>,
        executor: CodeExecutor<S>,
        functions: FunctionRegistry,
        last_n_messages: usize,
    ) -> Self {
        Self {
            name: name.into(),
            system_message: system_message.into(),
            executor,
            functions,
            last_n_messages,
        }
    }

    async fn run_code(&self, history: &[ChatMessage]) -> Option<String> {
        let blocks = history
            .iter()
            .rev()
            .take(self.last_n_messages)
            .map(|m| extract_code(&m.content))
            .find(|blocks| !blocks.is_empty())?;

        tracing::info!("⚙️  {} executing {} code block(s)", self.name, blocks.len());

        let outcome = match self.executor.execute_blocks(&blocks).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("❌ Code execution failed: {}", e);
                ExecutionOutcome {
                    exit_code: 1,
                    output: e.to_string(),
                }
            }
        };
        Some(outcome.to_reply())
    }
}

#[async_trait]
impl<S: Storage> Agent for ExecutorAgent<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn system_message(&self) -> &str {
        &self.system_message
    }

    async fn generate_reply(&self, history: &[ChatMessage]) -> Result<AgentReply> {
        if let Some(call) = history.last().and_then(|m| m.function_call.as_ref()) {
            tracing::info!("🔧 {} calling function {}", self.name, call.name);
            let content = match self.functions.execute(call).await {
                Ok(result) => format!(
                    "Response from calling function \"{}\":\n{}",
                    call.name,
                    serde_json::to_string_pretty(&result)?
                ),
                Err(e) => format!("Error calling function \"{}\": {}", call.name, e),
            };
            return Ok(AgentReply::Speak(ChatMessage::new(&self.name, content)));
        }

        let content = match self.run_code(history).await {
            Some(reply) => reply,
            None => format!(
                "No code blocks found in the last {} messages.",
                self.last_n_messages
            ),
        };
        Ok(AgentReply::Speak(ChatMessage::new(&self.name, content)))
    }
}

/// 從終端機讀取 Admin 的輸入
pub struct StdinInput {
    reader: Mutex<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            reader: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HumanInput for StdinInput {
    async fn prompt(&self, prompt: &str) -> Result<String> {
        eprint!("{}", prompt);

        let mut line = String::new();
        let read = self.reader.lock().await.read_line(&mut line).await?;
        if read == 0 {
            // stdin 已關閉，視同輸入 exit
            return Ok("exit".to_string());
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
