use crate::core::agent::to_wire_messages;
use crate::core::{Agent, ChatBackend};
use crate::domain::model::{AgentReply, ChatMessage, ChatRequest, WireMessage};
use crate::utils::error::{CrewError, Result};
use crate::utils::monitor::SystemMonitor;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

const MANAGER_NAME: &str = "chat_manager";

pub struct GroupChat {
    agents: Vec<Arc<dyn Agent>>,
    max_round: usize,
}

impl GroupChat {
    pub fn new(agents: Vec<Arc<dyn Agent>>, max_round: usize) -> Result<Self> {
        if agents.is_empty() {
            return Err(CrewError::ConfigError {
                message: "group chat needs at least one agent".to_string(),
            });
        }
        if max_round == 0 {
            return Err(CrewError::InvalidConfigValueError {
                field: "chat.max_round".to_string(),
                value: "0".to_string(),
                reason: "Value must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for agent in &agents {
            if !seen.insert(agent.name().to_string()) {
                return Err(CrewError::ConfigError {
                    message: format!("duplicate agent name {}", agent.name()),
                });
            }
        }

        Ok(Self { agents, max_round })
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    pub fn max_round(&self) -> usize {
        self.max_round
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.agents.iter().position(|a| a.name() == name)
    }

    /// 輪流順序中的下一位
    pub fn next_agent(&self, current: &str) -> &Arc<dyn Agent> {
        let next = self
            .index_of(current)
            .map(|i| (i + 1) % self.agents.len())
            .unwrap_or(0);
        &self.agents[next]
    }

    pub fn select_speaker_system_message(&self) -> String {
        let roles = self
            .agents
            .iter()
            .map(|a| format!("{}: {}", a.name(), a.system_message()))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "You are in a role play game. The following roles are available:\n{}.\n\nRead the following conversation.\nThen select the next role from {:?} to play. Only return the role.",
            roles,
            self.agent_names()
        )
    }

    /// 從選擇器的回覆找出唯一被提到的 agent
    pub fn parse_speaker(&self, reply: &str) -> Option<usize> {
        let reply = reply.trim();
        if let Some(index) = self.index_of(reply) {
            return Some(index);
        }

        let mentioned: Vec<usize> = self
            .agents
            .iter()
            .enumerate()
            .filter(|(_, agent)| {
                let pattern = format!(r"(^|\W){}(\W|$)", regex::escape(agent.name()));
                Regex::new(&pattern)
                    .map(|re| re.is_match(reply))
                    .unwrap_or(false)
            })
            .map(|(i, _)| i)
            .collect();

        match mentioned.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    MaxRound,
    AdminExit,
    TerminateMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTranscript {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rounds: usize,
    pub termination: Termination,
    pub messages: Vec<ChatMessage>,
}

pub struct GroupChatManager {
    chat: GroupChat,
    selector: Arc<dyn ChatBackend>,
    temperature: f32,
    monitor: SystemMonitor,
}

impl GroupChatManager {
    pub fn new(chat: GroupChat, selector: Arc<dyn ChatBackend>) -> Self {
        Self {
            chat,
            selector,
            temperature: 0.0,
            monitor: SystemMonitor::default(),
        }
    }

    pub fn with_monitor(mut self, monitor: SystemMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// 選擇下一位發言者時使用的 temperature，預設 0.0
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn select_speaker(&self, last_speaker: &str, history: &[ChatMessage]) -> Arc<dyn Agent> {
        let mut messages = to_wire_messages(
            MANAGER_NAME,
            &self.chat.select_speaker_system_message(),
            history,
        );
        messages.push(WireMessage::user(format!(
            "Read the above conversation. Then select the next role from {:?} to play. Only return the role.",
            self.chat.agent_names()
        )));

        let request = ChatRequest {
            messages,
            temperature: self.temperature,
            functions: vec![],
        };

        match self.selector.complete(&request).await {
            Ok(reply) => {
                if let Some(index) = self.chat.parse_speaker(reply.text()) {
                    return self.chat.agents[index].clone();
                }
                tracing::debug!(
                    "Speaker selection reply '{}' is ambiguous, using round robin",
                    reply.text()
                );
            }
            Err(e) => {
                tracing::warn!("⚠️  Speaker selection failed, using round robin: {}", e);
            }
        }

        self.chat.next_agent(last_speaker).clone()
    }

    /// `initiator` 送出第一則訊息後開始輪流發言
    pub async fn run(&self, initiator: &str, message: &str) -> Result<ChatTranscript> {
        if self.chat.index_of(initiator).is_none() {
            return Err(CrewError::ConfigError {
                message: format!("initiator {} is not part of the group chat", initiator),
            });
        }

        let started_at = Utc::now();
        let mut messages = vec![ChatMessage::new(initiator, message)];
        let mut last_speaker = initiator.to_string();
        let mut rounds = 1;
        let mut termination = Termination::MaxRound;

        tracing::info!(
            "🚀 Group chat started by {} with {} agents (max_round: {})",
            initiator,
            self.chat.agents.len(),
            self.chat.max_round
        );

        if messages[0].is_termination() {
            termination = Termination::TerminateMessage;
        }

        while termination == Termination::MaxRound && rounds < self.chat.max_round {
            let speaker = self.select_speaker(&last_speaker, &messages).await;
            rounds += 1;
            tracing::info!("🗣️  Round {}: {}", rounds, speaker.name());

            match speaker.generate_reply(&messages).await? {
                AgentReply::Speak(reply) => {
                    tracing::debug!("{}: {}", reply.name, reply.content);
                    if reply.is_termination() {
                        termination = Termination::TerminateMessage;
                    }
                    messages.push(reply);
                }
                AgentReply::Pass => {
                    tracing::debug!("{} passed", speaker.name());
                }
                AgentReply::Exit => {
                    tracing::info!("👋 {} ended the conversation", speaker.name());
                    termination = Termination::AdminExit;
                }
            }

            last_speaker = speaker.name().to_string();
            self.monitor.log_round(rounds, &last_speaker);
        }

        tracing::info!(
            "✅ Group chat finished after {} rounds ({:?})",
            rounds,
            termination
        );
        self.monitor.log_final_stats();

        Ok(ChatTranscript {
            started_at,
            finished_at: Utc::now(),
            rounds,
            termination,
            messages,
        })
    }
}
