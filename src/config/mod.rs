pub mod cli;
pub mod config_list;
pub mod crew_config;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "vision-crew")]
#[command(about = "Describe images with a vision model and run a planner/engineer/critic crew")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a crew.toml file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Environment variable or file holding the model config list [default: OAI_CONFIG_LIST]
    #[arg(long, global = true)]
    pub config_list: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[arg(long, global = true, help = "Log process CPU/memory after every round")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Send an image to the vision endpoint and print the JSON reply
    Describe {
        image: String,

        /// Optional text instruction sent alongside the image
        #[arg(long)]
        prompt: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Run the group chat
    Chat {
        /// Seed message posted by the Admin
        #[arg(short, long)]
        message: Option<String>,

        #[arg(long)]
        max_round: Option<usize>,

        #[arg(long)]
        work_dir: Option<String>,

        /// Write the transcript as JSON to this path
        #[arg(long)]
        transcript: Option<String>,
    },

    /// Print the filtered model config list (keys redacted)
    Config,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 命令列參數覆蓋 crew.toml 的設定
    pub fn apply_overrides(&self, crew: &mut crew_config::CrewConfig) {
        if let Some(config_list) = &self.config_list {
            crew.llm.config_list = config_list.clone();
        }

        match &self.command {
            Command::Describe {
                model, max_tokens, ..
            } => {
                if let Some(model) = model {
                    crew.vision.model = model.clone();
                }
                if let Some(max_tokens) = max_tokens {
                    crew.vision.max_tokens = *max_tokens;
                }
            }
            Command::Chat {
                message,
                max_round,
                work_dir,
                ..
            } => {
                if let Some(message) = message {
                    crew.chat.message = message.clone();
                }
                if let Some(max_round) = max_round {
                    crew.chat.max_round = *max_round;
                }
                if let Some(work_dir) = work_dir {
                    crew.chat.work_dir = work_dir.clone();
                }
            }
            Command::Config => {}
        }
    }
}
