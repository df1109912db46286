use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use vision_crew::config::config_list::{self, ModelFilter, API_KEY_ENV};
use vision_crew::config::Command;
use vision_crew::core::agent::StdinInput;
use vision_crew::core::crew::{self, ADMIN};
use vision_crew::core::functions::{FunctionRegistry, SendImageToApi};
use vision_crew::utils::error::ErrorSeverity;
use vision_crew::utils::monitor::SystemMonitor;
use vision_crew::utils::{logger, validation::Validate};
use vision_crew::{
    CliConfig, CrewConfig, CrewError, GroupChatManager, OpenAiChat, Result, VisionClient,
};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting vision-crew");
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ vision-crew failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn load_crew_config(cli: &CliConfig) -> Result<CrewConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading crew configuration from: {}", path);
            CrewConfig::from_file(path)?
        }
        None => CrewConfig::default(),
    };

    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

fn load_models(config: &CrewConfig) -> Result<Vec<config_list::ModelConfig>> {
    let filter = ModelFilter::new(config.llm.models.iter().cloned());
    let models = config_list::config_list_from_json(&config.llm.config_list, None, &filter)?;
    let api_key = std::env::var(API_KEY_ENV).ok();
    let models = config_list::with_default_api_key(models, api_key.as_deref());

    tracing::info!(
        "🔧 Loaded {} model config(s): {}",
        models.len(),
        serde_json::to_string(&config_list::redacted(&models))?
    );
    Ok(models)
}

/// 優先使用 OPENAI_API_KEY，否則取 config list 中第一把金鑰
fn resolve_api_key(models: &[config_list::ModelConfig]) -> Result<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .or_else(|| models.iter().find_map(|m| m.api_key.clone()))
        .ok_or_else(|| CrewError::MissingConfigError {
            field: API_KEY_ENV.to_string(),
        })
}

async fn run(cli: &CliConfig) -> Result<()> {
    let config = load_crew_config(cli)?;

    match &cli.command {
        Command::Describe { image, prompt, .. } => {
            let api_key = match std::env::var(API_KEY_ENV) {
                Ok(key) => key,
                Err(_) => resolve_api_key(&load_models(&config)?)?,
            };
            let client = VisionClient::new(config.vision.clone(), api_key)?;
            let response = client.send_image(Path::new(image), prompt.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Config => {
            let models = load_models(&config)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&config_list::redacted(&models))?
            );
        }
        Command::Chat { transcript, .. } => {
            let models = load_models(&config)?;
            let api_key = resolve_api_key(&models)?;

            let backend = Arc::new(OpenAiChat::from_config(models, &config.llm)?);

            let vision = Arc::new(VisionClient::new(config.vision.clone(), api_key)?);
            let mut functions = FunctionRegistry::new();
            functions.register(Arc::new(SendImageToApi::new(vision)));

            let group_chat = crew::assemble(
                &config,
                backend.clone(),
                Arc::new(StdinInput::new()),
                functions,
            )?;

            let manager = GroupChatManager::new(group_chat, backend)
                .with_temperature(config.llm.temperature)
                .with_monitor(SystemMonitor::new(cli.monitor));
            let result = manager.run(ADMIN, &config.chat.message).await?;

            println!(
                "✅ Conversation finished after {} rounds ({:?})",
                result.rounds, result.termination
            );

            if let Some(path) = transcript {
                std::fs::write(path, serde_json::to_vec_pretty(&result)?)?;
                println!("📁 Transcript saved to: {}", path);
            }
        }
    }

    Ok(())
}
