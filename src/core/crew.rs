use crate::config::cli::LocalStorage;
use crate::config::crew_config::CrewConfig;
use crate::core::agent::{AssistantAgent, ExecutorAgent, UserProxyAgent};
use crate::core::code_exec::CodeExecutor;
use crate::core::functions::FunctionRegistry;
use crate::core::group_chat::GroupChat;
use crate::core::{Agent, ChatBackend, HumanInput};
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;

pub const ADMIN: &str = "Admin";
pub const ENGINEER: &str = "Engineer";
pub const PLANNER: &str = "Planner";
pub const EXECUTOR: &str = "Executor";
pub const CRITIC: &str = "Critic";

pub const ADMIN_PROMPT: &str = "A human admin. Interact with the planner to discuss the plan. Plan execution needs to be approved by this admin.";

pub const ENGINEER_PROMPT: &str = "Engineer. You follow an approved plan. You write python/shell code to solve tasks. Wrap the code in a code block that specifies the script type. The user can't modify your code. So do not suggest incomplete code which requires others to modify. Don't use a code block if it's not intended to be executed by the executor. Don't include multiple code blocks in one response. Do not ask others to copy and paste the result. Check the execution result returned by the executor. If the result indicates there is an error, fix the error and output the code again. Suggest the full code instead of partial code or code changes. If the error can't be fixed or if the task is not solved even after the code is executed successfully, analyze the problem, revisit your assumption, collect additional info you need, and think of a different approach to try.";

pub const PLANNER_PROMPT: &str = "Planner. Suggest a plan. Revise the plan based on feedback from admin and critic, until admin approval. The plan may involve an engineer who can write code and an executor and critic who doesn't write code. Explain the plan first. Be clear which step is performed by an engineer, executor, and critic.";

pub const EXECUTOR_PROMPT: &str = "Executor. Execute the code written by the engineer and report the result.";

pub const CRITIC_PROMPT: &str = "Critic. Double check plan, claims, code from other agents and provide feedback.";

/// 依照 crew.toml 組出 Admin、Engineer、Planner、Executor、Critic 五人群組
pub fn assemble(
    config: &CrewConfig,
    backend: Arc<dyn ChatBackend>,
    input: Arc<dyn HumanInput>,
    functions: FunctionRegistry,
) -> Result<GroupChat> {
    let prompt = |name: &str, default: &str| {
        config
            .system_message_override(name)
            .unwrap_or(default)
            .to_string()
    };
    let function_specs = functions.specs();
    let temperature = config.llm.temperature;

    let assistant = |name: &str, default: &str| -> Arc<dyn Agent> {
        Arc::new(AssistantAgent::new(
            name,
            prompt(name, default),
            backend.clone(),
            temperature,
            function_specs.clone(),
        ))
    };

    let admin: Arc<dyn Agent> = Arc::new(UserProxyAgent::new(ADMIN, prompt(ADMIN, ADMIN_PROMPT), input));

    let work_dir = &config.chat.work_dir;
    let executor: Arc<dyn Agent> = Arc::new(ExecutorAgent::new(
        EXECUTOR,
        prompt(EXECUTOR, EXECUTOR_PROMPT),
        CodeExecutor::new(
            LocalStorage::new(work_dir),
            work_dir,
            Duration::from_secs(config.chat.execution_timeout_seconds),
        ),
        functions,
        config.chat.last_n_messages,
    ));

    let agents = vec![
        admin,
        assistant(ENGINEER, ENGINEER_PROMPT),
        assistant(PLANNER, PLANNER_PROMPT),
        executor,
        assistant(CRITIC, CRITIC_PROMPT),
    ];

    GroupChat::new(agents, config.chat.max_round)
}
