use crate::core::Storage;
use crate::utils::error::{CrewError, Result};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::process::Command;

pub const TIMEOUT_EXIT_CODE: i32 = 124;

static CODE_BLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([\w+\-]*)[ \t]*\r?\n(.*?)\r?\n[ \t]*```").expect("valid code block pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub lang: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub exit_code: i32,
    pub output: String,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// 回覆給群組對話的文字
    pub fn to_reply(&self) -> String {
        let status = if self.succeeded() {
            "execution succeeded"
        } else {
            "execution failed"
        };
        format!(
            "exitcode: {} ({})\nCode output: {}",
            self.exit_code, status, self.output
        )
    }
}

/// 取出 markdown 圍欄程式碼區塊，沒標語言的視為 python
pub fn extract_code(text: &str) -> Vec<CodeBlock> {
    CODE_BLOCK_PATTERN
        .captures_iter(text)
        .map(|caps| {
            let lang = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            CodeBlock {
                lang: if lang.is_empty() {
                    "python".to_string()
                } else {
                    lang.to_lowercase()
                },
                code: caps[2].to_string(),
            }
        })
        .collect()
}

fn interpreter(lang: &str) -> Option<(&'static str, &'static str)> {
    match lang {
        "python" | "py" | "python3" => Some(("python3", "py")),
        "sh" | "bash" | "shell" => Some(("sh", "sh")),
        _ => None,
    }
}

pub struct CodeExecutor<S: Storage> {
    storage: S,
    work_dir: PathBuf,
    timeout: Duration,
}

impl<S: Storage> CodeExecutor<S> {
    /// `storage` 與 `work_dir` 必須指向同一個目錄
    pub fn new(storage: S, work_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            storage,
            work_dir: work_dir.into(),
            timeout,
        }
    }

    pub async fn execute_block(&self, block: &CodeBlock) -> Result<ExecutionOutcome> {
        let Some((program, ext)) = interpreter(&block.lang) else {
            return Ok(ExecutionOutcome {
                exit_code: 1,
                output: format!("unknown language {}", block.lang),
            });
        };

        let digest = format!("{:x}", Sha256::digest(block.code.as_bytes()));
        let filename = format!("tmp_code_{}.{}", &digest[..16], ext);
        self.storage
            .write_file(&filename, block.code.as_bytes())
            .await?;

        tracing::info!("▶️  Running {} in {}", filename, self.work_dir.display());

        let child = Command::new(program)
            .arg(&filename)
            .current_dir(&self.work_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CrewError::ExecutionError {
                message: format!("failed to spawn {}: {}", program, e),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!("{} timed out after {:?}", filename, self.timeout);
                return Ok(ExecutionOutcome {
                    exit_code: TIMEOUT_EXIT_CODE,
                    output: "Timeout".to_string(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);

        tracing::debug!("{} exited with {}", filename, exit_code);

        Ok(ExecutionOutcome {
            exit_code,
            output: format!("{}{}", stdout, stderr),
        })
    }

    /// 依序執行，遇到第一個失敗就停止
    pub async fn execute_blocks(&self, blocks: &[CodeBlock]) -> Result<ExecutionOutcome> {
        let mut output = String::new();

        for block in blocks {
            let outcome = self.execute_block(block).await?;
            output.push_str(&outcome.output);
            if !outcome.succeeded() {
                return Ok(ExecutionOutcome {
                    exit_code: outcome.exit_code,
                    output,
                });
            }
        }

        Ok(ExecutionOutcome {
            exit_code: 0,
            output,
        })
    }
}
