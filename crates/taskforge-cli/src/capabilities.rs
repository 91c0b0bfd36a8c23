//! The concrete [`CapabilitySet`] the CLI and `serve` wire into every
//! session: file operations delegate to a [`DocumentStore`], `bash`
//! and `executeCode` run through a real shell, and the external-network
//! tools (`fetch`, `webSearch`, `newsSearch`) are left unconfigured --
//! spec.md lists vendor integrations for those as out of scope.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use taskforge_core::capability::{
    BashInput, CapabilitySet, EditFileInput, ExecuteCodeInput, FetchInput, ReadFileInput,
    SearchInput, ToolError, ToolOutcome, WriteFileInput,
};
use taskforge_core::document_store::DocumentStore;

pub struct LocalCapabilities {
    store: Arc<dyn DocumentStore>,
}

impl LocalCapabilities {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn unsupported(tool: &str) -> ToolError {
        ToolError {
            code: "unsupported".to_string(),
            message: format!("{tool} has no backend configured in this deployment"),
        }
    }

    fn io_error(err: impl std::fmt::Display) -> ToolError {
        ToolError {
            code: "io_error".to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl CapabilitySet for LocalCapabilities {
    async fn bash(&self, input: BashInput) -> ToolOutcome {
        let output = tokio::time::timeout(
            Duration::from_secs(60),
            tokio::process::Command::new("sh")
                .arg("-c")
                .arg(&input.command)
                .output(),
        )
        .await
        .map_err(|_| ToolError {
            code: "timeout".to_string(),
            message: "command timed out after 60s".to_string(),
        })?
        .map_err(Self::io_error)?;

        Ok(json!({
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
            "exitCode": output.status.code().unwrap_or(-1),
        }))
    }

    async fn read_file(&self, input: ReadFileInput) -> ToolOutcome {
        match self.store.read(&input.path).await {
            Some(content) => Ok(json!({ "content": content, "path": input.path })),
            None => Err(ToolError {
                code: "not_found".to_string(),
                message: format!("{} does not exist", input.path),
            }),
        }
    }

    async fn write_file(&self, input: WriteFileInput) -> ToolOutcome {
        let version = self.store.write(&input.path, input.content).await;
        Ok(json!({ "success": true, "path": input.path, "version": version }))
    }

    async fn edit_file(&self, input: EditFileInput) -> ToolOutcome {
        let Some(current) = self.store.read(&input.path).await else {
            return Err(ToolError {
                code: "not_found".to_string(),
                message: format!("{} does not exist", input.path),
            });
        };
        if !current.contains(&input.search) {
            return Err(ToolError {
                code: "no_match".to_string(),
                message: "search text not found in file".to_string(),
            });
        }
        let updated = current.replacen(&input.search, &input.replace, 1);
        let version = self.store.write(&input.path, updated).await;
        Ok(json!({ "success": true, "path": input.path, "version": version }))
    }

    async fn list_files(&self) -> ToolOutcome {
        let files = self.store.list().await;
        Ok(json!({ "files": files }))
    }

    async fn fetch(&self, _input: FetchInput) -> ToolOutcome {
        Err(Self::unsupported("fetch"))
    }

    async fn web_search(&self, _input: SearchInput) -> ToolOutcome {
        Err(Self::unsupported("webSearch"))
    }

    async fn news_search(&self, _input: SearchInput) -> ToolOutcome {
        Err(Self::unsupported("newsSearch"))
    }

    async fn execute_code(&self, input: ExecuteCodeInput) -> ToolOutcome {
        let timeout_ms = input.clamped_timeout_ms();
        let output = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            tokio::process::Command::new("node")
                .arg("-e")
                .arg(&input.code)
                .output(),
        )
        .await
        .map_err(|_| ToolError {
            code: "timeout".to_string(),
            message: format!("execution exceeded {timeout_ms}ms"),
        })?
        .map_err(Self::io_error)?;

        if output.status.success() {
            Ok(json!({ "stdout": String::from_utf8_lossy(&output.stdout) }))
        } else {
            Err(ToolError {
                code: "runtime".to_string(),
                message: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}
