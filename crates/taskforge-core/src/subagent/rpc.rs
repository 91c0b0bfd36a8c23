//! The scoped RPC surface a subagent worker uses to reach parent
//! resources (spec §4.7.4). This is the *only* surface a worker sees:
//! no task graph, no chat history, no action log.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::capability::{
    BashInput, CapabilitySet, EditFileInput, FetchInput, ReadFileInput, SearchInput,
    WriteFileInput,
};
use crate::document_store::DocumentStore;

#[derive(Debug, Clone)]
pub struct ShellExecInput {
    pub command: String,
    pub cwd: Option<String>,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// The child->parent surface mandated by spec §4.7.4. Every call is
/// scoped to this session's document store and capability set; a
/// worker never touches the graph, chat history, or action log
/// directly.
#[async_trait]
pub trait ParentRpc: Send + Sync {
    async fn read_file(&self, path: &str) -> Option<String>;
    async fn write_file(&self, path: &str, content: String) -> u64;
    async fn delete_file(&self, path: &str) -> bool;
    async fn list_files(&self) -> Vec<String>;
    async fn shell_exec(&self, input: ShellExecInput) -> Result<ShellExecOutput, String>;
    async fn fetch(&self, input: FetchInput) -> Result<Value, String>;
    async fn web_search(&self, query: &str) -> Result<Value, String>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn ParentRpc) {}
};

/// Default [`ParentRpc`] backed by the session's real document store
/// and capability set.
pub struct SessionScopedRpc {
    documents: Arc<dyn DocumentStore>,
    capabilities: Arc<dyn CapabilitySet>,
}

impl SessionScopedRpc {
    pub fn new(documents: Arc<dyn DocumentStore>, capabilities: Arc<dyn CapabilitySet>) -> Self {
        Self {
            documents,
            capabilities,
        }
    }
}

#[async_trait]
impl ParentRpc for SessionScopedRpc {
    async fn read_file(&self, path: &str) -> Option<String> {
        self.documents.read(path).await
    }

    async fn write_file(&self, path: &str, content: String) -> u64 {
        self.documents.write(path, content).await
    }

    async fn delete_file(&self, path: &str) -> bool {
        self.documents.delete(path).await
    }

    async fn list_files(&self) -> Vec<String> {
        self.documents.list().await
    }

    async fn shell_exec(&self, input: ShellExecInput) -> Result<ShellExecOutput, String> {
        let outcome = self
            .capabilities
            .bash(BashInput {
                command: input.command,
            })
            .await;
        match outcome {
            Ok(v) => Ok(ShellExecOutput {
                stdout: v.get("stdout").and_then(|s| s.as_str()).unwrap_or("").to_string(),
                stderr: v.get("stderr").and_then(|s| s.as_str()).unwrap_or("").to_string(),
                exit_code: v.get("exitCode").and_then(|s| s.as_i64()).unwrap_or(-1) as i32,
            }),
            Err(e) => Err(e.message),
        }
    }

    async fn fetch(&self, input: FetchInput) -> Result<Value, String> {
        self.capabilities.fetch(input).await.map_err(|e| e.message)
    }

    async fn web_search(&self, query: &str) -> Result<Value, String> {
        self.capabilities
            .web_search(SearchInput {
                query: query.to_string(),
                freshness: None,
                count: None,
            })
            .await
            .map_err(|e| e.message)
    }
}

// Kept for call sites that build a read/write/edit payload directly
// against the capability set rather than the document store (e.g. a
// worker editing a file that isn't tracked in the shared document
// store).
pub async fn passthrough_edit_file(
    capabilities: &dyn CapabilitySet,
    input: EditFileInput,
) -> Result<Value, String> {
    capabilities.edit_file(input).await.map_err(|e| e.message)
}

pub async fn passthrough_read_file(
    capabilities: &dyn CapabilitySet,
    input: ReadFileInput,
) -> Result<Value, String> {
    capabilities.read_file(input).await.map_err(|e| e.message)
}

pub async fn passthrough_write_file(
    capabilities: &dyn CapabilitySet,
    input: WriteFileInput,
) -> Result<Value, String> {
    capabilities.write_file(input).await.map_err(|e| e.message)
}
