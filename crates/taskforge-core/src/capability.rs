//! The tool set the orchestrator drives the LLM with (spec §6.2). Tool
//! implementations (shell, fetch, search, sandboxed execution) are out
//! of scope; this module only fixes the contract every implementation
//! must satisfy, as a capability trait rather than a class hierarchy
//! (spec §9: "Tools are a capability set, not a class hierarchy").

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tagged-variant tool outcome (spec §9): exceptions inside a tool
/// become an `Err` here rather than escaping the tool boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolError {
    pub code: String,
    pub message: String,
}

pub type ToolOutcome = Result<Value, ToolError>;

/// Input/output shapes (spec §6.2). Tool names and input shapes are
/// stable because they are observable through the action log.
#[derive(Debug, Clone, Deserialize)]
pub struct BashInput {
    pub command: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadFileInput {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteFileInput {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditFileInput {
    pub path: String,
    pub search: String,
    pub replace: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchInput {
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchInput {
    pub query: String,
    #[serde(default)]
    pub freshness: Option<String>,
    #[serde(default)]
    pub count: Option<u32>,
}

/// Clamp range for `executeCode`'s `timeoutMs` (spec §6.2).
pub const EXECUTE_CODE_MIN_TIMEOUT_MS: u64 = 1_000;
pub const EXECUTE_CODE_MAX_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteCodeInput {
    pub code: String,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ExecuteCodeInput {
    /// `timeoutMs` clamped to `[1000, 120000]` (spec §6.2).
    pub fn clamped_timeout_ms(&self) -> u64 {
        self.timeout_ms
            .unwrap_or(EXECUTE_CODE_MIN_TIMEOUT_MS)
            .clamp(EXECUTE_CODE_MIN_TIMEOUT_MS, EXECUTE_CODE_MAX_TIMEOUT_MS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteCodeErrorType {
    Syntax,
    Runtime,
    Timeout,
    Unknown,
}

/// An allow-list entry gating the `fetch` tool (spec §6.2).
#[derive(Debug, Clone)]
pub struct FetchAllowRule {
    pub url_prefix: String,
    pub methods: Vec<String>,
}

impl FetchAllowRule {
    pub fn default_methods() -> Vec<String> {
        vec!["GET".into(), "HEAD".into(), "OPTIONS".into()]
    }

    pub fn permits(&self, url: &str, method: &str) -> bool {
        url.starts_with(&self.url_prefix)
            && self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// The abstract tool set the orchestrator (L6) and subagent workers
/// (L7) drive. Implementations route each call to a concrete backend
/// (a real shell, HTTP client, sandboxed interpreter, etc); this core
/// never depends on a concrete one. Object-safe so a session can hold
/// `Arc<dyn CapabilitySet>`.
#[async_trait]
pub trait CapabilitySet: Send + Sync {
    async fn bash(&self, input: BashInput) -> ToolOutcome;
    async fn read_file(&self, input: ReadFileInput) -> ToolOutcome;
    async fn write_file(&self, input: WriteFileInput) -> ToolOutcome;
    async fn edit_file(&self, input: EditFileInput) -> ToolOutcome;
    async fn list_files(&self) -> ToolOutcome;
    async fn fetch(&self, input: FetchInput) -> ToolOutcome;
    async fn web_search(&self, input: SearchInput) -> ToolOutcome;
    async fn news_search(&self, input: SearchInput) -> ToolOutcome;
    async fn execute_code(&self, input: ExecuteCodeInput) -> ToolOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_code_timeout_clamps_low() {
        let input = ExecuteCodeInput {
            code: String::new(),
            modules: vec![],
            timeout_ms: Some(10),
        };
        assert_eq!(input.clamped_timeout_ms(), EXECUTE_CODE_MIN_TIMEOUT_MS);
    }

    #[test]
    fn execute_code_timeout_clamps_high() {
        let input = ExecuteCodeInput {
            code: String::new(),
            modules: vec![],
            timeout_ms: Some(999_999),
        };
        assert_eq!(input.clamped_timeout_ms(), EXECUTE_CODE_MAX_TIMEOUT_MS);
    }

    #[test]
    fn fetch_allow_rule_checks_prefix_and_method() {
        let rule = FetchAllowRule {
            url_prefix: "https://api.example.com/".into(),
            methods: FetchAllowRule::default_methods(),
        };
        assert!(rule.permits("https://api.example.com/v1/things", "GET"));
        assert!(!rule.permits("https://other.example.com/v1/things", "GET"));
        assert!(!rule.permits("https://api.example.com/v1/things", "POST"));
    }
}
