//! The LLM driver contract (spec §1: "We specify only the contract: the
//! core hands it a message history, tool descriptors, and a step
//! budget; it returns a sequence of tool calls and a final text").
//!
//! Model selection, streaming, and reasoning are out of scope; this
//! trait is the seam the orchestrator loop (L6) and subagent workers
//! (L7) drive against. Object-safe so a session can hold
//! `Arc<dyn LlmDriver>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A chat message in the bounded history passed to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// A tool the driver may call, described by name and JSON schema (spec
/// §6.2: "Every tool is described by a JSON schema").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One turn's request to the driver.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    pub tools: Vec<ToolDescriptor>,
    pub step_budget: u32,
}

/// A single tool invocation the driver asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: Uuid,
    pub tool: String,
    pub input: Value,
}

/// One LLM step: zero or more tool calls, optionally a final text that
/// ends the turn (spec §4.6 step 6-7).
#[derive(Debug, Clone, Default)]
pub struct TurnStep {
    pub tool_calls: Vec<ToolCallRequest>,
    pub final_text: Option<String>,
}

/// The result of a tool call, fed back to the driver for its next step.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub call_id: Uuid,
    pub output: Value,
}

/// The contract an LLM driver implements. A single call to
/// [`LlmDriver::step`] corresponds to one round-trip to the model.
/// Implementations own streaming, retries against the provider, and
/// reasoning; callers only see the tool calls and/or final text that
/// round produced.
#[async_trait]
pub trait LlmDriver: Send + Sync {
    async fn step(
        &self,
        request: &TurnRequest,
        prior_results: &[ToolCallResult],
    ) -> anyhow::Result<TurnStep>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn LlmDriver) {}
};

/// A driver that returns a final text immediately without ever calling
/// a tool. Used by headless tests that exercise the orchestrator loop
/// without a real model (spec §1: "The core must remain executable by
/// a headless driver for test").
pub struct NullDriver {
    pub final_text: String,
}

impl NullDriver {
    pub fn new(final_text: impl Into<String>) -> Self {
        Self {
            final_text: final_text.into(),
        }
    }
}

#[async_trait]
impl LlmDriver for NullDriver {
    async fn step(
        &self,
        _request: &TurnRequest,
        _prior_results: &[ToolCallResult],
    ) -> anyhow::Result<TurnStep> {
        Ok(TurnStep {
            tool_calls: Vec::new(),
            final_text: Some(self.final_text.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_driver_returns_final_text_with_no_tool_calls() {
        let driver = NullDriver::new("done");
        let request = TurnRequest {
            system_prompt: "you are a test".into(),
            history: vec![],
            tools: vec![],
            step_budget: 20,
        };
        let step = driver.step(&request, &[]).await.unwrap();
        assert!(step.tool_calls.is_empty());
        assert_eq!(step.final_text.as_deref(), Some("done"));
    }

    #[test]
    fn driver_is_object_safe() {
        let driver: Box<dyn LlmDriver> = Box::new(NullDriver::new("x"));
        drop(driver);
    }
}
