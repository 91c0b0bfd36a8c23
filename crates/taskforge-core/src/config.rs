//! Orchestrator-wide configuration (spec §6.4): a single immutable map
//! resolved once at process start, with compiled-in defaults matching
//! the spec's table exactly.

use std::time::Duration;

/// All tunables the orchestrator needs. Every field has a spec-mandated
/// default; overriding any of the heartbeat fields must preserve the
/// 2x safety ratio between them (spec §9's open question on heartbeat
/// ratio).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    pub max_depth: u32,
    pub max_subtasks: usize,
    pub max_total_tasks: usize,
    pub max_attempts: u32,
    pub base_backoff_seconds: u64,
    pub max_backoff_seconds: u64,
    pub heartbeat_interval_seconds: u64,
    pub heartbeat_timeout_seconds: u64,
    pub max_turn_execution_time_seconds: u64,
    pub max_subagent_execution_time_seconds: u64,
    pub max_tool_rounds: u32,
    pub max_context_messages: usize,
    pub subagent_initial_check_delay_seconds: u64,
    pub subagent_check_interval_seconds: u64,
    pub subagent_max_check_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_subtasks: 10,
            max_total_tasks: 50,
            max_attempts: 3,
            base_backoff_seconds: 2,
            max_backoff_seconds: 60,
            heartbeat_interval_seconds: 30,
            heartbeat_timeout_seconds: 60,
            max_turn_execution_time_seconds: 300,
            max_subagent_execution_time_seconds: 600,
            max_tool_rounds: 20,
            max_context_messages: 50,
            subagent_initial_check_delay_seconds: 30,
            subagent_check_interval_seconds: 60,
            subagent_max_check_attempts: 10,
        }
    }
}

impl OrchestratorConfig {
    /// Resolve configuration from environment variables, falling back to
    /// spec defaults for anything unset or unparseable. Mirrors the
    /// `from_env` pattern used for database configuration.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_depth: env_or("TASKFORGE_MAX_DEPTH", defaults.max_depth),
            max_subtasks: env_or("TASKFORGE_MAX_SUBTASKS", defaults.max_subtasks),
            max_total_tasks: env_or("TASKFORGE_MAX_TOTAL_TASKS", defaults.max_total_tasks),
            max_attempts: env_or("TASKFORGE_MAX_ATTEMPTS", defaults.max_attempts),
            base_backoff_seconds: env_or(
                "TASKFORGE_BASE_BACKOFF_SECONDS",
                defaults.base_backoff_seconds,
            ),
            max_backoff_seconds: env_or(
                "TASKFORGE_MAX_BACKOFF_SECONDS",
                defaults.max_backoff_seconds,
            ),
            heartbeat_interval_seconds: env_or(
                "TASKFORGE_HEARTBEAT_INTERVAL_SECONDS",
                defaults.heartbeat_interval_seconds,
            ),
            heartbeat_timeout_seconds: env_or(
                "TASKFORGE_HEARTBEAT_TIMEOUT_SECONDS",
                defaults.heartbeat_timeout_seconds,
            ),
            max_turn_execution_time_seconds: env_or(
                "TASKFORGE_MAX_TURN_EXECUTION_TIME_SECONDS",
                defaults.max_turn_execution_time_seconds,
            ),
            max_subagent_execution_time_seconds: env_or(
                "TASKFORGE_MAX_SUBAGENT_EXECUTION_TIME_SECONDS",
                defaults.max_subagent_execution_time_seconds,
            ),
            max_tool_rounds: env_or("TASKFORGE_MAX_TOOL_ROUNDS", defaults.max_tool_rounds),
            max_context_messages: env_or(
                "TASKFORGE_MAX_CONTEXT_MESSAGES",
                defaults.max_context_messages,
            ),
            subagent_initial_check_delay_seconds: env_or(
                "TASKFORGE_SUBAGENT_INITIAL_CHECK_DELAY_SECONDS",
                defaults.subagent_initial_check_delay_seconds,
            ),
            subagent_check_interval_seconds: env_or(
                "TASKFORGE_SUBAGENT_CHECK_INTERVAL_SECONDS",
                defaults.subagent_check_interval_seconds,
            ),
            subagent_max_check_attempts: env_or(
                "TASKFORGE_SUBAGENT_MAX_CHECK_ATTEMPTS",
                defaults.subagent_max_check_attempts,
            ),
        }
    }

    pub fn graph_limits(&self) -> crate::graph::GraphLimits {
        crate::graph::GraphLimits {
            max_depth: self.max_depth,
            max_subtasks: self.max_subtasks,
            max_total: self.max_total_tasks,
        }
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_secs(self.base_backoff_seconds)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_seconds)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_seconds)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.max_depth, 3);
        assert_eq!(cfg.max_subtasks, 10);
        assert_eq!(cfg.max_total_tasks, 50);
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.base_backoff_seconds, 2);
        assert_eq!(cfg.max_backoff_seconds, 60);
        assert_eq!(cfg.heartbeat_interval_seconds, 30);
        assert_eq!(cfg.heartbeat_timeout_seconds, 60);
        assert_eq!(cfg.max_turn_execution_time_seconds, 300);
        assert_eq!(cfg.max_subagent_execution_time_seconds, 600);
        assert_eq!(cfg.max_tool_rounds, 20);
        assert_eq!(cfg.max_context_messages, 50);
        assert_eq!(cfg.subagent_initial_check_delay_seconds, 30);
        assert_eq!(cfg.subagent_check_interval_seconds, 60);
        assert_eq!(cfg.subagent_max_check_attempts, 10);
    }

    #[test]
    fn heartbeat_ratio_is_two_to_one_by_default() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.heartbeat_timeout_seconds, cfg.heartbeat_interval_seconds * 2);
    }
}
