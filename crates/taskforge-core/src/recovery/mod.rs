//! Scheduling recovery (spec §4.8, "L8"): orphan detection and the
//! resume/retry/fail decision. Pure functions over the scheduling
//! record (spec §3.3); re-enqueueing and marking rows `error` is the
//! caller's job (the database layer and the session façade).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a scheduling/message record (spec §3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Complete,
    Error,
    Cancelled,
}

/// A long-running LLM-driven turn, tracked for crash recovery (spec
/// §3.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledMessage {
    pub id: Uuid,
    pub status: MessageStatus,
    /// Epoch milliseconds of the last heartbeat, if any were written.
    pub heartbeat_at: Option<i64>,
    /// Opaque resume token, if the turn checkpointed progress.
    pub checkpoint: Option<String>,
    pub attempt: u32,
    pub task_id: Uuid,
}

/// Default heartbeat staleness threshold (spec §3.3, §6.4).
pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: i64 = 60_000;
/// Default retry ceiling before a message is given up on (spec §6.4's
/// `maxAttempts`).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A message is orphaned iff it's `streaming` and its heartbeat is
/// missing or older than `now - timeout_ms` (spec §3.3).
pub fn is_orphaned(msg: &ScheduledMessage, now: i64, timeout_ms: i64) -> bool {
    msg.status == MessageStatus::Streaming
        && match msg.heartbeat_at {
            None => true,
            Some(hb) => hb < now - timeout_ms,
        }
}

/// All orphaned messages among `messages` (spec §4.8).
pub fn find_orphaned(
    messages: &[ScheduledMessage],
    now: i64,
    timeout_ms: i64,
) -> Vec<&ScheduledMessage> {
    messages
        .iter()
        .filter(|m| is_orphaned(m, now, timeout_ms))
        .collect()
}

/// The recovery action to take for an orphaned message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Resume,
    Retry,
    Fail,
}

/// Decide how to recover `msg` (spec §4.8):
/// a checkpoint always wins regardless of attempt count; otherwise
/// retry while attempts remain, else give up.
pub fn decide(msg: &ScheduledMessage, max_attempts: u32) -> Decision {
    if msg.checkpoint.is_some() {
        Decision::Resume
    } else if msg.attempt < max_attempts {
        Decision::Retry
    } else {
        Decision::Fail
    }
}

/// Payload attached when re-enqueueing a recovered message (spec
/// §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPayload {
    pub message_id: Uuid,
    pub checkpoint: Option<String>,
    pub reason: String,
}

pub fn build_recovery_payload(msg: &ScheduledMessage, reason: &str) -> RecoveryPayload {
    RecoveryPayload {
        message_id: msg.id,
        checkpoint: msg.checkpoint.clone(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(
        heartbeat_at: Option<i64>,
        attempt: u32,
        checkpoint: Option<&str>,
    ) -> ScheduledMessage {
        ScheduledMessage {
            id: Uuid::new_v4(),
            status: MessageStatus::Streaming,
            heartbeat_at,
            checkpoint: checkpoint.map(str::to_string),
            attempt,
            task_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn finds_only_stale_heartbeat() {
        let now = 1_000_000;
        let stale = msg(Some(now - 90_000), 1, None);
        let fresh = msg(Some(now - 30_000), 1, None);
        let msgs = [stale.clone(), fresh];
        let orphans = find_orphaned(&msgs, now, DEFAULT_HEARTBEAT_TIMEOUT_MS);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, stale.id);
    }

    #[test]
    fn null_heartbeat_is_orphaned() {
        let now = 1_000_000;
        let never_beat = msg(None, 1, None);
        assert!(is_orphaned(&never_beat, now, DEFAULT_HEARTBEAT_TIMEOUT_MS));
    }

    #[test]
    fn decide_retries_under_max_attempts() {
        let m = msg(Some(0), 1, None);
        assert_eq!(decide(&m, DEFAULT_MAX_ATTEMPTS), Decision::Retry);
    }

    #[test]
    fn decide_fails_at_max_attempts() {
        let m = msg(Some(0), 3, None);
        assert_eq!(decide(&m, DEFAULT_MAX_ATTEMPTS), Decision::Fail);
    }

    #[test]
    fn decide_resumes_with_checkpoint_regardless_of_attempts() {
        let m = msg(Some(0), 99, Some("chk-1"));
        assert_eq!(decide(&m, DEFAULT_MAX_ATTEMPTS), Decision::Resume);
    }

    #[test]
    fn non_streaming_message_is_never_orphaned() {
        let mut m = msg(None, 1, None);
        m.status = MessageStatus::Complete;
        assert!(!is_orphaned(&m, 1_000_000, DEFAULT_HEARTBEAT_TIMEOUT_MS));
    }
}
