//! Action log entry shape and the pure truncation/summarization rules
//! that keep it bounded (spec §3.4, §4.5, "L5"). Storage and querying
//! live in the database layer; this module only decides what an entry
//! looks like.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum stored length of an entry's `input` field.
pub const MAX_INPUT_CHARS: usize = 1_000;
/// Maximum stored length of an entry's `output_summary` field.
pub const MAX_SUMMARY_CHARS: usize = 500;

/// A single append-only audit record (spec §3.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: Uuid,
    pub session_id: Uuid,
    pub timestamp: i64,
    pub tool: String,
    pub action: String,
    pub input: String,
    pub output_summary: String,
    pub duration_ms: i64,
    pub success: bool,
    pub error: Option<String>,
    pub message_id: Option<Uuid>,
}

/// Truncate `input` to [`MAX_INPUT_CHARS`], appending an ellipsis marker
/// with the original length when it would otherwise be stored whole
/// (spec §4.5).
pub fn truncate_input(input: &str) -> String {
    truncate_with_marker(input, MAX_INPUT_CHARS)
}

fn truncate_with_marker(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        return s.to_string();
    }
    let marker = format!("… [truncated, {char_count} chars total]");
    let keep = max_chars.saturating_sub(marker.chars().count());
    let head: String = s.chars().take(keep).collect();
    format!("{head}{marker}")
}

/// `true` iff a tool output should be recorded as successful: the
/// absence of an `error` field (spec §4.6 step 6).
pub fn derive_success(output: &serde_json::Value) -> bool {
    !matches!(output, serde_json::Value::Object(map) if map.contains_key("error"))
}

/// Produce the ≤ [`MAX_SUMMARY_CHARS`] summary for a tool's output
/// (spec §4.5's table). Unknown tools fall through to the `default`
/// JSON-encoding rule.
pub fn summarize(tool: &str, output: &serde_json::Value) -> String {
    let summary = match tool {
        "shell" | "bash" => summarize_shell(output),
        "readFile" => summarize_read_file(output),
        "writeFile" | "editFile" => summarize_write(output),
        "fetch" => summarize_fetch(output),
        "webSearch" | "newsSearch" => summarize_search(output),
        "browseUrl" => summarize_browse(output),
        "executeCode" => summarize_execute_code(output),
        _ => default_summary(output),
    };
    truncate_with_marker(&summary, MAX_SUMMARY_CHARS)
}

fn str_field<'a>(v: &'a serde_json::Value, key: &str) -> &'a str {
    v.get(key).and_then(|f| f.as_str()).unwrap_or("")
}

fn i64_field(v: &serde_json::Value, key: &str) -> i64 {
    v.get(key).and_then(|f| f.as_i64()).unwrap_or(0)
}

fn summarize_shell(output: &serde_json::Value) -> String {
    let exit = i64_field(output, "exitCode");
    let stdout = str_field(output, "stdout").chars().count();
    let stderr = str_field(output, "stderr").chars().count();
    format!("exit={exit}, stdout={stdout} chars, stderr={stderr} chars")
}

fn summarize_read_file(output: &serde_json::Value) -> String {
    if output.get("error").is_some() {
        return default_summary(output);
    }
    let content = str_field(output, "content");
    let lines = content.lines().count();
    let bytes = content.len();
    format!("{lines} lines, {bytes} chars")
}

fn summarize_write(output: &serde_json::Value) -> String {
    if output.get("error").is_some() {
        return default_summary(output);
    }
    "success".to_string()
}

fn summarize_fetch(output: &serde_json::Value) -> String {
    if output.get("error").is_some() {
        return default_summary(output);
    }
    let status = i64_field(output, "status");
    let status_text = str_field(output, "statusText");
    let bytes = str_field(output, "body").len();
    format!("{status} {status_text}, {bytes} bytes")
}

fn summarize_search(output: &serde_json::Value) -> String {
    let n = output
        .get("results")
        .and_then(|r| r.as_array())
        .map(|a| a.len())
        .unwrap_or(0);
    format!("{n} results")
}

fn summarize_browse(output: &serde_json::Value) -> String {
    let url = str_field(output, "url");
    let title = str_field(output, "title");
    format!("{url} — \"{title}\"")
}

fn summarize_execute_code(output: &serde_json::Value) -> String {
    if output.get("success").and_then(|v| v.as_bool()) == Some(true) {
        format!("success: {}", str_field(output, "output"))
    } else {
        format!("error: {}", str_field(output, "error"))
    }
}

fn default_summary(output: &serde_json::Value) -> String {
    serde_json::to_string(output).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_under_limit_is_stored_whole() {
        let input = "x".repeat(999);
        assert_eq!(truncate_input(&input), input);
    }

    #[test]
    fn input_over_limit_is_truncated_with_marker() {
        let input = "x".repeat(2_000);
        let result = truncate_input(&input);
        assert!(result.chars().count() <= MAX_INPUT_CHARS);
        assert!(result.contains("2000 chars total"));
    }

    #[test]
    fn shell_summary_matches_spec_shape() {
        let output = json!({"stdout": "x".repeat(2000), "stderr": "", "exitCode": 0});
        let summary = summarize("shell", &output);
        assert_eq!(summary, "exit=0, stdout=2000 chars, stderr=0 chars");
        assert!(summary.len() <= MAX_SUMMARY_CHARS);
    }

    #[test]
    fn read_file_summary() {
        let output = json!({"content": "line one\nline two", "path": "a.txt"});
        assert_eq!(summarize("readFile", &output), "2 lines, 17 chars");
    }

    #[test]
    fn write_file_summary_is_success() {
        let output = json!({"success": true, "path": "a.txt", "version": 2});
        assert_eq!(summarize("writeFile", &output), "success");
        assert_eq!(summarize("editFile", &output), "success");
    }

    #[test]
    fn fetch_summary() {
        let output = json!({"status": 200, "statusText": "OK", "body": "abcd"});
        assert_eq!(summarize("fetch", &output), "200 OK, 4 bytes");
    }

    #[test]
    fn search_summary_counts_results() {
        let output = json!({"results": [1, 2, 3]});
        assert_eq!(summarize("webSearch", &output), "3 results");
        assert_eq!(summarize("newsSearch", &output), "3 results");
    }

    #[test]
    fn unknown_tool_falls_back_to_json() {
        let output = json!({"foo": "bar"});
        assert_eq!(summarize("mystery", &output), r#"{"foo":"bar"}"#);
    }

    #[test]
    fn success_is_derived_from_absence_of_error() {
        assert!(derive_success(&json!({"content": "ok"})));
        assert!(!derive_success(&json!({"error": "nope"})));
    }
}
