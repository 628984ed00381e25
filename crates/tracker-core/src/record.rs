//! Persisted log records.
//!
//! One [`LogRecord`] is one line of a per-session log file. The `type` tag
//! and field names are the on-disk format read back by the analytics side.

use crate::types::{AgentMode, Role, TokenBreakdown};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session id used when an event carries no recognisable session.
pub const UNKNOWN_SESSION: &str = "unknown";

fn unknown_session() -> String {
    UNKNOWN_SESSION.to_string()
}

/// A single structured, timestamped log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogRecord {
    SessionStart {
        session_id: String,
        timestamp: i64,
    },

    AgentInvocation {
        session_id: String,
        agent_name: String,
        agent_mode: AgentMode,
        timestamp: i64,
    },

    AgentSwitch {
        session_id: String,
        from_agent: String,
        to_agent: String,
        timestamp: i64,
    },

    Message {
        session_id: String,
        id: String,
        role: Role,
        #[serde(default)]
        tokens: TokenBreakdown,
        /// Milliseconds from creation to completion, 0 when unknown.
        #[serde(default)]
        latency: i64,
        #[serde(default)]
        thinking_loops: u32,
        #[serde(default)]
        content_length: usize,
        timestamp: i64,
    },

    /// Token breakdown of one assistant message.
    AssistantTokens {
        session_id: String,
        message_id: String,
        input_tokens: u64,
        output_tokens: u64,
        reasoning_tokens: u64,
        cache_read: u64,
        cache_write: u64,
        total: u64,
        #[serde(default)]
        latency: i64,
        #[serde(default)]
        thinking_loops: u32,
        timestamp: i64,
    },

    ToolExecution {
        session_id: String,
        name: String,
        call_id: String,
        /// Milliseconds between the before and after events.
        execution_time: i64,
        #[serde(default)]
        input: Value,
        #[serde(default)]
        output: Value,
        timestamp: i64,
    },

    /// A generic host event, logged verbatim.
    Event {
        #[serde(default = "unknown_session")]
        session_id: String,
        event_type: String,
        #[serde(default)]
        properties: Value,
        timestamp: i64,
    },

    SessionEnd {
        session_id: String,
        total_tokens: u64,
        #[serde(default)]
        primary_agent: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subagent: Option<String>,
        #[serde(default)]
        config: Value,
        timestamp: i64,
    },
}

impl LogRecord {
    /// Get the session ID from any record variant.
    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionStart { session_id, .. }
            | Self::AgentInvocation { session_id, .. }
            | Self::AgentSwitch { session_id, .. }
            | Self::Message { session_id, .. }
            | Self::AssistantTokens { session_id, .. }
            | Self::ToolExecution { session_id, .. }
            | Self::Event { session_id, .. }
            | Self::SessionEnd { session_id, .. } => session_id,
        }
    }

    /// Get the timestamp (epoch milliseconds) from any record variant.
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::SessionStart { timestamp, .. }
            | Self::AgentInvocation { timestamp, .. }
            | Self::AgentSwitch { timestamp, .. }
            | Self::Message { timestamp, .. }
            | Self::AssistantTokens { timestamp, .. }
            | Self::ToolExecution { timestamp, .. }
            | Self::Event { timestamp, .. }
            | Self::SessionEnd { timestamp, .. } => *timestamp,
        }
    }

    /// The on-disk `type` tag.
    pub fn record_type(&self) -> &'static str {
        match self {
            Self::SessionStart { .. } => "session_start",
            Self::AgentInvocation { .. } => "agent_invocation",
            Self::AgentSwitch { .. } => "agent_switch",
            Self::Message { .. } => "message",
            Self::AssistantTokens { .. } => "assistant_tokens",
            Self::ToolExecution { .. } => "tool_execution",
            Self::Event { .. } => "event",
            Self::SessionEnd { .. } => "session_end",
        }
    }

    /// Serialize as a single newline-terminated JSON line.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CacheTokens;
    use serde_json::json;

    #[test]
    fn test_message_record_wire_format() {
        let record = LogRecord::Message {
            session_id: "ses_1".into(),
            id: "msg_1".into(),
            role: Role::Assistant,
            tokens: TokenBreakdown {
                input: 10,
                output: 5,
                reasoning: 0,
                cache: CacheTokens { read: 1, write: 0 },
            },
            latency: 100,
            thinking_loops: 2,
            content_length: 0,
            timestamp: 42,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["tokens"]["cache"]["read"], 1);
        assert_eq!(value["latency"], 100);
        assert_eq!(record.record_type(), "message");
    }

    #[test]
    fn test_session_end_omits_missing_subagent() {
        let record = LogRecord::SessionEnd {
            session_id: "ses_1".into(),
            total_tokens: 15,
            primary_agent: "build".into(),
            subagent: None,
            config: json!({"theme": "dark"}),
            timestamp: 7,
        };
        let line = record.to_line().unwrap();
        assert!(line.ends_with('\n'));
        assert!(!line.contains("subagent"));
        assert!(line.contains("\"session_end\""));
    }

    #[test]
    fn test_parse_legacy_event_without_session() {
        let record: LogRecord = serde_json::from_value(json!({
            "type": "event",
            "event_type": "file.edited",
            "properties": {"file": "a.rs"},
            "timestamp": 99
        }))
        .unwrap();
        assert_eq!(record.session_id(), UNKNOWN_SESSION);
        assert_eq!(record.timestamp(), 99);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let parsed = serde_json::from_value::<LogRecord>(json!({
            "type": "token_usage",
            "timestamp": 1
        }));
        assert!(parsed.is_err());
    }
}
