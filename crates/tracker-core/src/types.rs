//! Inbound event contract: the typed events a host delivers to the tracker.
//!
//! Field names follow the host's JSON (`sessionID`, `callID`, ...) so a raw
//! host payload deserializes directly into [`HostEvent`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event delivered by the host runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostEvent {
    #[serde(rename = "session.started")]
    SessionStarted {
        #[serde(rename = "sessionID")]
        session_id: String,
    },

    #[serde(rename = "agent.invoked")]
    AgentInvoked {
        agent: String,
        mode: AgentMode,
        #[serde(rename = "sessionID")]
        session_id: String,
    },

    #[serde(rename = "agent.switched")]
    AgentSwitched {
        #[serde(rename = "fromAgent")]
        from_agent: String,
        #[serde(rename = "toAgent")]
        to_agent: String,
        #[serde(rename = "sessionID")]
        session_id: String,
    },

    #[serde(rename = "chat.message")]
    ChatMessage {
        message: ChatMessage,
        #[serde(default)]
        parts: Vec<MessagePart>,
    },

    #[serde(rename = "tool.execute.before")]
    ToolExecuteBefore {
        tool: String,
        #[serde(rename = "sessionID")]
        session_id: String,
        #[serde(rename = "callID")]
        call_id: String,
        #[serde(default)]
        args: Value,
    },

    #[serde(rename = "tool.execute.after")]
    ToolExecuteAfter {
        tool: String,
        #[serde(rename = "sessionID")]
        session_id: String,
        #[serde(rename = "callID")]
        call_id: String,
        #[serde(default)]
        output: Value,
    },

    /// Catch-all channel for everything else, including `session.idle`.
    #[serde(rename = "event")]
    Generic { event: GenericEvent },
}

impl HostEvent {
    /// Short name of the event kind, for diagnostics.
    pub fn kind(&self) -> &str {
        match self {
            Self::SessionStarted { .. } => "session.started",
            Self::AgentInvoked { .. } => "agent.invoked",
            Self::AgentSwitched { .. } => "agent.switched",
            Self::ChatMessage { .. } => "chat.message",
            Self::ToolExecuteBefore { .. } => "tool.execute.before",
            Self::ToolExecuteAfter { .. } => "tool.execute.after",
            Self::Generic { event } => &event.event_type,
        }
    }
}

/// How an agent was invoked.
///
/// Serialized as the host's plain string; modes the tracker does not
/// distinguish are kept verbatim in [`AgentMode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentMode {
    Primary,
    Subagent,
    Other(String),
}

impl AgentMode {
    pub fn as_str(&self) -> &str {
        match self {
            AgentMode::Primary => "primary",
            AgentMode::Subagent => "subagent",
            AgentMode::Other(mode) => mode,
        }
    }
}

impl From<String> for AgentMode {
    fn from(mode: String) -> Self {
        match mode.as_str() {
            "primary" => AgentMode::Primary,
            "subagent" => AgentMode::Subagent,
            _ => AgentMode::Other(mode),
        }
    }
}

impl From<AgentMode> for String {
    fn from(mode: AgentMode) -> Self {
        match mode {
            AgentMode::Other(mode) => mode,
            known => known.as_str().to_string(),
        }
    }
}

/// Message author. Unrecognized roles are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Unknown(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::Unknown(role) => role,
        }
    }
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        match role.as_str() {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::Unknown(role),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Unknown(role) => role,
            known => known.as_str().to_string(),
        }
    }
}

/// A chat message as reported by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<MessageTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatMessage {
    /// Token counts with every missing component treated as zero.
    pub fn normalized_tokens(&self) -> TokenBreakdown {
        self.tokens
            .as_ref()
            .map(TokenUsage::normalized)
            .unwrap_or_default()
    }

    /// `completed - created` when both are known, else 0.
    pub fn latency_ms(&self) -> i64 {
        match &self.time {
            Some(MessageTime {
                created: Some(created),
                completed: Some(completed),
            }) => completed - created,
            _ => 0,
        }
    }

    /// Length of the text content in characters.
    pub fn content_length(&self) -> usize {
        self.content.as_deref().map_or(0, |c| c.chars().count())
    }
}

/// Raw token counts; the host may omit any of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input: Option<u64>,
    #[serde(default)]
    pub output: Option<u64>,
    #[serde(default)]
    pub reasoning: Option<u64>,
    #[serde(default)]
    pub cache: Option<CacheUsage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheUsage {
    #[serde(default)]
    pub read: Option<u64>,
    #[serde(default)]
    pub write: Option<u64>,
}

impl TokenUsage {
    pub fn normalized(&self) -> TokenBreakdown {
        let cache = self.cache.clone().unwrap_or_default();
        TokenBreakdown {
            input: self.input.unwrap_or(0),
            output: self.output.unwrap_or(0),
            reasoning: self.reasoning.unwrap_or(0),
            cache: CacheTokens {
                read: cache.read.unwrap_or(0),
                write: cache.write.unwrap_or(0),
            },
        }
    }
}

/// Token counts with every component present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBreakdown {
    pub input: u64,
    pub output: u64,
    pub reasoning: u64,
    pub cache: CacheTokens,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTokens {
    pub read: u64,
    pub write: u64,
}

impl TokenBreakdown {
    /// Sum of input, output, reasoning, cache-read and cache-write.
    pub fn total(&self) -> u64 {
        self.input + self.output + self.reasoning + self.cache.read + self.cache.write
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageTime {
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub completed: Option<i64>,
}

/// One content segment of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl MessagePart {
    pub fn is_reasoning(&self) -> bool {
        self.kind == "reasoning"
    }
}

/// Payload of the generic `event` channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub properties: Value,
}
