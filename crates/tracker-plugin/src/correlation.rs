//! In-memory correlation state for in-flight sessions and tool calls.
//!
//! One [`CorrelationStore`] is built at startup and shared by reference with
//! every handler. All maps sit behind one `std::sync::Mutex`; critical
//! sections never await, so the lock is never held across I/O.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracker_core::types::AgentMode;

/// Active agents for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentAssignment {
    pub primary: String,
    pub subagent: Option<String>,
}

/// Start state of a tool call awaiting its "after" event.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolCall {
    pub started_at: i64,
    pub input: Value,
}

/// Tool calls are scoped to their session so interleaved sessions reusing a
/// call id never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallKey {
    session_id: String,
    call_id: String,
}

impl CallKey {
    fn new(session_id: &str, call_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            call_id: call_id.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    session_starts: HashMap<String, i64>,
    token_totals: HashMap<String, u64>,
    agents: HashMap<String, AgentAssignment>,
    /// Entries whose "after" never arrives stay here for the life of the
    /// process; see `pending_tool_calls`.
    tool_calls: HashMap<CallKey, PendingToolCall>,
}

#[derive(Debug, Default)]
pub struct CorrelationStore {
    inner: Mutex<Inner>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        // A panic mid-update leaves plain map data behind; keep serving it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_session_start(&self, session_id: &str, started_at: i64) {
        self.inner()
            .session_starts
            .insert(session_id.to_string(), started_at);
    }

    pub fn session_start(&self, session_id: &str) -> Option<i64> {
        self.inner().session_starts.get(session_id).copied()
    }

    /// Reset a session's token tally to zero.
    pub fn init_token_tally(&self, session_id: &str) {
        self.inner().token_totals.insert(session_id.to_string(), 0);
    }

    /// Add to a session's token tally and return the new total.
    pub fn add_tokens(&self, session_id: &str, tokens: u64) -> u64 {
        let mut inner = self.inner();
        let total = inner.token_totals.entry(session_id.to_string()).or_insert(0);
        *total += tokens;
        *total
    }

    pub fn token_total(&self, session_id: &str) -> Option<u64> {
        self.inner().token_totals.get(session_id).copied()
    }

    /// Record an agent invocation and return the updated assignment.
    ///
    /// `primary` replaces the primary agent and `subagent` the subagent; any
    /// other mode leaves the assignment as it was.
    pub fn assign_agent(&self, session_id: &str, agent: &str, mode: &AgentMode) -> AgentAssignment {
        let mut inner = self.inner();
        let current = inner.agents.entry(session_id.to_string()).or_default();
        match mode {
            AgentMode::Primary => current.primary = agent.to_string(),
            AgentMode::Subagent => current.subagent = Some(agent.to_string()),
            AgentMode::Other(_) => {}
        }
        current.clone()
    }

    pub fn agent_assignment(&self, session_id: &str) -> Option<AgentAssignment> {
        self.inner().agents.get(session_id).cloned()
    }

    pub fn begin_tool_call(&self, session_id: &str, call_id: &str, started_at: i64, input: Value) {
        self.inner().tool_calls.insert(
            CallKey::new(session_id, call_id),
            PendingToolCall { started_at, input },
        );
    }

    /// Remove and return the start state of a tool call.
    pub fn take_tool_call(&self, session_id: &str, call_id: &str) -> Option<PendingToolCall> {
        self.inner()
            .tool_calls
            .remove(&CallKey::new(session_id, call_id))
    }

    /// Number of tool calls started but never completed.
    pub fn pending_tool_calls(&self) -> usize {
        self.inner().tool_calls.len()
    }

    /// Drop a session's tally, start time and agent assignment.
    pub fn purge_session(&self, session_id: &str) {
        let mut inner = self.inner();
        inner.token_totals.remove(session_id);
        inner.session_starts.remove(session_id);
        inner.agents.remove(session_id);
    }

    /// Whether any per-session state is held for this session.
    pub fn has_session_state(&self, session_id: &str) -> bool {
        let inner = self.inner();
        inner.token_totals.contains_key(session_id)
            || inner.session_starts.contains_key(session_id)
            || inner.agents.contains_key(session_id)
    }
}
