//! Event handlers: one per inbound event kind.

use crate::tracker::PerformanceTracker;
use serde_json::{json, Value};
use tracker_core::error::Result;
use tracker_core::record::LogRecord;
use tracker_core::session_id::extract_session_id;
use tracker_core::types::{AgentMode, ChatMessage, GenericEvent, MessagePart, Role};

impl PerformanceTracker {
    pub async fn on_session_start(&self, session_id: &str) -> Result<()> {
        let now = self.now();
        self.store.record_session_start(session_id, now);
        let writer = self.writers.get_writer(session_id, &self.store).await?;
        self.append(
            &writer,
            LogRecord::SessionStart {
                session_id: session_id.to_string(),
                timestamp: now,
            },
        )
        .await
    }

    pub async fn on_agent_invoked(&self, agent: &str, mode: AgentMode, session_id: &str) -> Result<()> {
        let writer = self.writers.get_writer(session_id, &self.store).await?;
        self.store.assign_agent(session_id, agent, &mode);
        self.append(
            &writer,
            LogRecord::AgentInvocation {
                session_id: session_id.to_string(),
                agent_name: agent.to_string(),
                agent_mode: mode,
                timestamp: self.now(),
            },
        )
        .await
    }

    /// Log a hand-off. The assignment itself only changes on invocation.
    pub async fn on_agent_switched(&self, from_agent: &str, to_agent: &str, session_id: &str) -> Result<()> {
        let writer = self.writers.get_writer(session_id, &self.store).await?;
        self.append(
            &writer,
            LogRecord::AgentSwitch {
                session_id: session_id.to_string(),
                from_agent: from_agent.to_string(),
                to_agent: to_agent.to_string(),
                timestamp: self.now(),
            },
        )
        .await
    }

    pub async fn on_chat_message(&self, message: &ChatMessage, parts: &[MessagePart]) -> Result<()> {
        let session_id = message.session_id.as_str();
        let writer = self.writers.get_writer(session_id, &self.store).await?;

        let tokens = message.normalized_tokens();
        let thinking_loops = parts.iter().filter(|p| p.is_reasoning()).count() as u32;
        let latency = message.latency_ms();
        let token_sum = tokens.total();
        self.store.add_tokens(session_id, token_sum);

        let is_assistant = message.role == Role::Assistant;
        if is_assistant && token_sum == 0 {
            tracing::warn!(
                session_id,
                message_id = %message.id,
                "No tokens logged for assistant message"
            );
        }

        if is_assistant {
            self.append(
                &writer,
                LogRecord::AssistantTokens {
                    session_id: session_id.to_string(),
                    message_id: message.id.clone(),
                    input_tokens: tokens.input,
                    output_tokens: tokens.output,
                    reasoning_tokens: tokens.reasoning,
                    cache_read: tokens.cache.read,
                    cache_write: tokens.cache.write,
                    total: token_sum,
                    latency,
                    thinking_loops,
                    timestamp: self.now(),
                },
            )
            .await?;
        }

        self.append(
            &writer,
            LogRecord::Message {
                session_id: session_id.to_string(),
                id: message.id.clone(),
                role: message.role.clone(),
                tokens,
                latency,
                thinking_loops,
                content_length: message.content_length(),
                timestamp: self.now(),
            },
        )
        .await
    }

    /// Remember when a tool call started and what it was given. No record
    /// is written until the matching "after" event.
    pub fn on_tool_execute_before(&self, tool: &str, session_id: &str, call_id: &str, args: Value) {
        tracing::debug!(session_id, call_id, tool, "Tool call started");
        self.store
            .begin_tool_call(session_id, call_id, self.now(), args);
    }

    pub async fn on_tool_execute_after(
        &self,
        tool: &str,
        session_id: &str,
        call_id: &str,
        output: Value,
    ) -> Result<()> {
        let pending = self.store.take_tool_call(session_id, call_id);

        // Without an open log the call cannot be correlated to anything.
        let Some(writer) = self.writers.existing_writer(session_id).await else {
            tracing::debug!(session_id, call_id, tool, "No session log for tool result; dropped");
            return Ok(());
        };

        let now = self.now();
        let (execution_time, input) = match pending {
            Some(pending) => (now - pending.started_at, pending.input),
            None => {
                tracing::warn!(session_id, call_id, tool, "Tool result without a recorded start");
                (0, json!({}))
            }
        };

        self.append(
            &writer,
            LogRecord::ToolExecution {
                session_id: session_id.to_string(),
                name: tool.to_string(),
                call_id: call_id.to_string(),
                execution_time,
                input,
                output,
                timestamp: now,
            },
        )
        .await
    }

    pub async fn on_generic_event(&self, event: &GenericEvent) -> Result<()> {
        if self
            .ingest
            .skip_event_types
            .iter()
            .any(|t| *t == event.event_type)
        {
            return Ok(());
        }

        let session_id = extract_session_id(&event.properties);
        let is_idle = event.event_type == self.ingest.idle_event_type;

        // Idle never opens a log: a finished or unknown session stays closed.
        let writer = if is_idle {
            self.writers.existing_writer(&session_id).await
        } else {
            Some(self.writers.get_writer(&session_id, &self.store).await?)
        };

        if let Some(writer) = writer {
            self.append(
                &writer,
                LogRecord::Event {
                    session_id: session_id.clone(),
                    event_type: event.event_type.clone(),
                    properties: event.properties.clone(),
                    timestamp: self.now(),
                },
            )
            .await?;
        }

        if is_idle {
            self.finalize_session(&session_id).await?;
        }
        Ok(())
    }
}
