//! The performance tracker: turns host events into per-session log records.
//!
//! Handlers live in `ingest.rs`, session finalization in `lifecycle.rs`.
//! Events for one session are expected in order, one at a time; [`run`]
//! consumes the event bus sequentially to provide exactly that.
//!
//! [`run`]: PerformanceTracker::run

use crate::correlation::CorrelationStore;
use crate::writer::{SessionWriterManager, WriterHandle};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracker_core::clock::{Clock, SystemClock};
use tracker_core::config::{IngestConfig, TrackerConfig};
use tracker_core::error::Result;
use tracker_core::event_bus::Envelope;
use tracker_core::host::HostClient;
use tracker_core::record::LogRecord;
use tracker_core::types::HostEvent;

/// Counters reported when an event loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub handled: u64,
    pub failed: u64,
    /// Events the bus dropped because the tracker fell behind.
    pub dropped: u64,
}

pub struct PerformanceTracker {
    pub(crate) store: Arc<CorrelationStore>,
    pub(crate) writers: SessionWriterManager,
    pub(crate) host: Arc<dyn HostClient>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ingest: IngestConfig,
}

impl PerformanceTracker {
    pub fn new(
        config: &TrackerConfig,
        store: Arc<CorrelationStore>,
        host: Arc<dyn HostClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let writers = SessionWriterManager::new(
            config.log_dir(),
            config.logging.file_extension.clone(),
            Arc::clone(&clock),
        );
        Self {
            store,
            writers,
            host,
            clock,
            ingest: config.ingest.clone(),
        }
    }

    /// Tracker on the system clock with a fresh correlation store.
    pub fn from_config(config: &TrackerConfig, host: Arc<dyn HostClient>) -> Self {
        Self::new(
            config,
            Arc::new(CorrelationStore::new()),
            host,
            Arc::new(SystemClock),
        )
    }

    pub fn store(&self) -> &CorrelationStore {
        &self.store
    }

    pub fn writers(&self) -> &SessionWriterManager {
        &self.writers
    }

    /// Route one host event to its handler.
    pub async fn handle(&self, event: HostEvent) -> Result<()> {
        match event {
            HostEvent::SessionStarted { session_id } => self.on_session_start(&session_id).await,
            HostEvent::AgentInvoked {
                agent,
                mode,
                session_id,
            } => self.on_agent_invoked(&agent, mode, &session_id).await,
            HostEvent::AgentSwitched {
                from_agent,
                to_agent,
                session_id,
            } => {
                self.on_agent_switched(&from_agent, &to_agent, &session_id)
                    .await
            }
            HostEvent::ChatMessage { message, parts } => {
                self.on_chat_message(&message, &parts).await
            }
            HostEvent::ToolExecuteBefore {
                tool,
                session_id,
                call_id,
                args,
            } => {
                self.on_tool_execute_before(&tool, &session_id, &call_id, args);
                Ok(())
            }
            HostEvent::ToolExecuteAfter {
                tool,
                session_id,
                call_id,
                output,
            } => {
                self.on_tool_execute_after(&tool, &session_id, &call_id, output)
                    .await
            }
            HostEvent::Generic { event } => self.on_generic_event(&event).await,
        }
    }

    /// Consume events until the bus closes.
    ///
    /// A failing event is logged and does not stop the loop.
    pub async fn run(&self, mut events: broadcast::Receiver<Envelope>) -> RunStats {
        let mut stats = RunStats::default();
        loop {
            match events.recv().await {
                Ok(envelope) => {
                    let kind = envelope.event.kind().to_string();
                    let received_at = envelope.received_at;
                    match self.handle(envelope.event).await {
                        Ok(()) => stats.handled += 1,
                        Err(e) => {
                            stats.failed += 1;
                            tracing::warn!(
                                event = %kind,
                                received_at = %received_at.to_rfc3339(),
                                "Failed to handle event: {e}"
                            );
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    stats.dropped += skipped;
                    tracing::warn!(skipped, "Tracker fell behind the event bus; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        stats
    }

    /// Close every open session log without finalizing it.
    pub async fn shutdown(&self) -> usize {
        let closed = self.writers.shutdown_all(&self.store).await;
        if closed > 0 {
            tracing::info!(closed, "Closed open session logs");
        }
        let pending = self.store.pending_tool_calls();
        if pending > 0 {
            tracing::debug!(pending, "Tool calls never completed");
        }
        closed
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    pub(crate) async fn append(&self, handle: &WriterHandle, record: LogRecord) -> Result<()> {
        handle.lock().await.write(&record).await
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use tracker_core::event_bus::EventBus;
    use tracker_core::types::GenericEvent;

    fn started(id: &str) -> HostEvent {
        HostEvent::SessionStarted {
            session_id: id.into(),
        }
    }

    fn idle(id: &str) -> HostEvent {
        HostEvent::Generic {
            event: GenericEvent {
                event_type: "session.idle".into(),
                properties: json!({"sessionID": id}),
            },
        }
    }

    #[tokio::test]
    async fn test_handle_routes_json_events() {
        let temp = TempDir::new().unwrap();
        let fx = fixture(temp.path());

        let raw = [
            json!({"type": "session.started", "sessionID": "ses_a1b2c3"}),
            json!({"type": "agent.invoked", "agent": "build", "mode": "primary", "sessionID": "ses_a1b2c3"}),
            json!({"type": "agent.switched", "fromAgent": "build", "toAgent": "plan", "sessionID": "ses_a1b2c3"}),
        ];
        for value in raw {
            let event: HostEvent = serde_json::from_value(value).unwrap();
            fx.tracker.handle(event).await.unwrap();
        }

        let types: Vec<&str> = read_records(temp.path())
            .iter()
            .map(LogRecord::record_type)
            .collect::<Vec<_>>();
        assert_eq!(types, vec!["session_start", "agent_invocation", "agent_switch"]);
    }

    #[tokio::test]
    async fn test_unrecognized_agent_mode_is_logged_verbatim() {
        let temp = TempDir::new().unwrap();
        let fx = fixture(temp.path());

        let event: HostEvent = serde_json::from_value(json!({
            "type": "agent.invoked",
            "agent": "build",
            "mode": "all",
            "sessionID": "ses_a1b2c3"
        }))
        .unwrap();
        fx.tracker.handle(event).await.unwrap();

        let files = log_files(temp.path());
        let contents = std::fs::read_to_string(&files[0]).unwrap();
        assert!(contents.contains(r#""agent_mode":"all""#));
        // The store ignores modes it does not distinguish.
        let assignment = fx.tracker.store().agent_assignment("ses_a1b2c3").unwrap();
        assert_eq!(assignment.subagent, None);
    }

    #[tokio::test]
    async fn test_run_consumes_bus_in_order() {
        let temp = TempDir::new().unwrap();
        let fx = fixture(temp.path());
        let bus = EventBus::with_capacity(16);
        let rx = bus.subscribe();

        bus.publish(started("ses_000001")).unwrap();
        bus.publish(idle("ses_000001")).unwrap();
        // Idle for a session that was never seen: handled, but writes nothing.
        bus.publish(idle("ses_ffffff")).unwrap();
        drop(bus);

        let stats = fx.tracker.run(rx).await;
        assert_eq!(
            stats,
            RunStats {
                handled: 3,
                failed: 0,
                dropped: 0
            }
        );

        let types: Vec<&str> = read_records(temp.path())
            .iter()
            .map(LogRecord::record_type)
            .collect::<Vec<_>>();
        assert_eq!(types, vec!["session_start", "event", "session_end"]);
        assert_eq!(log_files(temp.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_run_counts_failures() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let fx = fixture(&blocker.join("logs"));

        let bus = EventBus::with_capacity(4);
        let rx = bus.subscribe();
        bus.publish(started("ses_1")).unwrap();
        drop(bus);

        let stats = fx.tracker.run(rx).await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.handled, 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_open_sessions() {
        let temp = TempDir::new().unwrap();
        let fx = fixture(temp.path());
        fx.tracker.handle(started("ses_1")).await.unwrap();
        fx.tracker.handle(started("ses_2")).await.unwrap();

        assert_eq!(fx.tracker.shutdown().await, 2);
        assert!(fx.tracker.writers().open_sessions().await.is_empty());
        assert!(!fx.tracker.store().has_session_state("ses_1"));
        // No session_end is written on shutdown.
        assert!(read_records(temp.path())
            .iter()
            .all(|r| r.record_type() == "session_start"));
    }
}
