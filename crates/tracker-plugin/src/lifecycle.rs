//! Session finalization.

use crate::tracker::PerformanceTracker;
use std::path::PathBuf;
use tracker_core::error::Result;
use tracker_core::record::LogRecord;

impl PerformanceTracker {
    /// Write the closing summary for a session and release its log.
    ///
    /// A session without an open log is left alone and yields `Ok(None)`, so
    /// finalizing twice is harmless. If the host config cannot be fetched
    /// the error is returned and the session stays open for a later retry.
    pub async fn finalize_session(&self, session_id: &str) -> Result<Option<PathBuf>> {
        let Some(writer) = self.writers.existing_writer(session_id).await else {
            tracing::warn!(session_id, "No open log for session; nothing to finalize");
            return Ok(None);
        };

        let config = self.host.fetch_config().await?;
        let total_tokens = self.store.token_total(session_id).unwrap_or(0);
        let agents = self.store.agent_assignment(session_id).unwrap_or_default();

        self.append(
            &writer,
            LogRecord::SessionEnd {
                session_id: session_id.to_string(),
                total_tokens,
                primary_agent: agents.primary,
                subagent: agents.subagent,
                config,
                timestamp: self.now(),
            },
        )
        .await?;

        let path = self.writers.release_writer(session_id, &self.store).await?;
        tracing::info!(session_id, total_tokens, "Session finalized");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use crate::tracker::test_support::*;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;
    use tracker_core::record::LogRecord;
    use tracker_core::types::{AgentMode, HostEvent};

    fn event(value: serde_json::Value) -> HostEvent {
        serde_json::from_value(value).unwrap()
    }

    fn idle(session_id: &str) -> HostEvent {
        event(json!({
            "type": "event",
            "event": {"type": "session.idle", "properties": {"sessionID": session_id}}
        }))
    }

    #[tokio::test]
    async fn test_full_session_produces_five_records() {
        let temp = TempDir::new().unwrap();
        let fx = fixture(temp.path());
        let t = &fx.tracker;

        t.handle(event(json!({"type": "session.started", "sessionID": "ses_a1b2c3"})))
            .await
            .unwrap();
        t.handle(event(json!({
            "type": "chat.message",
            "message": {
                "id": "msg_1",
                "sessionID": "ses_a1b2c3",
                "role": "assistant",
                "tokens": {"input": 10, "output": 5},
                "time": {"created": 0, "completed": 100}
            },
            "parts": []
        })))
        .await
        .unwrap();
        t.handle(idle("ses_a1b2c3")).await.unwrap();

        let files = log_files(temp.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("1000-a1b2c3.log"));

        let records = read_records(temp.path());
        let types: Vec<&str> = records.iter().map(LogRecord::record_type).collect();
        assert_eq!(
            types,
            vec!["session_start", "assistant_tokens", "message", "event", "session_end"]
        );
        assert!(matches!(
            &records[1],
            LogRecord::AssistantTokens { total: 15, latency: 100, .. }
        ));
        let LogRecord::SessionEnd {
            total_tokens,
            config,
            ..
        } = &records[4]
        else {
            panic!("Expected SessionEnd, got {:?}", records[4]);
        };
        assert_eq!(*total_tokens, 15);
        assert_eq!(config, &json!({"model": "test-model"}));

        assert!(t.writers().open_sessions().await.is_empty());
        assert!(!t.store().has_session_state("ses_a1b2c3"));
    }

    #[tokio::test]
    async fn test_finalize_twice_is_noop() {
        let temp = TempDir::new().unwrap();
        let fx = fixture(temp.path());
        fx.tracker.on_session_start("ses_1").await.unwrap();

        let first = fx.tracker.finalize_session("ses_1").await.unwrap();
        assert!(first.is_some());
        let second = fx.tracker.finalize_session("ses_1").await.unwrap();
        assert!(second.is_none());

        let ends = read_records(temp.path())
            .iter()
            .filter(|r| r.record_type() == "session_end")
            .count();
        assert_eq!(ends, 1);
    }

    #[tokio::test]
    async fn test_config_failure_keeps_session_open() {
        let temp = TempDir::new().unwrap();
        let fx = fixture(temp.path());
        fx.tracker.on_session_start("ses_1").await.unwrap();
        fx.tracker.store().add_tokens("ses_1", 42);

        fx.host.fail.store(true, Ordering::SeqCst);
        assert!(fx.tracker.finalize_session("ses_1").await.is_err());
        assert_eq!(fx.tracker.writers().open_sessions().await, vec!["ses_1"]);
        assert_eq!(fx.tracker.store().token_total("ses_1"), Some(42));

        fx.host.fail.store(false, Ordering::SeqCst);
        fx.tracker.finalize_session("ses_1").await.unwrap();
        let records = read_records(temp.path());
        assert!(matches!(
            records.last(),
            Some(LogRecord::SessionEnd { total_tokens: 42, .. })
        ));
    }

    #[tokio::test]
    async fn test_session_end_carries_agents() {
        let temp = TempDir::new().unwrap();
        let fx = fixture(temp.path());
        let t = &fx.tracker;
        t.on_agent_invoked("build", AgentMode::Primary, "ses_1")
            .await
            .unwrap();
        t.on_agent_invoked("explore", AgentMode::Subagent, "ses_1")
            .await
            .unwrap();
        t.finalize_session("ses_1").await.unwrap();

        let records = read_records(temp.path());
        assert!(matches!(
            records.last(),
            Some(LogRecord::SessionEnd { primary_agent, subagent: Some(sub), .. })
                if primary_agent == "build" && sub == "explore"
        ));
    }

    #[tokio::test]
    async fn test_session_end_without_agents_is_empty() {
        let temp = TempDir::new().unwrap();
        let fx = fixture(temp.path());
        fx.tracker.on_session_start("ses_1").await.unwrap();
        fx.tracker.finalize_session("ses_1").await.unwrap();

        let records = read_records(temp.path());
        assert!(matches!(
            records.last(),
            Some(LogRecord::SessionEnd { primary_agent, subagent: None, .. }) if primary_agent.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_reused_session_starts_fresh() {
        let temp = TempDir::new().unwrap();
        let fx = fixture(temp.path());
        let t = &fx.tracker;
        t.on_session_start("ses_1").await.unwrap();
        t.store().add_tokens("ses_1", 100);
        t.finalize_session("ses_1").await.unwrap();

        fx.clock.set(2_000);
        t.on_session_start("ses_1").await.unwrap();
        assert_eq!(t.store().token_total("ses_1"), Some(0));
        assert_eq!(log_files(temp.path()).len(), 2);
    }
}
