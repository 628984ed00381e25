use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracker_core::config::TrackerConfig;
use tracker_core::event_bus::EventBus;
use tracker_core::host::StaticHostClient;
use tracker_core::types::HostEvent;
use tracker_plugin::{PerformanceTracker, RunStats};

/// Outcome of replaying one recorded event file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    pub parsed: usize,
    pub skipped: usize,
    pub stats: RunStats,
    /// Sessions still open at the end of the file.
    pub unfinished: usize,
}

/// Parse host events from JSON lines. Blank lines are ignored and lines that
/// do not parse are skipped with a warning.
pub fn parse_events(contents: &str) -> (Vec<HostEvent>, usize) {
    let mut events = Vec::new();
    let mut skipped = 0;
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<HostEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => {
                skipped += 1;
                tracing::warn!(line = index + 1, "Skipping unreadable event: {e}");
            }
        }
    }
    (events, skipped)
}

/// Feed a recorded event file through a tracker writing to the configured
/// log directory.
pub async fn run(config: &TrackerConfig, path: &Path) -> Result<ReplayReport> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read events from {}", path.display()))?;
    let (events, skipped) = parse_events(&contents);
    let parsed = events.len();

    let host = Arc::new(StaticHostClient::from_config(config)?);
    let tracker = PerformanceTracker::from_config(config, host);

    // Sized to hold the whole file so the tracker never lags behind.
    let bus = EventBus::with_capacity(parsed);
    let receiver = bus.subscribe();
    for event in events {
        bus.publish(event)
            .map_err(|_| anyhow::anyhow!("event bus has no subscriber"))?;
    }
    drop(bus);

    let stats = tracker.run(receiver).await;
    let unfinished = tracker.shutdown().await;

    tracing::info!(
        parsed,
        skipped,
        handled = stats.handled,
        failed = stats.failed,
        unfinished,
        "Replay finished"
    );

    Ok(ReplayReport {
        parsed,
        skipped,
        stats,
        unfinished,
    })
}
