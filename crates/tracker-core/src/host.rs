use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use async_trait::async_trait;
use serde_json::Value;

/// Calls the tracker makes back into its host.
#[async_trait]
pub trait HostClient: Send + Sync {
    /// Fetch the host's current configuration as an opaque snapshot.
    async fn fetch_config(&self) -> Result<Value>;
}

/// Host client that reports a fixed snapshot of the tracker's own configuration.
///
/// Used when the tracker runs standalone (e.g. replaying recorded events).
pub struct StaticHostClient {
    snapshot: Value,
}

impl StaticHostClient {
    pub fn new(snapshot: Value) -> Self {
        Self { snapshot }
    }

    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        let snapshot = serde_json::to_value(config)
            .map_err(|e| TrackerError::HostConfig(format!("cannot snapshot config: {e}")))?;
        Ok(Self::new(snapshot))
    }
}

#[async_trait]
impl HostClient for StaticHostClient {
    async fn fetch_config(&self) -> Result<Value> {
        Ok(self.snapshot.clone())
    }
}
