//! Per-session append-only log writers.
//!
//! Each session gets one file, `<start ms>-<last 6 chars of id>.<ext>`,
//! opened lazily on the first event that needs it and closed when the
//! session is released. Every record is flushed and synced before the
//! write returns.

use crate::correlation::CorrelationStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracker_core::clock::Clock;
use tracker_core::error::{Result, TrackerError};
use tracker_core::record::LogRecord;
use tracker_core::session_id::short_session_id;

/// Shared handle to one session's writer.
pub type WriterHandle = Arc<Mutex<SessionWriter>>;

/// Append-only writer for one session's log file.
#[derive(Debug)]
pub struct SessionWriter {
    session_id: String,
    path: PathBuf,
    /// `None` once the session has been released.
    file: Option<File>,
    records_written: u64,
}

impl SessionWriter {
    /// Append one record and flush it to disk.
    pub async fn write(&mut self, record: &LogRecord) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| TrackerError::SessionClosed(self.session_id.clone()))?;
        let line = record.to_line()?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        self.records_written += 1;
        Ok(())
    }

    /// Flush and close the file. Further writes fail with `SessionClosed`.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

/// Owns every open session writer.
pub struct SessionWriterManager {
    log_dir: PathBuf,
    extension: String,
    clock: Arc<dyn Clock>,
    writers: Mutex<HashMap<String, WriterHandle>>,
}

impl SessionWriterManager {
    pub fn new(log_dir: impl Into<PathBuf>, extension: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            log_dir: log_dir.into(),
            extension: extension.into(),
            clock,
            writers: Mutex::new(HashMap::new()),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// File name for a session that started at `started_at`.
    ///
    /// The suffix is the last six characters of the session id, written
    /// as-is. Analytics only picks up files whose suffix is six lowercase
    /// hex characters, so logs for ids such as `unknown` (suffix `nknown`)
    /// or ids shorter than six characters are written but never loaded.
    pub fn file_name(&self, session_id: &str, started_at: i64) -> String {
        format!(
            "{}-{}.{}",
            started_at,
            short_session_id(session_id),
            self.extension
        )
    }

    /// Return the session's writer, opening its log file on first use.
    ///
    /// Opening a writer also resets the session's token tally to zero.
    pub async fn get_writer(&self, session_id: &str, store: &CorrelationStore) -> Result<WriterHandle> {
        // Held across the open so concurrent first events share one file.
        let mut writers = self.writers.lock().await;
        if let Some(handle) = writers.get(session_id) {
            return Ok(Arc::clone(handle));
        }

        fs::create_dir_all(&self.log_dir)
            .await
            .map_err(|source| TrackerError::LogDirectory {
                path: self.log_dir.clone(),
                source,
            })?;

        let started_at = store
            .session_start(session_id)
            .unwrap_or_else(|| self.clock.now_ms());
        let path = self.log_dir.join(self.file_name(session_id, started_at));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::debug!(session_id, path = %path.display(), "Opened session log");

        let handle = Arc::new(Mutex::new(SessionWriter {
            session_id: session_id.to_string(),
            path,
            file: Some(file),
            records_written: 0,
        }));
        writers.insert(session_id.to_string(), Arc::clone(&handle));
        store.init_token_tally(session_id);
        Ok(handle)
    }

    /// Return the session's writer only if one is already open.
    pub async fn existing_writer(&self, session_id: &str) -> Option<WriterHandle> {
        self.writers.lock().await.get(session_id).cloned()
    }

    /// Flush and close the session's writer and forget all of its state.
    ///
    /// Returns the path of the closed log, or `None` if nothing was open.
    pub async fn release_writer(
        &self,
        session_id: &str,
        store: &CorrelationStore,
    ) -> Result<Option<PathBuf>> {
        let handle = self.writers.lock().await.remove(session_id);
        store.purge_session(session_id);

        let Some(handle) = handle else {
            return Ok(None);
        };
        let mut writer = handle.lock().await;
        writer.close().await?;
        tracing::debug!(
            session_id,
            records = writer.records_written(),
            "Released session log"
        );
        Ok(Some(writer.path().to_path_buf()))
    }

    /// Close every open writer without finalizing its session.
    ///
    /// Returns the number of writers closed. Close failures are logged and
    /// do not stop the remaining writers from closing.
    pub async fn shutdown_all(&self, store: &CorrelationStore) -> usize {
        let drained: Vec<(String, WriterHandle)> = self.writers.lock().await.drain().collect();
        let count = drained.len();
        for (session_id, handle) in drained {
            store.purge_session(&session_id);
            if let Err(e) = handle.lock().await.close().await {
                tracing::warn!(session_id = %session_id, "Failed to close session log: {e}");
            }
        }
        count
    }

    /// Ids of all sessions with an open writer.
    pub async fn open_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.writers.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
