//! Session event logger.
//!
//! [`PerformanceTracker`] consumes host events, correlates tool calls,
//! token counts and agent hand-offs per session, and writes each session
//! as one append-only JSON-lines file. A session is finalized on the host's
//! idle event with a `session_end` summary record.

mod correlation;
mod ingest;
mod lifecycle;
mod tracker;
mod writer;

pub use correlation::{AgentAssignment, CorrelationStore, PendingToolCall};
pub use tracker::{PerformanceTracker, RunStats};
pub use writer::{SessionWriter, SessionWriterManager, WriterHandle};
