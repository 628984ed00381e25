//! Shared building blocks for perf-tracker: the inbound host event contract,
//! the persisted log record format, configuration, clock, and errors.

pub mod clock;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod host;
pub mod record;
pub mod session_id;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use event_bus::{Envelope, EventBus};
pub use host::{HostClient, StaticHostClient};
pub use record::{LogRecord, UNKNOWN_SESSION};
pub use types::HostEvent;
