//! Analytics over perf-tracker session logs.
//!
//! Loads the per-session JSON-lines files written by the tracker and computes
//! summaries, token and latency time series, tool and agent breakdowns, and
//! daily token usage, with text, chart, markdown and CSV renderings.

pub mod aggregations;
pub mod loader;
pub mod reports;

pub use aggregations::{
    export_daily_csv, write_daily_csv, AgentUsage, AnalyticsEngine, DailyTokenUsage,
    OutputFormat, ResponseTimes, Summary, TimeRange, TokenSeries, ToolPerformance, ToolStats,
};
pub use loader::{load_logs, LogLoader};
pub use reports::{ReportGenerator, ReportKind, NO_CHART_DATA};
