//! Aggregations over loaded session log records.
//!
//! Every query takes a [`TimeRange`] and looks only at records at or after
//! its cutoff. Results are plain serializable structs; rendering lives in
//! `reports.rs`.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracker_core::clock::{Clock, SystemClock};
use tracker_core::error::Result;
use tracker_core::record::LogRecord;
use tracker_core::types::{AgentMode, Role};

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Window of records a query looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "last_24h")]
    Last24h,
    #[serde(rename = "last_7d")]
    Last7d,
    #[serde(rename = "last_30d")]
    Last30d,
}

impl TimeRange {
    /// Inclusive lower bound in epoch milliseconds, `None` for `All`.
    pub fn cutoff(self, now_ms: i64) -> Option<i64> {
        match self {
            Self::All => None,
            Self::Last24h => Some(now_ms - DAY_MS),
            Self::Last7d => Some(now_ms - 7 * DAY_MS),
            Self::Last30d => Some(now_ms - 30 * DAY_MS),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Last24h => "last_24h",
            Self::Last7d => "last_7d",
            Self::Last30d => "last_30d",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "last_24h" => Ok(Self::Last24h),
            "last_7d" => Ok(Self::Last7d),
            "last_30d" => Ok(Self::Last30d),
            other => Err(format!(
                "unknown time range '{other}' (expected all, last_24h, last_7d or last_30d)"
            )),
        }
    }
}

/// How a query result is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
    Chart,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "chart" => Ok(Self::Chart),
            other => Err(format!(
                "unknown output format '{other}' (expected json, text or chart)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Distinct sessions that reached `session_end`.
    pub total_sessions: usize,
    /// Assistant messages.
    pub total_messages: usize,
    pub total_tokens: u64,
    /// Mean latency in ms over assistant messages with a known latency.
    pub avg_response_time: f64,
    pub total_tool_executions: usize,
    pub time_range: TimeRange,
    pub generated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPoint {
    pub timestamp: i64,
    pub total_tokens: u64,
    pub session_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenSeries {
    pub time_series: Vec<TokenPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencyPoint {
    pub timestamp: i64,
    pub latency: i64,
    pub session_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseTimes {
    pub time_series: Vec<LatencyPoint>,
    /// `None` when the series is empty.
    pub average_latency: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolStats {
    pub count: u64,
    pub total_time: i64,
    pub avg_time: f64,
}

impl ToolStats {
    fn record(&mut self, execution_time: i64) {
        self.count += 1;
        self.total_time += execution_time;
        self.avg_time = self.total_time as f64 / self.count as f64;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolPerformance {
    pub tool_performance: BTreeMap<String, ToolStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSwitchEntry {
    pub timestamp: i64,
    pub from: String,
    pub to: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentUsage {
    pub primary_agents: BTreeMap<String, u64>,
    /// Every non-primary invocation, keyed by agent name.
    pub subagents: BTreeMap<String, u64>,
    pub switches: Vec<AgentSwitchEntry>,
}

/// Token totals for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTokenUsage {
    pub date: NaiveDate,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_tokens: u64,
    pub cache_read: u64,
    pub cache_write: u64,
    pub total_tokens: u64,
}

impl DailyTokenUsage {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            input_tokens: 0,
            output_tokens: 0,
            reasoning_tokens: 0,
            cache_read: 0,
            cache_write: 0,
            total_tokens: 0,
        }
    }
}

/// Query engine over a loaded set of records.
pub struct AnalyticsEngine {
    records: Vec<LogRecord>,
    clock: Arc<dyn Clock>,
}

impl AnalyticsEngine {
    pub fn new(records: Vec<LogRecord>) -> Self {
        Self::with_clock(records, Arc::new(SystemClock))
    }

    pub fn with_clock(records: Vec<LogRecord>, clock: Arc<dyn Clock>) -> Self {
        Self { records, clock }
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    fn in_range(&self, range: TimeRange) -> impl Iterator<Item = &LogRecord> {
        let cutoff = range.cutoff(self.clock.now_ms());
        self.records
            .iter()
            .filter(move |r| cutoff.map_or(true, |c| r.timestamp() >= c))
    }

    /// Assistant messages that carry a positive latency.
    fn assistant_latencies(&self, range: TimeRange) -> impl Iterator<Item = LatencyPoint> + '_ {
        self.in_range(range).filter_map(|r| match r {
            LogRecord::Message {
                role: Role::Assistant,
                latency,
                session_id,
                timestamp,
                ..
            } if *latency > 0 => Some(LatencyPoint {
                timestamp: *timestamp,
                latency: *latency,
                session_id: session_id.clone(),
            }),
            _ => None,
        })
    }

    pub fn summary(&self, range: TimeRange) -> Summary {
        let mut ended: HashSet<&str> = HashSet::new();
        let mut total_messages = 0;
        let mut total_tokens = 0;
        let mut total_tool_executions = 0;

        for record in self.in_range(range) {
            match record {
                LogRecord::SessionEnd {
                    session_id,
                    total_tokens: tokens,
                    ..
                } => {
                    ended.insert(session_id.as_str());
                    total_tokens += tokens;
                }
                LogRecord::Message {
                    role: Role::Assistant,
                    ..
                } => total_messages += 1,
                LogRecord::ToolExecution { .. } => total_tool_executions += 1,
                _ => {}
            }
        }

        Summary {
            total_sessions: ended.len(),
            total_messages,
            total_tokens,
            avg_response_time: mean(self.assistant_latencies(range).map(|p| p.latency)).unwrap_or(0.0),
            total_tool_executions,
            time_range: range,
            generated_at: self.clock.now_ms(),
        }
    }

    pub fn token_series(&self, range: TimeRange) -> TokenSeries {
        let time_series = self
            .in_range(range)
            .filter_map(|r| match r {
                LogRecord::AssistantTokens {
                    session_id,
                    total,
                    timestamp,
                    ..
                } => Some(TokenPoint {
                    timestamp: *timestamp,
                    total_tokens: *total,
                    session_id: session_id.clone(),
                }),
                _ => None,
            })
            .collect();
        TokenSeries { time_series }
    }

    pub fn response_times(&self, range: TimeRange) -> ResponseTimes {
        let time_series: Vec<LatencyPoint> = self.assistant_latencies(range).collect();
        let average_latency = mean(time_series.iter().map(|p| p.latency));
        ResponseTimes {
            time_series,
            average_latency,
        }
    }

    pub fn tool_performance(&self, range: TimeRange) -> ToolPerformance {
        let mut tool_performance: BTreeMap<String, ToolStats> = BTreeMap::new();
        for record in self.in_range(range) {
            if let LogRecord::ToolExecution {
                name,
                execution_time,
                ..
            } = record
            {
                tool_performance
                    .entry(name.clone())
                    .or_default()
                    .record(*execution_time);
            }
        }
        ToolPerformance { tool_performance }
    }

    pub fn agent_usage(&self, range: TimeRange) -> AgentUsage {
        let mut usage = AgentUsage::default();
        for record in self.in_range(range) {
            match record {
                LogRecord::AgentInvocation {
                    agent_name,
                    agent_mode,
                    ..
                } => {
                    let counts = if *agent_mode == AgentMode::Primary {
                        &mut usage.primary_agents
                    } else {
                        &mut usage.subagents
                    };
                    *counts.entry(agent_name.clone()).or_insert(0) += 1;
                }
                LogRecord::AgentSwitch {
                    session_id,
                    from_agent,
                    to_agent,
                    timestamp,
                } => usage.switches.push(AgentSwitchEntry {
                    timestamp: *timestamp,
                    from: from_agent.clone(),
                    to: to_agent.clone(),
                    session_id: session_id.clone(),
                }),
                _ => {}
            }
        }
        usage
    }

    /// Per-day token totals of assistant messages, oldest first.
    ///
    /// Messages that used no tokens are left out.
    pub fn daily_token_usage(&self, range: TimeRange) -> Vec<DailyTokenUsage> {
        let mut days: BTreeMap<NaiveDate, DailyTokenUsage> = BTreeMap::new();
        for record in self.in_range(range) {
            let LogRecord::AssistantTokens {
                input_tokens,
                output_tokens,
                reasoning_tokens,
                cache_read,
                cache_write,
                timestamp,
                ..
            } = record
            else {
                continue;
            };
            let total = input_tokens + output_tokens + reasoning_tokens + cache_read + cache_write;
            if total == 0 {
                continue;
            }
            let Some(date) = DateTime::from_timestamp_millis(*timestamp).map(|t| t.date_naive())
            else {
                tracing::debug!(timestamp, "Timestamp out of range; skipped");
                continue;
            };

            let day = days.entry(date).or_insert_with(|| DailyTokenUsage::new(date));
            day.input_tokens += input_tokens;
            day.output_tokens += output_tokens;
            day.reasoning_tokens += reasoning_tokens;
            day.cache_read += cache_read;
            day.cache_write += cache_write;
            day.total_tokens += total;
        }
        days.into_values().collect()
    }
}

fn mean(values: impl Iterator<Item = i64>) -> Option<f64> {
    let (sum, count) = values.fold((0i64, 0u64), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum as f64 / count as f64)
}

/// Write daily usage as CSV with a header row, oldest first.
pub fn write_daily_csv<W: io::Write>(rows: &[DailyTokenUsage], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row).map_err(io::Error::from)?;
    }
    csv.flush()?;
    Ok(())
}

/// Write daily usage as CSV to `path`, replacing any existing file.
pub fn export_daily_csv(rows: &[DailyTokenUsage], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_daily_csv(rows, file)?;
    tracing::info!(path = %path.display(), days = rows.len(), "Wrote daily token usage");
    Ok(())
}
