//! Text and ASCII chart rendering of analytics results.
//!
//! Everything here is a pure function of its input and never panics on
//! empty data.

use crate::aggregations::{
    AgentUsage, AnalyticsEngine, DailyTokenUsage, OutputFormat, ResponseTimes, Summary,
    TimeRange, TokenSeries, ToolPerformance,
};
use chrono::DateTime;
use serde::Serialize;
use tracker_core::error::Result;

/// Shown instead of a chart when there is nothing to plot.
pub const NO_CHART_DATA: &str = "No data available for chart";

/// The analytics queries available as reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Summary,
    Tokens,
    ResponseTimes,
    Tools,
    Agents,
    Daily,
}

/// Report generator for text and chart output.
pub struct ReportGenerator {
    chart_width: usize,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(50)
    }
}

impl ReportGenerator {
    pub fn new(chart_width: usize) -> Self {
        Self { chart_width }
    }

    /// Run one query and render it in the requested format.
    ///
    /// Time series render as a chart for both `text` and `chart`; the other
    /// reports render as text for both.
    pub fn render(
        &self,
        engine: &AnalyticsEngine,
        kind: ReportKind,
        range: TimeRange,
        format: OutputFormat,
    ) -> Result<String> {
        match kind {
            ReportKind::Summary => {
                let summary = engine.summary(range);
                self.format_or_json(format, &summary, |s| self.summary_text(s))
            }
            ReportKind::Tokens => {
                let series = engine.token_series(range);
                self.format_or_json(format, &series, |s| self.token_chart(s))
            }
            ReportKind::ResponseTimes => {
                let times = engine.response_times(range);
                self.format_or_json(format, &times, |t| self.response_time_chart(t))
            }
            ReportKind::Tools => {
                let perf = engine.tool_performance(range);
                self.format_or_json(format, &perf, |p| self.tool_table(p))
            }
            ReportKind::Agents => {
                let usage = engine.agent_usage(range);
                self.format_or_json(format, &usage, |u| self.agent_text(u))
            }
            ReportKind::Daily => {
                let days = engine.daily_token_usage(range);
                self.format_or_json(format, &days, |d| self.daily_table(d))
            }
        }
    }

    fn format_or_json<T: Serialize + ?Sized>(
        &self,
        format: OutputFormat,
        value: &T,
        text: impl FnOnce(&T) -> String,
    ) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
            OutputFormat::Text | OutputFormat::Chart => Ok(text(value)),
        }
    }

    pub fn summary_text(&self, summary: &Summary) -> String {
        let generated = DateTime::from_timestamp_millis(summary.generated_at)
            .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
            .unwrap_or_else(|| summary.generated_at.to_string());

        let mut output = String::new();
        output.push_str("Performance Analytics Summary\n");
        output.push_str("=============================\n");
        output.push_str(&format!("Time Range: {}\n", summary.time_range));
        output.push_str(&format!("Generated: {}\n\n", generated));
        output.push_str(&format!("Sessions: {}\n", summary.total_sessions));
        output.push_str(&format!("Messages: {}\n", summary.total_messages));
        output.push_str(&format!(
            "Total Tokens: {}\n",
            format_thousands(summary.total_tokens)
        ));
        output.push_str(&format!(
            "Average Response Time: {:.1}ms\n",
            summary.avg_response_time
        ));
        output.push_str(&format!(
            "Tool Executions: {}",
            summary.total_tool_executions
        ));
        output
    }

    pub fn token_chart(&self, series: &TokenSeries) -> String {
        let points: Vec<(i64, f64)> = series
            .time_series
            .iter()
            .map(|p| (p.timestamp, p.total_tokens as f64))
            .collect();
        self.ascii_chart("Token Usage Over Time", &points)
    }

    pub fn response_time_chart(&self, times: &ResponseTimes) -> String {
        let points: Vec<(i64, f64)> = times
            .time_series
            .iter()
            .map(|p| (p.timestamp, p.latency as f64))
            .collect();
        self.ascii_chart("Response Times Over Time", &points)
    }

    /// Horizontal bar chart, one `(epoch ms, value)` point per line.
    ///
    /// The largest value gets a bar of `chart_width` blocks.
    pub fn ascii_chart(&self, title: &str, points: &[(i64, f64)]) -> String {
        if points.is_empty() {
            return NO_CHART_DATA.to_string();
        }

        let max = points.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
        let mut chart = format!("{}\n{}\n", title, "=".repeat(title.chars().count()));
        for (timestamp, value) in points {
            let bar_len = if max > 0.0 {
                ((value / max) * self.chart_width as f64).round().max(0.0) as usize
            } else {
                0
            };
            chart.push_str(&format!(
                "{}: {} {}\n",
                time_label(*timestamp),
                "█".repeat(bar_len),
                value
            ));
        }
        chart
    }

    pub fn tool_table(&self, perf: &ToolPerformance) -> String {
        if perf.tool_performance.is_empty() {
            return "No tool executions recorded\n".to_string();
        }

        let mut rows: Vec<_> = perf.tool_performance.iter().collect();
        rows.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));

        let name_width = rows
            .iter()
            .map(|(name, _)| name.chars().count())
            .max()
            .unwrap_or(0)
            .max("Tool".len());

        let mut output = format!(
            "{:<name_width$}  {:>6}  {:>10}  {:>10}\n",
            "Tool", "Calls", "Total ms", "Avg ms"
        );
        output.push_str(&format!("{}\n", "-".repeat(name_width + 32)));
        for (name, stats) in rows {
            output.push_str(&format!(
                "{:<name_width$}  {:>6}  {:>10}  {:>10.1}\n",
                name, stats.count, stats.total_time, stats.avg_time
            ));
        }
        output
    }

    pub fn agent_text(&self, usage: &AgentUsage) -> String {
        let mut output = String::new();

        output.push_str("Primary agents:\n");
        push_counts(&mut output, &usage.primary_agents);
        output.push_str("Subagents:\n");
        push_counts(&mut output, &usage.subagents);

        output.push_str(&format!("Agent switches: {}\n", usage.switches.len()));
        for switch in &usage.switches {
            output.push_str(&format!(
                "  {}  {} -> {} ({})\n",
                time_label(switch.timestamp),
                switch.from,
                switch.to,
                switch.session_id
            ));
        }
        output
    }

    /// Markdown table of daily token usage, most recent day first.
    pub fn daily_table(&self, days: &[DailyTokenUsage]) -> String {
        let mut table = String::from(
            "| Date | Input Tokens | Output Tokens | Reasoning Tokens | Cache Read | Cache Write | Total Tokens |\n",
        );
        table.push_str(
            "|------|--------------|---------------|------------------|------------|-------------|--------------|\n",
        );
        for day in days.iter().rev() {
            table.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} |\n",
                day.date,
                format_thousands(day.input_tokens),
                format_thousands(day.output_tokens),
                format_thousands(day.reasoning_tokens),
                format_thousands(day.cache_read),
                format_thousands(day.cache_write),
                format_thousands(day.total_tokens),
            ));
        }
        table
    }
}

fn push_counts(output: &mut String, counts: &std::collections::BTreeMap<String, u64>) {
    if counts.is_empty() {
        output.push_str("  (none)\n");
        return;
    }
    for (name, count) in counts {
        output.push_str(&format!("  {name}: {count}\n"));
    }
}

fn time_label(timestamp: i64) -> String {
    DateTime::from_timestamp_millis(timestamp)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Format an integer with `,` thousands separators.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregations::{LatencyPoint, ToolStats};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tracker_core::clock::ManualClock;
    use tracker_core::record::LogRecord;

    fn day(date: &str, total: u64) -> DailyTokenUsage {
        DailyTokenUsage {
            date: date.parse::<NaiveDate>().unwrap(),
            input_tokens: total,
            output_tokens: 0,
            reasoning_tokens: 0,
            cache_read: 0,
            cache_write: 0,
            total_tokens: total,
        }
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1_000), "1,000");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_empty_chart() {
        let reports = ReportGenerator::default();
        assert_eq!(reports.ascii_chart("Anything", &[]), NO_CHART_DATA);
        assert_eq!(
            reports.response_time_chart(&ResponseTimes::default()),
            NO_CHART_DATA
        );
    }

    #[test]
    fn test_chart_scales_to_width() {
        let reports = ReportGenerator::new(10);
        let chart = reports.ascii_chart("Latency", &[(0, 50.0), (1_000, 100.0), (2_000, 0.0)]);
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines[0], "Latency");
        assert_eq!(lines[1], "=======");
        assert_eq!(lines[2], format!("00:00:00: {} 50", "█".repeat(5)));
        assert_eq!(lines[3], format!("00:00:01: {} 100", "█".repeat(10)));
        assert_eq!(lines[4], "00:00:02:  0");
    }

    #[test]
    fn test_chart_with_all_zero_values() {
        let reports = ReportGenerator::default();
        let times = ResponseTimes {
            time_series: vec![LatencyPoint {
                timestamp: 0,
                latency: 0,
                session_id: "ses_1".into(),
            }],
            average_latency: Some(0.0),
        };
        assert!(reports.response_time_chart(&times).ends_with(":  0\n"));
    }

    #[test]
    fn test_summary_text() {
        let summary = Summary {
            total_sessions: 2,
            total_messages: 7,
            total_tokens: 12_345,
            avg_response_time: 150.26,
            total_tool_executions: 3,
            time_range: TimeRange::Last7d,
            generated_at: 0,
        };
        let text = ReportGenerator::default().summary_text(&summary);
        assert!(text.starts_with("Performance Analytics Summary\n"));
        assert!(text.contains("Time Range: last_7d"));
        assert!(text.contains("Generated: 1970-01-01T00:00:00.000Z"));
        assert!(text.contains("Total Tokens: 12,345"));
        assert!(text.contains("Average Response Time: 150.3ms"));
        assert!(text.ends_with("Tool Executions: 3"));
    }

    #[test]
    fn test_tool_table_orders_by_calls() {
        let mut perf = ToolPerformance::default();
        perf.tool_performance.insert(
            "read".into(),
            ToolStats {
                count: 1,
                total_time: 10,
                avg_time: 10.0,
            },
        );
        perf.tool_performance.insert(
            "bash".into(),
            ToolStats {
                count: 3,
                total_time: 300,
                avg_time: 100.0,
            },
        );
        let table = ReportGenerator::default().tool_table(&perf);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("Tool"));
        assert!(lines[2].starts_with("bash"));
        assert!(lines[3].starts_with("read"));
        assert!(lines[2].ends_with("100.0"));

        assert!(ReportGenerator::default()
            .tool_table(&ToolPerformance::default())
            .contains("No tool executions"));
    }

    #[test]
    fn test_agent_text() {
        let mut usage = AgentUsage::default();
        usage.primary_agents.insert("build".into(), 2);
        let text = ReportGenerator::default().agent_text(&usage);
        assert!(text.contains("  build: 2"));
        assert!(text.contains("Subagents:\n  (none)"));
        assert!(text.contains("Agent switches: 0"));
    }

    #[test]
    fn test_daily_table_most_recent_first() {
        let days = vec![day("2024-01-01", 1_500), day("2024-01-02", 20)];
        let table = ReportGenerator::default().daily_table(&days);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("| 2024-01-02 | 20 |"));
        assert!(lines[3].starts_with("| 2024-01-01 | 1,500 |"));
    }

    #[test]
    fn test_render_formats() {
        let records = vec![LogRecord::SessionEnd {
            session_id: "ses_1".into(),
            total_tokens: 15,
            primary_agent: "build".into(),
            subagent: None,
            config: serde_json::json!({}),
            timestamp: 1,
        }];
        let engine = AnalyticsEngine::with_clock(records, Arc::new(ManualClock::new(10)));
        let reports = ReportGenerator::default();

        let json = reports
            .render(&engine, ReportKind::Summary, TimeRange::All, OutputFormat::Json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_tokens"], 15);

        let text = reports
            .render(&engine, ReportKind::Summary, TimeRange::All, OutputFormat::Text)
            .unwrap();
        assert!(text.contains("Sessions: 1"));

        let chart = reports
            .render(&engine, ReportKind::Tokens, TimeRange::All, OutputFormat::Chart)
            .unwrap();
        assert_eq!(chart, NO_CHART_DATA);
    }
}
