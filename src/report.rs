//! Run timing and the final per-repository summary

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};

use crate::notify::{code_span, escape_markdown};
use crate::sync::{RepoReport, SyncSummary};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Wall-clock start and end of a run in a fixed civil offset
#[derive(Debug, Clone)]
pub struct RunTimer {
    offset: FixedOffset,
    start: DateTime<FixedOffset>,
    end: Option<DateTime<FixedOffset>>,
}

impl RunTimer {
    pub fn start(offset: FixedOffset) -> Self {
        Self {
            offset,
            start: Utc::now().with_timezone(&offset),
            end: None,
        }
    }

    /// Timer with explicit timestamps
    pub fn from_times(start: DateTime<FixedOffset>, end: Option<DateTime<FixedOffset>>) -> Self {
        Self {
            offset: *start.offset(),
            start,
            end,
        }
    }

    pub fn finish(&mut self) {
        self.end = Some(Utc::now().with_timezone(&self.offset));
    }

    pub fn start_time(&self) -> DateTime<FixedOffset> {
        self.start
    }

    pub fn end_time(&self) -> Option<DateTime<FixedOffset>> {
        self.end
    }

    /// End minus start, or zero while the run is still going
    pub fn elapsed(&self) -> TimeDelta {
        self.end
            .map(|end| end - self.start)
            .unwrap_or_else(TimeDelta::zero)
    }

    pub fn start_str(&self) -> String {
        self.start.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end
            .map(|end| end.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

/// `H:MM:SS`, hours unpadded. Negative spans (clock steps) clamp to zero.
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let secs = elapsed.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Everything the end of a run reports
#[derive(Debug, Clone)]
pub struct RunReport {
    pub title: String,
    pub timer: RunTimer,
    pub summary: SyncSummary,
}

impl RunReport {
    pub fn new(title: impl Into<String>, timer: RunTimer, reports: Vec<RepoReport>) -> Self {
        Self {
            title: title.into(),
            timer,
            summary: SyncSummary::from_reports(reports),
        }
    }

    pub fn duration_str(&self) -> String {
        format_elapsed(self.timer.elapsed())
    }

    /// Plain text summary for the terminal
    pub fn render_table(&self) -> String {
        let mut out = String::from("===== SUMMARY =====\n");

        let width = self
            .summary
            .reports
            .iter()
            .map(|r| r.repo_name.chars().count())
            .max()
            .unwrap_or(0);

        for report in &self.summary.reports {
            out.push_str(&format!(
                "{:>3}. {:<width$}  {}\n",
                report.index,
                report.repo_name,
                report.outcome.label(),
                width = width
            ));
            if let Some(diagnostic) = report.outcome.diagnostic() {
                for line in diagnostic.lines().filter(|l| !l.trim().is_empty()) {
                    out.push_str(&format!("       {}\n", line));
                }
            }
        }

        out.push_str(&format!(
            "\n{} of {} repositories pushed, {} failed\n",
            self.summary.successful_operations,
            self.summary.total_repositories,
            self.summary.failed_operations
        ));
        out.push_str(&format!("🕒 Start Time: {}\n", self.timer.start_str()));
        out.push_str(&format!("🕒 End Time:   {}\n", self.timer.end_str()));
        out.push_str(&format!("⏳ Duration:   {}", self.duration_str()));
        out
    }

    /// Markdown summary for the notification channel
    pub fn render_message(&self) -> String {
        let mut out = format!("📊 *{} Summary:*\n", escape_markdown(&self.title));

        for report in &self.summary.reports {
            out.push_str(&format!(
                "- {}: {}\n",
                escape_markdown(&report.repo_name),
                report.outcome.label()
            ));
        }

        out.push_str(&format!(
            "\n✅ {}/{} pushed",
            self.summary.successful_operations, self.summary.total_repositories
        ));
        out.push_str(&format!("\n\n🕒 Start: {}", code_span(&self.timer.start_str())));
        out.push_str(&format!("\n🕒 End: {}", code_span(&self.timer.end_str())));
        out.push_str(&format!("\n⏳ Duration: {}", code_span(&self.duration_str())));
        out
    }
}
