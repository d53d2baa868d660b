//! Terminal rendering for engine types.
//!
//! Extension traits that add colored output to ade-sync-core types using
//! owo_colors.

use ade_sync_core::{
    Anomaly, EntryReport, OperationEntry, OperationKind, Outcome, ReconcilePlan, SyncResult,
    TimeWindow,
};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for OperationKind {
    fn render(&self) -> String {
        let symbol = self.to_string();
        match self {
            OperationKind::Create => symbol.green().to_string(),
            OperationKind::Update => symbol.yellow().to_string(),
            OperationKind::Delete => symbol.red().to_string(),
        }
    }
}

fn colorize(kind: OperationKind, text: &str) -> String {
    match kind {
        OperationKind::Create => text.green().to_string(),
        OperationKind::Update => text.yellow().to_string(),
        OperationKind::Delete => text.red().to_string(),
    }
}

impl Render for OperationEntry {
    fn render(&self) -> String {
        let kind = self.kind();
        match self.event() {
            Some(event) => {
                let time = format!(
                    "{} → {}",
                    event.start_time().format("%a %d %b %H:%M"),
                    event.end_time().format("%H:%M")
                );
                format!(
                    "{} {} {}",
                    kind.render(),
                    colorize(kind, event.title()),
                    time.dimmed()
                )
            }
            None => format!(
                "{} {}",
                kind.render(),
                colorize(kind, &format!("#{}", self.destination_id().unwrap_or_default()))
            ),
        }
    }
}

impl Render for TimeWindow {
    fn render(&self) -> String {
        format!(
            "📅 {} → {}",
            self.start().format("%Y-%m-%d"),
            self.end().format("%Y-%m-%d")
        )
    }
}

impl Render for Anomaly {
    fn render(&self) -> String {
        format!("{} {}", "!".yellow(), self.to_string().yellow())
    }
}

impl Render for EntryReport {
    fn render(&self) -> String {
        let mut line = self.operation.render();
        match &self.outcome {
            Outcome::Applied { .. } => {}
            Outcome::Skipped { reason } => {
                line.push_str(&format!(" {}", format!("(skipped: {reason})").dimmed()));
            }
            Outcome::Failed { failure } => {
                line.push_str(&format!(" {}", failure.to_string().red().bold()));
            }
        }
        if self.reclassified {
            line.push_str(&format!(" {}", "(recreated)".dimmed()));
        }
        if self.retries > 0 {
            line.push_str(&format!(" {}", format!("({} retries)", self.retries).dimmed()));
        }
        line
    }
}

/// Above this many operations, only counts are shown unless verbose.
const COMPACT_THRESHOLD: usize = 10;

fn pluralize(count: usize) -> &'static str {
    if count == 1 { "event" } else { "events" }
}

fn render_counts(operations: &[&OperationEntry], lines: &mut Vec<String>) {
    let count = |kind| operations.iter().filter(|op| op.kind() == kind).count();
    let labels = [
        (OperationKind::Create, "new"),
        (OperationKind::Update, "changed"),
        (OperationKind::Delete, "removed"),
    ];

    for (kind, label) in labels {
        let n = count(kind);
        if n > 0 {
            let text = format!("({n} {label} {})", pluralize(n));
            lines.push(format!("   {} {}", kind.render(), colorize(kind, &text)));
        }
    }
}

pub trait PlanRender {
    fn render(&self, verbose: bool) -> String;
}

impl PlanRender for ReconcilePlan {
    fn render(&self, verbose: bool) -> String {
        let mut lines = Vec::new();

        for anomaly in &self.anomalies {
            lines.push(format!("   {}", anomaly.render()));
        }

        if self.is_empty() {
            lines.push("   No changes".dimmed().to_string());
        } else if verbose || self.operations.len() <= COMPACT_THRESHOLD {
            for op in &self.operations {
                lines.push(format!("   {}", op.render()));
            }
        } else {
            let all: Vec<_> = self.operations.iter().collect();
            render_counts(&all, &mut lines);
        }

        if self.unchanged > 0 {
            lines.push(
                format!("   {} up to date", self.unchanged)
                    .dimmed()
                    .to_string(),
            );
        }

        lines.join("\n")
    }
}

pub trait ResultRender {
    fn render(&self, verbose: bool) -> String;
}

impl ResultRender for SyncResult {
    fn render(&self, verbose: bool) -> String {
        let mut lines = Vec::new();

        for anomaly in &self.anomalies {
            lines.push(format!("   {}", anomaly.render()));
        }

        if self.entries.is_empty() {
            lines.push("   No changes".dimmed().to_string());
        } else if verbose || self.entries.len() <= COMPACT_THRESHOLD {
            for entry in &self.entries {
                lines.push(format!("   {}", entry.render()));
            }
        } else {
            // Compact: counts for what went through, details for the rest
            let applied: Vec<_> = self
                .entries
                .iter()
                .filter(|e| e.outcome.is_applied())
                .map(|e| &e.operation)
                .collect();
            render_counts(&applied, &mut lines);
            for entry in self.entries.iter().filter(|e| !e.outcome.is_applied()) {
                lines.push(format!("   {}", entry.render()));
            }
        }

        let summary = self.summary.to_string();
        lines.push(String::new());
        lines.push(if self.summary.failed > 0 {
            summary.red().to_string()
        } else if self.summary.skipped > 0 {
            summary.yellow().to_string()
        } else {
            summary.green().to_string()
        });

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ade_sync_core::CanonicalEvent;
    use chrono::{TimeZone, Utc};

    fn create(id: &str) -> OperationEntry {
        OperationEntry::Create {
            event: CanonicalEvent::new(
                id,
                "Math 101",
                Utc.with_ymd_and_hms(2025, 9, 15, 7, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 9, 15, 9, 0, 0).unwrap(),
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_plan_compacts_long_lists() {
        let plan = ReconcilePlan {
            operations: (0..12).map(|i| create(&format!("e{i}"))).collect(),
            ..ReconcilePlan::default()
        };

        let compact = plan.render(false);
        assert!(compact.contains("12 new events"));
        assert!(!compact.contains("Math 101"));

        let full = plan.render(true);
        assert_eq!(full.matches("Math 101").count(), 12);
    }

    #[test]
    fn test_empty_plan() {
        let plan = ReconcilePlan {
            unchanged: 3,
            ..ReconcilePlan::default()
        };
        let text = plan.render(false);
        assert!(text.contains("No changes"));
        assert!(text.contains("3 up to date"));
    }
}
