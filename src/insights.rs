//! Sprint metrics derived from a normalized table.
//!
//! Presentation-layer aggregation: sprint velocity, schedule status, risk
//! distribution, and per-task progress rows. This is the one place where
//! sentinel cells get zero-filled — the table layer keeps `NotANumber` and
//! `Absent` intact, and charting decides explicitly what a gap means.

use serde::Serialize;

use crate::table::{Cell, Table};

/// Ratio of actual effort to estimated effort; 0 when nothing was estimated.
pub fn velocity(total_actual: f64, total_estimate: f64) -> f64 {
    if total_estimate == 0.0 {
        0.0
    } else {
        total_actual / total_estimate
    }
}

/// Where the sprint sits against its estimate, with the gap broken into
/// whole hours and minutes for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScheduleStatus {
    OnTime,
    Behind { hours: u64, minutes: u64 },
    AheadOfTime { hours: u64, minutes: u64 },
}

pub fn schedule_status(total_estimate: f64, total_actual: f64) -> ScheduleStatus {
    let gap = total_estimate - total_actual;
    let total_minutes = (gap.abs() * 60.0).round() as u64;
    if total_minutes == 0 {
        return ScheduleStatus::OnTime;
    }
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if gap < 0.0 {
        ScheduleStatus::Behind { hours, minutes }
    } else {
        ScheduleStatus::AheadOfTime { hours, minutes }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleStatus::OnTime => write!(f, "On Time"),
            ScheduleStatus::Behind { hours, minutes } => {
                write!(f, "Behind Schedule by {}h {}m", hours, minutes)
            }
            ScheduleStatus::AheadOfTime { hours, minutes } => {
                write!(f, "Ahead of Time by {}h {}m", hours, minutes)
            }
        }
    }
}

// ============================================================================
// Risk distribution
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    NoRisk,
    NotYetIdentified,
    Risk,
}

/// Bucket a risks cell. Missing cells and the usual "nothing to report"
/// spellings count as no risk; anything unrecognized counts as a risk.
pub fn classify_risk(cell: &Cell) -> RiskLevel {
    let text = match cell {
        Cell::Text(s) => s.trim().to_lowercase(),
        Cell::Absent | Cell::NotANumber => String::new(),
        Cell::Number(_) => return RiskLevel::Risk,
    };
    match text.as_str() {
        "" | "no risks" | "no risk" | "nil" => RiskLevel::NoRisk,
        "not yet identified" => RiskLevel::NotYetIdentified,
        _ => RiskLevel::Risk,
    }
}

/// Row counts per risk bucket for the named column. A missing column
/// counts every row as no risk, consistent with absent cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub no_risk: usize,
    pub not_yet_identified: usize,
    pub risk: usize,
}

pub fn risk_distribution(table: &Table, column: &str) -> RiskDistribution {
    let mut dist = RiskDistribution::default();
    let rows = table.row_count();
    for i in 0..rows {
        let level = table
            .column(column)
            .map(|cells| classify_risk(&cells[i]))
            .unwrap_or(RiskLevel::NoRisk);
        match level {
            RiskLevel::NoRisk => dist.no_risk += 1,
            RiskLevel::NotYetIdentified => dist.not_yet_identified += 1,
            RiskLevel::Risk => dist.risk += 1,
        }
    }
    dist
}

// ============================================================================
// Per-task progress
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    YetToStart,
    InProgress,
    Completed,
}

/// Classify a task from zero-filled effort numbers: nothing booked at all
/// means not started, an estimate with no actuals means in progress.
pub fn task_status(estimate: f64, actual: f64) -> TaskStatus {
    if estimate == 0.0 && actual == 0.0 {
        TaskStatus::YetToStart
    } else if actual == 0.0 {
        TaskStatus::InProgress
    } else {
        TaskStatus::Completed
    }
}

/// One chart-ready row per task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRow {
    pub name: String,
    /// Shortened axis label.
    pub label: String,
    pub estimate: f64,
    pub actual: f64,
    pub status: TaskStatus,
}

/// Build per-task rows from the named columns. Sentinel cells are
/// zero-filled here (and only here) so the rows plot cleanly; a missing
/// name cell becomes an empty string.
pub fn task_breakdown(
    table: &Table,
    name_column: &str,
    estimate_column: &str,
    actual_column: &str,
) -> Vec<TaskRow> {
    let rows = table.row_count();
    (0..rows)
        .map(|i| {
            let name = table
                .column(name_column)
                .and_then(|cells| cells[i].text().map(|s| s.to_string()))
                .unwrap_or_default();
            let estimate = zero_filled(table, estimate_column, i);
            let actual = zero_filled(table, actual_column, i);
            TaskRow {
                label: short_label(&name),
                status: task_status(estimate, actual),
                name,
                estimate,
                actual,
            }
        })
        .collect()
}

fn zero_filled(table: &Table, column: &str, row: usize) -> f64 {
    table
        .column(column)
        .and_then(|cells| cells[row].number())
        .unwrap_or(0.0)
}

/// First five characters plus an ellipsis, matching the chart axis labels.
fn short_label(name: &str) -> String {
    let head: String = name.chars().take(5).collect();
    format!("{}...", head)
}
