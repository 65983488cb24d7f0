//! Aggregate task statistics.
//!
//! # Responsibility
//! - Compute whole-collection counters for the dashboard surface.
//!
//! # Invariants
//! - List filters never apply here; this is a global view.
//! - Overdue is evaluated against the caller-supplied clock at call
//!   time, never cached, so results may change between calls without
//!   any write occurring.
//! - Priorities with zero matching tasks are reported as 0, not omitted.

use crate::db::DbResult;
use rusqlite::Connection;
use serde::Serialize;

/// Per-priority task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityBreakdown {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

/// Whole-collection aggregate metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: u64,
    pub completed: u64,
    pub active: u64,
    /// Active tasks whose due date is strictly before the query clock.
    pub overdue: u64,
    pub by_priority: PriorityBreakdown,
    /// `round(100 * completed / total)`, half-up; 0 for an empty collection.
    pub completion_rate: u8,
}

/// Computes aggregate statistics in a single table scan.
pub fn collect_stats(conn: &Connection, now_ms: i64) -> DbResult<TaskStats> {
    let row = conn.query_row(
        "SELECT
            COUNT(*),
            COALESCE(SUM(completed), 0),
            COALESCE(SUM(CASE
                WHEN completed = 0 AND due_date IS NOT NULL AND due_date < ?1
                THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN priority = 'low' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN priority = 'medium' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN priority = 'high' THEN 1 ELSE 0 END), 0)
         FROM tasks;",
        [now_ms],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        },
    )?;

    let (total, completed, overdue, low, medium, high) = row;
    let total = clamp_count(total);
    let completed = clamp_count(completed);

    Ok(TaskStats {
        total,
        completed,
        active: total.saturating_sub(completed),
        overdue: clamp_count(overdue),
        by_priority: PriorityBreakdown {
            low: clamp_count(low),
            medium: clamp_count(medium),
            high: clamp_count(high),
        },
        completion_rate: completion_rate(completed, total),
    })
}

/// Round-half-up percentage in `0..=100`.
fn completion_rate(completed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    u8::try_from((200 * completed + total) / (2 * total)).unwrap_or(100)
}

fn clamp_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
