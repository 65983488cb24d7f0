//! Core domain logic for TaskDeck.
//! This crate is the single source of truth for business invariants:
//! task records, list-query compilation, aggregate statistics, and
//! all-or-nothing bulk operations over an embedded SQLite store.

pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;
pub mod stats;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::task::{
    now_epoch_ms, parse_due_date, NewTask, Priority, Task, TaskId, TaskPatch, TaskValidationError,
};
pub use query::{
    PageMeta, QueryValidationError, SortField, SortOrder, StatusFilter, TaskListQuery,
};
pub use repo::task_repo::{
    RepoError, RepoResult, SqliteTaskRepository, TaskPage, TaskRepository,
};
pub use service::task_service::{
    BulkDeleteOutcome, ErrorKind, TaskService, TaskServiceError, BULK_MAX_ITEMS, BULK_MIN_ITEMS,
};
pub use stats::{collect_stats, PriorityBreakdown, TaskStats};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
