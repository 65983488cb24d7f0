//! Task use-case service and bulk-operation coordination.
//!
//! # Responsibility
//! - Provide stable CRUD/list/stats entry points for shell callers.
//! - Coordinate bulk create/delete as all-or-nothing units.
//! - Carry the error taxonomy (validation/not-found/storage) end to end.
//!
//! # Invariants
//! - Every write reads the record back, so callers always observe the
//!   storage-authoritative `updated_at`.
//! - Bulk create validates every element before any element persists;
//!   the first failure aborts the whole batch with its index.
//! - Completion fields only change through the model's controlled
//!   setters, never by direct assignment here.

use crate::model::task::{now_epoch_ms, NewTask, Task, TaskId, TaskPatch, TaskValidationError};
use crate::query::{QueryValidationError, TaskListQuery};
use crate::repo::task_repo::{RepoError, TaskPage, TaskRepository};
use crate::stats::TaskStats;
use log::info;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const BULK_MIN_ITEMS: usize = 1;
pub const BULK_MAX_ITEMS: usize = 100;

/// Coarse error category preserved for the HTTP boundary.
///
/// The shell maps these to status codes (400/404/500); the core only
/// guarantees the distinction survives unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Storage,
}

/// Service error for task use-cases.
#[derive(Debug)]
pub enum TaskServiceError {
    /// Entity input failed model invariants.
    Validation(TaskValidationError),
    /// List query spec failed pagination constraints.
    InvalidQuery(QueryValidationError),
    /// Target task does not exist.
    TaskNotFound(TaskId),
    /// Bulk batch size outside `1..=100`.
    InvalidBatchSize { size: usize },
    /// One bulk-create element failed validation; nothing was persisted.
    BulkItemInvalid {
        index: usize,
        source: TaskValidationError,
    },
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl TaskServiceError {
    /// Error category for boundary mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::InvalidQuery(_)
            | Self::InvalidBatchSize { .. }
            | Self::BulkItemInvalid { .. } => ErrorKind::Validation,
            Self::TaskNotFound(_) => ErrorKind::NotFound,
            Self::Repo(_) | Self::InconsistentState(_) => ErrorKind::Storage,
        }
    }

    /// Stable machine-readable code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::InvalidBatchSize { .. } => "INVALID_BATCH_SIZE",
            Self::BulkItemInvalid { .. } => "BULK_ITEM_INVALID",
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
            Self::Repo(_) | Self::InconsistentState(_) => "STORAGE_ERROR",
        }
    }
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidQuery(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidBatchSize { size } => write!(
                f,
                "bulk batch size {size} outside allowed range {BULK_MIN_ITEMS}..={BULK_MAX_ITEMS}"
            ),
            Self::BulkItemInvalid { index, source } => {
                write!(f, "bulk item at index {index} is invalid: {source}")
            }
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent task state: {details}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::InvalidQuery(err) => Some(err),
            Self::BulkItemInvalid { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for TaskServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TaskNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::InvalidQuery(err) => Self::InvalidQuery(err),
            other => Self::Repo(other),
        }
    }
}

/// Result of a bulk delete: unknown ids are skipped, not errors, so
/// `deleted` may be smaller than `requested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteOutcome {
    pub requested: usize,
    #[serde(rename = "deletedCount")]
    pub deleted: usize,
}

/// Use-case service facade over repository implementations.
pub struct TaskService<R: TaskRepository> {
    repo: R,
}

impl<R: TaskRepository> TaskService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one task from caller input and returns the persisted record.
    pub fn create_task(&mut self, input: NewTask) -> Result<Task, TaskServiceError> {
        let task = Task::new(input)?;
        let id = self.repo.create_task(&task)?;
        self.read_back(id, "created task not found in read-back")
    }

    /// Gets one task by stable id.
    pub fn get_task(&self, id: TaskId) -> Result<Task, TaskServiceError> {
        self.repo
            .get_task(id)?
            .ok_or(TaskServiceError::TaskNotFound(id))
    }

    /// Applies a partial update and returns the persisted record.
    pub fn update_task(&mut self, id: TaskId, patch: &TaskPatch) -> Result<Task, TaskServiceError> {
        let mut task = self.get_task(id)?;
        task.apply_patch(patch, now_epoch_ms())?;
        self.repo.update_task(&task)?;
        self.read_back(id, "updated task not found in read-back")
    }

    /// Flips completion state and returns the persisted record.
    pub fn toggle_task(&mut self, id: TaskId) -> Result<Task, TaskServiceError> {
        let mut task = self.get_task(id)?;
        task.toggle_completion(now_epoch_ms());
        self.repo.update_task(&task)?;
        self.read_back(id, "toggled task not found in read-back")
    }

    /// Deletes one task by id. Missing id is a not-found error here,
    /// unlike [`TaskService::bulk_delete`].
    pub fn delete_task(&mut self, id: TaskId) -> Result<(), TaskServiceError> {
        self.repo.delete_task(id)?;
        Ok(())
    }

    /// Lists tasks using the declarative query spec.
    pub fn list_tasks(&self, query: &TaskListQuery) -> Result<TaskPage, TaskServiceError> {
        Ok(self.repo.list_tasks(query)?)
    }

    /// Computes whole-collection statistics at the current clock.
    pub fn stats(&self) -> Result<TaskStats, TaskServiceError> {
        Ok(self.repo.stats(now_epoch_ms())?)
    }

    /// Creates a batch of tasks as one atomic unit.
    ///
    /// # Contract
    /// - Batch size must be within `1..=100`.
    /// - Every element is validated before anything persists; the first
    ///   invalid element rejects the whole batch, identifying its index.
    pub fn bulk_create(&mut self, inputs: Vec<NewTask>) -> Result<Vec<Task>, TaskServiceError> {
        check_batch_size(inputs.len())?;

        let mut tasks = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let task = Task::new(input)
                .map_err(|source| TaskServiceError::BulkItemInvalid { index, source })?;
            tasks.push(task);
        }

        let ids = self.repo.create_many(&tasks)?;
        info!(
            "event=bulk_create module=service status=ok count={}",
            ids.len()
        );

        let mut created = Vec::with_capacity(ids.len());
        for id in ids {
            created.push(self.read_back(id, "bulk-created task not found in read-back")?);
        }
        Ok(created)
    }

    /// Deletes a batch of ids as one atomic unit.
    ///
    /// Unknown ids are silently skipped; the outcome reports how many
    /// rows were actually deleted versus requested.
    pub fn bulk_delete(&mut self, ids: &[TaskId]) -> Result<BulkDeleteOutcome, TaskServiceError> {
        check_batch_size(ids.len())?;

        let deleted = self.repo.delete_many(ids)?;
        info!(
            "event=bulk_delete module=service status=ok requested={} deleted={deleted}",
            ids.len()
        );
        Ok(BulkDeleteOutcome {
            requested: ids.len(),
            deleted,
        })
    }

    /// Deletes every completed task. Returns the count, which may be 0.
    pub fn delete_completed(&mut self) -> Result<usize, TaskServiceError> {
        let deleted = self.repo.delete_completed()?;
        info!("event=delete_completed module=service status=ok deleted={deleted}");
        Ok(deleted)
    }

    fn read_back(&self, id: TaskId, context: &'static str) -> Result<Task, TaskServiceError> {
        self.repo
            .get_task(id)?
            .ok_or(TaskServiceError::InconsistentState(context))
    }
}

fn check_batch_size(size: usize) -> Result<(), TaskServiceError> {
    if !(BULK_MIN_ITEMS..=BULK_MAX_ITEMS).contains(&size) {
        return Err(TaskServiceError::InvalidBatchSize { size });
    }
    Ok(())
}
