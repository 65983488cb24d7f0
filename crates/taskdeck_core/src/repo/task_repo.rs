//! Task repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD, listing and bulk APIs over `tasks` storage.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Task::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - `updated_at` is storage-assigned on every UPDATE; callers that need
//!   the post-write value must read back.
//! - Row and tag writes for one task always share a transaction.

use crate::db::{migrations::latest_version, DbError};
use crate::model::task::{Priority, Task, TaskId, TaskValidationError};
use crate::query::{self, PageMeta, QueryValidationError, TaskListQuery};
use crate::stats::{collect_stats, TaskStats};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    description,
    completed,
    priority,
    due_date,
    created_at,
    updated_at,
    completed_at
FROM tasks";

// Wall clock as epoch milliseconds. `strftime('%s')` truncates to whole
// seconds, which would let an UPDATE stamp land behind a millisecond
// insert stamp from the same second.
const EPOCH_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for task persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    InvalidQuery(QueryValidationError),
    Db(DbError),
    NotFound(TaskId),
    InvalidData(String),
    /// Connection has no applied migrations or an unexpected version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidQuery(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; run migrations first"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::InvalidQuery(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<QueryValidationError> for RepoError {
    fn from(value: QueryValidationError) -> Self {
        Self::InvalidQuery(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One page of a filtered listing plus its pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TaskPage {
    pub items: Vec<Task>,
    pub meta: PageMeta,
}

/// Storage-gateway contract for task persistence.
///
/// Implementations must guarantee that multi-record operations are
/// all-or-nothing: a failure partway through leaves the collection
/// unchanged from its pre-call state.
pub trait TaskRepository {
    fn create_task(&mut self, task: &Task) -> RepoResult<TaskId>;
    /// Persists the whole batch inside one transaction.
    fn create_many(&mut self, tasks: &[Task]) -> RepoResult<Vec<TaskId>>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn update_task(&mut self, task: &Task) -> RepoResult<()>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    /// Deletes every listed id that exists; unknown ids are skipped.
    /// Returns the number of rows actually deleted.
    fn delete_many(&self, ids: &[TaskId]) -> RepoResult<usize>;
    /// Deletes all completed tasks, returning the deleted count.
    fn delete_completed(&self) -> RepoResult<usize>;
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<TaskPage>;
    fn count_tasks(&self, query: &TaskListQuery) -> RepoResult<u64>;
    /// Aggregates over the whole collection; list filters never apply.
    fn stats(&self, now_ms: i64) -> RepoResult<TaskStats>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    ///
    /// Rejects connections whose schema version or shape does not match
    /// what this binary expects, instead of failing on first use.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&mut self, task: &Task) -> RepoResult<TaskId> {
        task.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        insert_task_row(&tx, task)?;
        replace_tags_in_tx(&tx, task.uuid, &task.tags)?;
        tx.commit()?;

        Ok(task.uuid)
    }

    fn create_many(&mut self, tasks: &[Task]) -> RepoResult<Vec<TaskId>> {
        for task in tasks {
            task.validate()?;
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            insert_task_row(&tx, task)?;
            replace_tags_in_tx(&tx, task.uuid, &task.tags)?;
            ids.push(task.uuid);
        }
        tx.commit()?;

        Ok(ids)
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(&*self.conn, row)?));
        }
        Ok(None)
    }

    fn update_task(&mut self, task: &Task) -> RepoResult<()> {
        task.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Storage-assigned stamp is authoritative; entity-layer
        // updated_at is deliberately not written here. The MAX guard
        // keeps the stamp strictly increasing even when two writes
        // land in the same millisecond.
        let changed = tx.execute(
            &format!(
                "UPDATE tasks
                 SET
                    title = ?1,
                    description = ?2,
                    completed = ?3,
                    priority = ?4,
                    due_date = ?5,
                    completed_at = ?6,
                    updated_at = MAX(updated_at + 1, {EPOCH_MS_SQL})
                 WHERE uuid = ?7;"
            ),
            params![
                task.title.as_str(),
                task.description.as_deref(),
                bool_to_int(task.completed),
                task.priority.as_db_str(),
                task.due_date,
                task.completed_at,
                task.uuid.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(task.uuid));
        }

        replace_tags_in_tx(&tx, task.uuid, &task.tags)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        // Tag rows cascade via the task_tags foreign key.
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn delete_many(&self, ids: &[TaskId]) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let changed = self.conn.execute(
            &format!("DELETE FROM tasks WHERE uuid IN ({placeholders});"),
            params_from_iter(ids.iter().map(|id| id.to_string())),
        )?;
        Ok(changed)
    }

    fn delete_completed(&self) -> RepoResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE completed = 1;", [])?;
        Ok(changed)
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<TaskPage> {
        let plan = query::compile(query)?;

        let total_items = count_with_plan(&*self.conn, &plan.where_sql, &plan.where_binds)?;

        let sql = format!(
            "{TASK_SELECT_SQL} {} {} LIMIT ? OFFSET ?;",
            plan.where_sql, plan.order_sql
        );
        let mut binds = plan.where_binds.clone();
        binds.push(Value::Integer(plan.limit));
        binds.push(Value::Integer(plan.offset));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_task_row(&*self.conn, row)?);
        }

        Ok(TaskPage {
            items,
            meta: query::page_meta(query.page, query.page_size, total_items),
        })
    }

    fn count_tasks(&self, query: &TaskListQuery) -> RepoResult<u64> {
        let plan = query::compile(query)?;
        count_with_plan(&*self.conn, &plan.where_sql, &plan.where_binds)
    }

    fn stats(&self, now_ms: i64) -> RepoResult<TaskStats> {
        Ok(collect_stats(&*self.conn, now_ms)?)
    }
}

fn count_with_plan(conn: &Connection, where_sql: &str, binds: &[Value]) -> RepoResult<u64> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM tasks {where_sql};"),
        params_from_iter(binds.iter().cloned()),
        |row| row.get(0),
    )?;
    Ok(u64::try_from(count).unwrap_or(0))
}

fn insert_task_row(tx: &Transaction<'_>, task: &Task) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO tasks (
            uuid,
            title,
            description,
            completed,
            priority,
            due_date,
            created_at,
            updated_at,
            completed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            task.uuid.to_string(),
            task.title.as_str(),
            task.description.as_deref(),
            bool_to_int(task.completed),
            task.priority.as_db_str(),
            task.due_date,
            task.created_at,
            task.updated_at,
            task.completed_at,
        ],
    )?;
    Ok(())
}

fn replace_tags_in_tx(tx: &Transaction<'_>, task_id: TaskId, tags: &[String]) -> RepoResult<()> {
    let uuid = task_id.to_string();
    tx.execute("DELETE FROM task_tags WHERE task_uuid = ?1;", [uuid.as_str()])?;
    for (position, tag) in tags.iter().enumerate() {
        tx.execute(
            "INSERT INTO task_tags (task_uuid, position, name) VALUES (?1, ?2, ?3);",
            params![uuid.as_str(), position as i64, tag.as_str()],
        )?;
    }
    Ok(())
}

fn parse_task_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in tasks.uuid"))
    })?;

    let priority_text: String = row.get("priority")?;
    let priority = parse_priority(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in tasks.priority"
        ))
    })?;

    let completed = match row.get::<_, i64>("completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid completed value `{other}` in tasks.completed"
            )));
        }
    };

    let task = Task {
        uuid,
        title: row.get("title")?,
        description: row.get("description")?,
        completed,
        priority,
        due_date: row.get("due_date")?,
        tags: load_tags_for_task(conn, &uuid_text)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        completed_at: row.get("completed_at")?,
    };
    task.validate()?;
    Ok(task)
}

fn load_tags_for_task(conn: &Connection, task_uuid: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name
         FROM task_tags
         WHERE task_uuid = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([task_uuid])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(row.get::<_, String>("name")?);
    }
    Ok(tags)
}

fn parse_priority(value: &str) -> Option<Priority> {
    match value {
        "low" => Some(Priority::Low),
        "medium" => Some(Priority::Medium),
        "high" => Some(Priority::High),
        _ => None,
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected = latest_version();
    let actual: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual != expected {
        return Err(RepoError::UninitializedConnection {
            expected_version: expected,
            actual_version: actual,
        });
    }

    for table in ["tasks", "task_tags"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    for column in [
        "uuid",
        "title",
        "description",
        "completed",
        "priority",
        "due_date",
        "created_at",
        "updated_at",
        "completed_at",
    ] {
        if !table_has_column(conn, "tasks", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "tasks",
                column,
            });
        }
    }

    for column in ["task_uuid", "position", "name"] {
        if !table_has_column(conn, "task_tags", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "task_tags",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
