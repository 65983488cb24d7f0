//! Declarative list-query compilation.
//!
//! # Responsibility
//! - Validate and normalize the caller-supplied query spec.
//! - Compile filters into one conjunctive SQL predicate with bind values.
//! - Compile sort and pagination into deterministic ORDER BY/LIMIT/OFFSET.
//! - Compute pagination metadata from the true filtered total.
//!
//! # Invariants
//! - An absent filter means "match all" for that dimension, never an
//!   implicit exclusion.
//! - Priority sorts by fixed urgency rank (high, medium, low when
//!   ascending), not alphabetically.
//! - Every ORDER BY ends with `uuid ASC`, so reruns of the same spec
//!   against an unchanged collection return identical order.

use crate::model::task::Priority;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const PAGE_SIZE_MIN: u32 = 1;
pub const PAGE_SIZE_MAX: u32 = 100;
pub const PAGE_SIZE_DEFAULT: u32 = 50;

/// Completion-status dimension of the list filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

/// Sortable task fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Priority,
    DueDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Declarative query spec for task listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListQuery {
    pub status: StatusFilter,
    /// Single-value priority filter.
    pub priority: Option<Priority>,
    /// OR semantics: a task matches when it carries at least one of
    /// these tags (case-insensitive). SQLite's `LOWER` folds ASCII
    /// only, so non-ASCII cased tags compare byte-wise here even
    /// though [`Task::has_tag`](crate::model::task::Task::has_tag)
    /// folds full Unicode.
    pub tags: Vec<String>,
    /// Case-insensitive substring over title OR description
    /// (ASCII folding, same caveat as `tags`).
    pub search: Option<String>,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for TaskListQuery {
    fn default() -> Self {
        Self {
            status: StatusFilter::default(),
            priority: None,
            tags: Vec::new(),
            search: None,
            sort_field: SortField::default(),
            sort_order: SortOrder::default(),
            page: 1,
            page_size: PAGE_SIZE_DEFAULT,
        }
    }
}

/// Validation error for query-spec constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValidationError {
    /// `page` must be >= 1.
    PageOutOfRange { page: u32 },
    /// `page_size` must be within `1..=100`.
    PageSizeOutOfRange { page_size: u32 },
}

impl Display for QueryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PageOutOfRange { page } => write!(f, "page {page} must be at least 1"),
            Self::PageSizeOutOfRange { page_size } => write!(
                f,
                "page size {page_size} outside allowed range {PAGE_SIZE_MIN}..={PAGE_SIZE_MAX}"
            ),
        }
    }
}

impl Error for QueryValidationError {}

impl TaskListQuery {
    /// Checks pagination constraints.
    pub fn validate(&self) -> Result<(), QueryValidationError> {
        if self.page < 1 {
            return Err(QueryValidationError::PageOutOfRange { page: self.page });
        }
        if !(PAGE_SIZE_MIN..=PAGE_SIZE_MAX).contains(&self.page_size) {
            return Err(QueryValidationError::PageSizeOutOfRange {
                page_size: self.page_size,
            });
        }
        Ok(())
    }
}

/// Executable plan compiled from a [`TaskListQuery`].
///
/// `where_sql` starts with `WHERE 1 = 1` so every clause appends as
/// ` AND ...`; the same fragment feeds both the COUNT and the fetch.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub where_sql: String,
    pub where_binds: Vec<Value>,
    pub order_sql: String,
    pub limit: i64,
    pub offset: i64,
}

/// Compiles a query spec into SQL fragments plus bind values.
pub fn compile(query: &TaskListQuery) -> Result<QueryPlan, QueryValidationError> {
    query.validate()?;

    let mut where_sql = String::from("WHERE 1 = 1");
    let mut where_binds: Vec<Value> = Vec::new();

    match query.status {
        StatusFilter::All => {}
        StatusFilter::Active => where_sql.push_str(" AND completed = 0"),
        StatusFilter::Completed => where_sql.push_str(" AND completed = 1"),
    }

    if let Some(priority) = query.priority {
        where_sql.push_str(" AND priority = ?");
        where_binds.push(Value::Text(priority.as_db_str().to_string()));
    }

    if let Some(search) = query.search.as_deref() {
        let trimmed = search.trim();
        if !trimmed.is_empty() {
            where_sql.push_str(
                " AND (LOWER(title) LIKE ? ESCAPE '\\'
                   OR LOWER(IFNULL(description, '')) LIKE ? ESCAPE '\\')",
            );
            let pattern = format!("%{}%", escape_like(&trimmed.to_lowercase()));
            where_binds.push(Value::Text(pattern.clone()));
            where_binds.push(Value::Text(pattern));
        }
    }

    if !query.tags.is_empty() {
        let placeholders = vec!["?"; query.tags.len()].join(", ");
        where_sql.push_str(&format!(
            " AND EXISTS (
                SELECT 1
                FROM task_tags
                WHERE task_tags.task_uuid = tasks.uuid
                  AND LOWER(task_tags.name) IN ({placeholders})
            )"
        ));
        for tag in &query.tags {
            where_binds.push(Value::Text(tag.trim().to_lowercase()));
        }
    }

    Ok(QueryPlan {
        where_sql,
        where_binds,
        order_sql: order_by_sql(query.sort_field, query.sort_order),
        limit: i64::from(query.page_size),
        offset: i64::from(query.page - 1) * i64::from(query.page_size),
    })
}

fn order_by_sql(field: SortField, order: SortOrder) -> String {
    let dir = match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    let key = match field {
        SortField::CreatedAt => format!("created_at {dir}"),
        SortField::UpdatedAt => format!("updated_at {dir}"),
        SortField::Title => format!("title COLLATE NOCASE {dir}"),
        // Fixed urgency rank: ascending means most urgent first.
        SortField::Priority => format!(
            "CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END {dir}"
        ),
        // Tasks without a due date sort last in both directions.
        SortField::DueDate => format!("due_date IS NULL, due_date {dir}"),
    };
    format!("ORDER BY {key}, uuid ASC")
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Pagination metadata computed from the true filtered total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub items_per_page: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Builds pagination metadata for one page of a filtered listing.
///
/// A page beyond `total_pages` is not an error: callers get an empty
/// data array while the metadata still reflects the true totals.
pub fn page_meta(page: u32, page_size: u32, total_items: u64) -> PageMeta {
    let total_pages = u32::try_from(total_items.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX);
    PageMeta {
        current_page: page,
        total_pages,
        total_items,
        items_per_page: page_size,
        has_next_page: page < total_pages,
        has_previous_page: page > 1,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        compile, page_meta, QueryValidationError, SortField, SortOrder, StatusFilter,
        TaskListQuery,
    };
    use crate::model::task::Priority;

    #[test]
    fn default_query_compiles_to_match_all_predicate() {
        let plan = compile(&TaskListQuery::default()).unwrap();
        assert_eq!(plan.where_sql, "WHERE 1 = 1");
        assert!(plan.where_binds.is_empty());
        assert_eq!(plan.order_sql, "ORDER BY created_at DESC, uuid ASC");
        assert_eq!(plan.limit, 50);
        assert_eq!(plan.offset, 0);
    }

    #[test]
    fn filters_compose_conjunctively() {
        let query = TaskListQuery {
            status: StatusFilter::Active,
            priority: Some(Priority::High),
            search: Some("milk".to_string()),
            tags: vec!["Errands".to_string()],
            ..TaskListQuery::default()
        };
        let plan = compile(&query).unwrap();
        assert!(plan.where_sql.contains("completed = 0"));
        assert!(plan.where_sql.contains("priority = ?"));
        assert!(plan.where_sql.contains("LIKE"));
        assert!(plan.where_sql.contains("EXISTS"));
        // priority + 2 search patterns + 1 tag
        assert_eq!(plan.where_binds.len(), 4);
    }

    #[test]
    fn priority_sort_uses_urgency_rank_not_alphabet() {
        let query = TaskListQuery {
            sort_field: SortField::Priority,
            sort_order: SortOrder::Asc,
            ..TaskListQuery::default()
        };
        let plan = compile(&query).unwrap();
        assert!(plan
            .order_sql
            .contains("WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2"));
        assert!(plan.order_sql.ends_with("uuid ASC"));
    }

    #[test]
    fn blank_search_is_ignored() {
        let query = TaskListQuery {
            search: Some("   ".to_string()),
            ..TaskListQuery::default()
        };
        let plan = compile(&query).unwrap();
        assert_eq!(plan.where_sql, "WHERE 1 = 1");
    }

    #[test]
    fn validate_rejects_out_of_range_pagination() {
        let zero_page = TaskListQuery {
            page: 0,
            ..TaskListQuery::default()
        };
        assert_eq!(
            zero_page.validate().unwrap_err(),
            QueryValidationError::PageOutOfRange { page: 0 }
        );

        let oversized = TaskListQuery {
            page_size: 101,
            ..TaskListQuery::default()
        };
        assert_eq!(
            oversized.validate().unwrap_err(),
            QueryValidationError::PageSizeOutOfRange { page_size: 101 }
        );
    }

    #[test]
    fn page_meta_arithmetic_covers_edges() {
        let exact = page_meta(1, 2, 4);
        assert_eq!(exact.total_pages, 2);
        assert!(exact.has_next_page);
        assert!(!exact.has_previous_page);

        let last = page_meta(3, 2, 5);
        assert_eq!(last.total_pages, 3);
        assert!(!last.has_next_page);
        assert!(last.has_previous_page);

        let beyond = page_meta(9, 10, 5);
        assert_eq!(beyond.total_items, 5);
        assert_eq!(beyond.total_pages, 1);
        assert!(!beyond.has_next_page);
        assert!(beyond.has_previous_page);

        let empty = page_meta(1, 50, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
        assert!(!empty.has_previous_page);
    }
}
