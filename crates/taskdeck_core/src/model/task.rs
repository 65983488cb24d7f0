//! Task entity and its invariant-preserving mutation API.
//!
//! # Responsibility
//! - Build valid Task records from caller input, applying creation defaults.
//! - Keep `completed`/`completed_at` consistent through controlled setters.
//! - Validate title/description/tag/due-date invariants before persistence.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another task.
//! - `completed_at.is_some() == completed` after every public mutation.
//! - `tags` holds at most [`MAX_TAGS`] non-blank entries, order preserved.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every task record.
pub type TaskId = Uuid;

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const MAX_TAGS: usize = 10;

// Letters (incl. accented), digits, space and a small punctuation set.
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}\p{N} \-_'.,!?]+$").expect("valid title regex"));

/// Urgency level for a task.
///
/// Ordering is semantic, not alphabetical: sorting "ascending" means most
/// urgent first (high, medium, low). See `query` for the rank mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl Priority {
    /// Canonical lowercase token used in storage and on the wire.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Validation error for task input and persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Title is empty after trimming.
    EmptyTitle,
    /// Trimmed title length is outside `3..=100` characters.
    TitleLength { length: usize },
    /// Title contains a character outside the allowed class.
    TitleCharset { offending: char },
    /// Description exceeds 500 characters.
    DescriptionTooLong { length: usize },
    /// More than 10 tags supplied.
    TooManyTags { count: usize },
    /// A tag is empty after trimming.
    BlankTag,
    /// Due date text is not valid ISO-8601.
    InvalidDueDate { value: String },
    /// `completed` and `completed_at` disagree.
    InconsistentCompletion,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title is required"),
            Self::TitleLength { length } => write!(
                f,
                "title length {length} outside allowed range {TITLE_MIN_CHARS}..={TITLE_MAX_CHARS}"
            ),
            Self::TitleCharset { offending } => {
                write!(f, "title contains disallowed character `{offending}`")
            }
            Self::DescriptionTooLong { length } => write!(
                f,
                "description length {length} exceeds {DESCRIPTION_MAX_CHARS}"
            ),
            Self::TooManyTags { count } => {
                write!(f, "{count} tags supplied, at most {MAX_TAGS} allowed")
            }
            Self::BlankTag => write!(f, "tags must not be blank"),
            Self::InvalidDueDate { value } => {
                write!(f, "due date `{value}` is not valid ISO-8601")
            }
            Self::InconsistentCompletion => {
                write!(f, "completed flag and completed_at timestamp disagree")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// Caller input for task creation.
///
/// `due_date` is ISO-8601 text; it is parsed once during [`Task::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl NewTask {
    /// Creates a minimal input with only a title, other fields defaulted.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial-update input: only supplied fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl TaskPatch {
    /// Returns whether no field was supplied at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.tags.is_none()
    }
}

/// Canonical task record.
///
/// All timestamps are Unix epoch milliseconds (UTC). The storage layer
/// re-stamps `updated_at` on every write; the storage value is
/// authoritative after a commit, so services read back post-write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Serialized as `id` to match external schema naming.
    #[serde(rename = "id")]
    pub uuid: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<i64>,
    /// Case-sensitive storage; membership checks are case-insensitive.
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

impl Task {
    /// Builds a new task from caller input.
    ///
    /// # Contract
    /// - Defaults: `completed = false`, `priority = medium`, `tags = []`.
    /// - Assigns a fresh v4 uuid and `created_at == updated_at`.
    /// - Does not persist.
    pub fn new(input: NewTask) -> Result<Self, TaskValidationError> {
        let now = now_epoch_ms();
        let due_date = match input.due_date.as_deref() {
            Some(text) => Some(parse_due_date(text)?),
            None => None,
        };
        let tags = normalize_tags(input.tags.unwrap_or_default())?;

        let task = Self {
            uuid: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            description: input.description,
            completed: false,
            priority: input.priority.unwrap_or_default(),
            due_date,
            tags,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        task.validate()?;
        Ok(task)
    }

    /// Checks every model invariant.
    ///
    /// Run before every write and after every row decode, so invalid
    /// persisted state is rejected instead of masked.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_title(&self.title)?;
        if let Some(description) = self.description.as_deref() {
            let length = description.chars().count();
            if length > DESCRIPTION_MAX_CHARS {
                return Err(TaskValidationError::DescriptionTooLong { length });
            }
        }
        if self.tags.len() > MAX_TAGS {
            return Err(TaskValidationError::TooManyTags {
                count: self.tags.len(),
            });
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(TaskValidationError::BlankTag);
        }
        if self.completed != self.completed_at.is_some() {
            return Err(TaskValidationError::InconsistentCompletion);
        }
        Ok(())
    }

    /// Marks the task completed. Idempotent: no-op when already completed.
    pub fn complete(&mut self, now_ms: i64) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.completed_at = Some(now_ms);
        self.updated_at = now_ms;
    }

    /// Clears completion. Idempotent: no-op when already active.
    pub fn uncomplete(&mut self, now_ms: i64) {
        if !self.completed {
            return;
        }
        self.completed = false;
        self.completed_at = None;
        self.updated_at = now_ms;
    }

    /// Flips completion state. Each call changes state, by design.
    pub fn toggle_completion(&mut self, now_ms: i64) {
        if self.completed {
            self.uncomplete(now_ms);
        } else {
            self.complete(now_ms);
        }
    }

    /// Applies a partial update.
    ///
    /// # Contract
    /// - Only supplied fields change; completion changes route through
    ///   [`Task::complete`]/[`Task::uncomplete`] so `completed_at` stays
    ///   consistent.
    /// - `updated_at` advances even for an empty patch.
    /// - On validation failure the task is left unchanged.
    pub fn apply_patch(
        &mut self,
        patch: &TaskPatch,
        now_ms: i64,
    ) -> Result<(), TaskValidationError> {
        let mut next = self.clone();

        if let Some(title) = patch.title.as_deref() {
            next.title = title.trim().to_string();
        }
        if let Some(description) = patch.description.as_deref() {
            next.description = Some(description.to_string());
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        if let Some(due_date) = patch.due_date.as_deref() {
            next.due_date = Some(parse_due_date(due_date)?);
        }
        if let Some(tags) = patch.tags.clone() {
            next.tags = normalize_tags(tags)?;
        }
        if let Some(completed) = patch.completed {
            if completed {
                next.complete(now_ms);
            } else {
                next.uncomplete(now_ms);
            }
        }
        next.updated_at = now_ms;

        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Returns whether the task is past due and still active.
    pub fn is_overdue(&self, now_ms: i64) -> bool {
        match self.due_date {
            Some(due) => !self.completed && due < now_ms,
            None => false,
        }
    }

    /// Case-insensitive tag membership check.
    pub fn has_tag(&self, tag: &str) -> bool {
        let needle = tag.trim();
        self.tags
            .iter()
            .any(|existing| equals_unicode_ci(existing, needle))
    }

    /// Adds a tag, preserving caller casing.
    ///
    /// Returns `false` (instead of erroring) for blank input, a
    /// case-insensitive duplicate, or when the tag cap is reached.
    pub fn add_tag(&mut self, tag: &str, now_ms: i64) -> bool {
        let trimmed = tag.trim();
        if trimmed.is_empty() || self.tags.len() >= MAX_TAGS || self.has_tag(trimmed) {
            return false;
        }
        self.tags.push(trimmed.to_string());
        self.updated_at = now_ms;
        true
    }

    /// Removes a tag by case-insensitive match. Returns whether one was removed.
    pub fn remove_tag(&mut self, tag: &str, now_ms: i64) -> bool {
        let needle = tag.trim();
        let before = self.tags.len();
        self.tags.retain(|existing| !equals_unicode_ci(existing, needle));
        if self.tags.len() == before {
            return false;
        }
        self.updated_at = now_ms;
        true
    }
}

/// Returns the current wall clock as Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parses ISO-8601 due-date text into epoch milliseconds.
///
/// Accepts RFC 3339 timestamps, naive datetimes, and bare dates
/// (interpreted as UTC midnight). No further timezone normalization.
pub fn parse_due_date(text: &str) -> Result<i64, TaskValidationError> {
    let trimmed = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc).timestamp_millis());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(parsed.and_utc().timestamp_millis());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(parsed
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc()
            .timestamp_millis());
    }
    Err(TaskValidationError::InvalidDueDate {
        value: text.to_string(),
    })
}

fn validate_title(title: &str) -> Result<(), TaskValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskValidationError::EmptyTitle);
    }
    let length = trimmed.chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&length) {
        return Err(TaskValidationError::TitleLength { length });
    }
    if !TITLE_RE.is_match(trimmed) {
        let offending = trimmed
            .chars()
            .find(|c| !TITLE_RE.is_match(&c.to_string()))
            .unwrap_or('?');
        return Err(TaskValidationError::TitleCharset { offending });
    }
    Ok(())
}

fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>, TaskValidationError> {
    if tags.len() > MAX_TAGS {
        return Err(TaskValidationError::TooManyTags { count: tags.len() });
    }
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(TaskValidationError::BlankTag);
        }
        // Case-insensitive dedupe, first spelling wins.
        if !normalized.iter().any(|seen| equals_unicode_ci(seen, trimmed)) {
            normalized.push(trimmed.to_string());
        }
    }
    Ok(normalized)
}

fn equals_unicode_ci(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
