//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical Task record used by core business logic.
//! - Own every state transition that touches completion fields.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - `completed_at` is set if and only if `completed` is true.
//! - Deletion is physical; there is no tombstone state.

pub mod task;
