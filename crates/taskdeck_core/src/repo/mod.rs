//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage-gateway contract consumed by services.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Task::validate()` before persistence.
//! - Multi-record writes execute inside a single IMMEDIATE transaction.
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   DB transport errors.

pub mod task_repo;
