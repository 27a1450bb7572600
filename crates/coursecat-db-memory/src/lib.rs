//! In-memory course storage backend for the Coursecat catalog.
//!
//! This crate provides an in-memory implementation of the `CourseStore`
//! trait from `coursecat-storage`, backed by a `DashMap` keyed by business
//! key. It is used by the test suites and for single-node development.
//!
//! # Example
//!
//! ```ignore
//! use coursecat_db_memory::InMemoryStorage;
//! use coursecat_storage::CourseStore;
//!
//! let storage = InMemoryStorage::new();
//! let created = storage.insert(new_course).await?;
//! ```

mod query;
pub mod storage;

pub use coursecat_storage::{CourseStore, StorageError};
pub use storage::InMemoryStorage;

/// Creates a new shareable in-memory store.
pub fn create_course_store() -> coursecat_storage::DynCourseStore {
    std::sync::Arc::new(InMemoryStorage::new())
}
