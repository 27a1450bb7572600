//! The store contract.

use async_trait::async_trait;
use coursecat_core::{Course, CoursePatch, NewCourse};

use crate::error::StorageError;
use crate::types::{
    BulkInsertReport, CourseFilter, CourseStats, Page, PageRequest, SearchPage, SearchQuery,
};

/// Persistent course collection.
///
/// Every method addresses courses by their business key (`course_id`).
/// Implementations must be thread-safe and must provide per-record
/// atomicity for single-record mutations; nothing here requires multi-record
/// transactions.
#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Point lookup. Returns `None` if the course does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing courses.
    async fn find_by_course_id(&self, course_id: &str) -> Result<Option<Course>, StorageError>;

    /// Filtered listing ordered by creation time (newest first).
    async fn list(
        &self,
        filter: &CourseFilter,
        page: PageRequest,
    ) -> Result<Page<Course>, StorageError>;

    /// Text search with relevance ranking and facet counts.
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, StorageError>;

    /// Aggregate statistics over the whole collection.
    async fn stats(&self) -> Result<CourseStats, StorageError>;

    /// Inserts a single course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the business key is taken.
    async fn insert(&self, course: NewCourse) -> Result<Course, StorageError>;

    /// Inserts many courses, skipping (and reporting) duplicates instead of
    /// failing the batch. Within the batch the first occurrence of a key wins.
    async fn insert_many(&self, courses: Vec<NewCourse>) -> Result<BulkInsertReport, StorageError>;

    /// Applies a partial update. Returns `None` if the course does not exist.
    async fn update(
        &self,
        course_id: &str,
        patch: &CoursePatch,
    ) -> Result<Option<Course>, StorageError>;

    /// Deletes a course. Returns `false` if it did not exist.
    async fn delete(&self, course_id: &str) -> Result<bool, StorageError>;

    /// Verifies the backend is reachable.
    async fn health_check(&self) -> Result<(), StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
