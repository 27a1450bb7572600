//! # coursecat-storage
//!
//! Storage abstraction layer for the Coursecat catalog.
//!
//! This crate defines the contract every course store implements and the
//! query/result types that cross it. It does not contain any implementations;
//! those live in `coursecat-db-memory` and `coursecat-db-postgres`.
//!
//! ## Example
//!
//! ```ignore
//! use coursecat_storage::{CourseStore, SearchQuery};
//!
//! async fn beginner_courses(store: &dyn CourseStore) -> Result<usize, StorageError> {
//!     let query = SearchQuery::default().with_skill_level(SkillLevel::Beginner);
//!     let page = store.search(&query).await?;
//!     Ok(page.courses.len())
//! }
//! ```

mod error;
pub mod matching;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::CourseStore;
pub use types::{
    BulkInsertReport, CourseFilter, CourseStats, DEFAULT_PAGE_SIZE, FacetCount, ListParams,
    MAX_PAGE_SIZE, Page, PageRequest, Pagination, SearchFacets, SearchPage, SearchParams,
    SearchQuery, count_facets, round_rating, sort_facets,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shareable store.
pub type DynCourseStore = std::sync::Arc<dyn CourseStore>;
