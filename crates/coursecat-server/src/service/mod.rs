//! Course service: read-through caching and write-triggered invalidation.

mod course_service;
pub mod keys;

pub use course_service::{
    BulkInsertResult, CacheTtls, Cached, CourseService, RowError, ServiceError, validate_rows,
};
