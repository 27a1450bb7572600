//! PostgreSQL implementation of the `CourseStore` trait.

use async_trait::async_trait;
use sqlx_postgres::PgPool;

use coursecat_core::{Course, CoursePatch, NewCourse};
use coursecat_storage::{
    BulkInsertReport, CourseFilter, CourseStats, CourseStore, Page, PageRequest, SearchPage,
    SearchQuery, StorageError,
};

use crate::config::PostgresConfig;
use crate::pool;
use crate::queries::{crud, search};
use crate::schema::SchemaManager;

/// PostgreSQL storage backend for courses.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a new `PostgresStorage` with the given configuration.
    ///
    /// This will:
    /// 1. Create a connection pool
    /// 2. Create the table and indexes (if configured)
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created
    /// or if schema creation fails.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config).await?;

        if config.ensure_schema {
            SchemaManager::new(pool.clone()).ensure_schema().await?;
        }

        Ok(Self { pool })
    }

    /// Creates a new `PostgresStorage` from an existing connection pool.
    ///
    /// The schema is not created automatically when using this constructor.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CourseStore for PostgresStorage {
    async fn find_by_course_id(&self, course_id: &str) -> Result<Option<Course>, StorageError> {
        crud::find(&self.pool, course_id).await
    }

    async fn list(
        &self,
        filter: &CourseFilter,
        page: PageRequest,
    ) -> Result<Page<Course>, StorageError> {
        search::list(&self.pool, filter, page).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, StorageError> {
        search::search(&self.pool, query).await
    }

    async fn stats(&self) -> Result<CourseStats, StorageError> {
        search::stats(&self.pool).await
    }

    async fn insert(&self, course: NewCourse) -> Result<Course, StorageError> {
        crud::insert(&self.pool, course).await
    }

    async fn insert_many(&self, courses: Vec<NewCourse>) -> Result<BulkInsertReport, StorageError> {
        let report = crud::insert_many(&self.pool, courses).await?;
        tracing::debug!(
            inserted = report.inserted,
            duplicates = report.duplicates,
            "bulk insert (postgres)"
        );
        Ok(report)
    }

    async fn update(
        &self,
        course_id: &str,
        patch: &CoursePatch,
    ) -> Result<Option<Course>, StorageError> {
        crud::update(&self.pool, course_id, patch).await
    }

    async fn delete(&self, course_id: &str) -> Result<bool, StorageError> {
        crud::delete(&self.pool, course_id).await
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        pool::test_connection(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
