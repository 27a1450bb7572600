//! Schema management for the PostgreSQL storage backend.
//!
//! Courses live in a single `courses` table: the business key as primary key,
//! the full course document as JSONB, and the two timestamps as real columns so
//! listings can be ordered by an index. Everything the query layer filters or
//! sorts on has an expression index.

use sqlx_postgres::PgPool;
use tracing::{info, instrument};

use crate::error::{PostgresError, Result};

/// Name of the course table.
pub const COURSES_TABLE: &str = "courses";

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS courses (
    course_id  TEXT PRIMARY KEY,
    document   JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS courses_created_at_idx ON courses (created_at DESC, course_id)",
    "CREATE INDEX IF NOT EXISTS courses_category_idx ON courses (lower(document->>'category'))",
    "CREATE INDEX IF NOT EXISTS courses_skill_level_idx ON courses ((document->>'skill_level'))",
    "CREATE INDEX IF NOT EXISTS courses_rating_idx ON courses (((document->>'rating')::float8) DESC)",
];

/// Creates the course table and its indexes.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    pool: PgPool,
}

impl SchemaManager {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotently creates the table and indexes.
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails.
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx_core::query::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| PostgresError::Schema(format!("create table {COURSES_TABLE}: {e}")))?;

        for ddl in CREATE_INDEXES {
            sqlx_core::query::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| PostgresError::Schema(format!("{ddl}: {e}")))?;
        }

        info!(table = COURSES_TABLE, "Course schema ready");
        Ok(())
    }
}
