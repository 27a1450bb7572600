//! Single-record and bulk mutations.

use std::collections::HashSet;

use coursecat_core::{Course, CoursePatch, NewCourse, now_utc};
use coursecat_storage::{BulkInsertReport, StorageError};
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;
use time::format_description::well_known::Rfc3339;

use super::decode_course;
use crate::error::from_sqlx;

/// Rows per multi-VALUES insert; 4 binds each keeps us far below the
/// 65535 parameter limit.
pub const INSERT_CHUNK_SIZE: usize = 500;

pub async fn find(pool: &PgPool, course_id: &str) -> Result<Option<Course>, StorageError> {
    let row: Option<(Value,)> = query_as("SELECT document FROM courses WHERE course_id = $1")
        .bind(course_id)
        .fetch_optional(pool)
        .await
        .map_err(from_sqlx)?;

    row.map(|(document,)| decode_course(course_id, document))
        .transpose()
}

/// Inserts one course. Returns `AlreadyExists` if the key is taken.
pub async fn insert(pool: &PgPool, new: NewCourse) -> Result<Course, StorageError> {
    let course = Course::from_new(new, now_utc());
    let document = to_document(&course)?;

    let inserted: Option<String> = query_scalar(
        r#"INSERT INTO courses (course_id, document, created_at, updated_at)
           VALUES ($1, $2, $3, $3)
           ON CONFLICT (course_id) DO NOTHING
           RETURNING course_id"#,
    )
    .bind(&course.course_id)
    .bind(&document)
    .bind(course.created_at)
    .fetch_optional(pool)
    .await
    .map_err(from_sqlx)?;

    match inserted {
        Some(_) => Ok(course),
        None => Err(StorageError::already_exists(course.course_id)),
    }
}

/// Inserts a batch, skipping keys that already exist.
///
/// Keys repeated inside the batch are resolved before touching the database:
/// the first occurrence is sent, later ones are reported as duplicates.
pub async fn insert_many(
    pool: &PgPool,
    courses: Vec<NewCourse>,
) -> Result<BulkInsertReport, StorageError> {
    let now = now_utc();
    let mut seen = HashSet::new();
    let mut batch: Vec<(Course, Value)> = Vec::new();
    let mut order: Vec<(String, bool)> = Vec::with_capacity(courses.len());

    for new in courses {
        let first = seen.insert(new.course_id.clone());
        order.push((new.course_id.clone(), first));
        if first {
            let course = Course::from_new(new, now);
            let document = to_document(&course)?;
            batch.push((course, document));
        }
    }

    let mut accepted: HashSet<String> = HashSet::new();
    for chunk in batch.chunks(INSERT_CHUNK_SIZE) {
        let placeholders = (0..chunk.len())
            .map(|i| {
                let base = i * 4;
                format!("(${}, ${}, ${}, ${})", base + 1, base + 2, base + 3, base + 4)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO courses (course_id, document, created_at, updated_at) VALUES {placeholders} \
             ON CONFLICT (course_id) DO NOTHING RETURNING course_id"
        );

        let mut q = query_scalar::<_, String>(&sql);
        for (course, document) in chunk {
            q = q
                .bind(&course.course_id)
                .bind(document)
                .bind(course.created_at)
                .bind(course.updated_at);
        }
        let ids = q.fetch_all(pool).await.map_err(from_sqlx)?;
        accepted.extend(ids);
    }

    let mut report = BulkInsertReport::default();
    for (course_id, first) in order {
        if first && accepted.contains(&course_id) {
            report.record_inserted();
        } else {
            report.record_duplicate(course_id);
        }
    }
    Ok(report)
}

/// Merges a patch into the stored document in a single statement.
pub async fn update(
    pool: &PgPool,
    course_id: &str,
    patch: &CoursePatch,
) -> Result<Option<Course>, StorageError> {
    let now = now_utc();
    let mut changes = serde_json::to_value(patch)
        .map_err(|e| StorageError::internal(format!("Failed to encode patch: {e}")))?;
    let stamp = now
        .format(&Rfc3339)
        .map_err(|e| StorageError::internal(format!("Failed to format timestamp: {e}")))?;
    if let Value::Object(ref mut map) = changes {
        map.insert("updated_at".to_string(), Value::String(stamp));
    }

    let row: Option<(Value,)> = query_as(
        r#"UPDATE courses
           SET document = document || $2, updated_at = $3
           WHERE course_id = $1
           RETURNING document"#,
    )
    .bind(course_id)
    .bind(&changes)
    .bind(now)
    .fetch_optional(pool)
    .await
    .map_err(from_sqlx)?;

    row.map(|(document,)| decode_course(course_id, document))
        .transpose()
}

pub async fn delete(pool: &PgPool, course_id: &str) -> Result<bool, StorageError> {
    let result = query("DELETE FROM courses WHERE course_id = $1")
        .bind(course_id)
        .execute(pool)
        .await
        .map_err(from_sqlx)?;
    Ok(result.rows_affected() > 0)
}

fn to_document(course: &Course) -> Result<Value, StorageError> {
    serde_json::to_value(course)
        .map_err(|e| StorageError::internal(format!("Failed to encode course: {e}")))
}
