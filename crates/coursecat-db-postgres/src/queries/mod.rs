//! SQL query modules for the PostgreSQL storage backend.

pub mod crud;
pub mod search;

use coursecat_storage::StorageError;
use serde_json::Value;
use sqlx_core::arguments::Arguments;
use sqlx_postgres::PgArguments;

use crate::error::PostgresError;

/// A bind parameter collected while assembling dynamic SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Float(f64),
    Integer(i64),
}

/// Collects `WHERE` conditions and their numbered parameters.
///
/// Placeholders are handed out in push order (`$1`, `$2`, ...), so the
/// conditions and the argument list can never drift apart.
#[derive(Debug, Default, Clone)]
pub struct SqlParams {
    conditions: Vec<String>,
    params: Vec<SqlValue>,
}

impl SqlParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter and returns its placeholder number.
    pub fn add(&mut self, value: SqlValue) -> usize {
        self.params.push(value);
        self.params.len()
    }

    pub fn add_text(&mut self, value: impl Into<String>) -> usize {
        self.add(SqlValue::Text(value.into()))
    }

    pub fn push_condition(&mut self, condition: impl Into<String>) {
        self.conditions.push(condition.into());
    }

    /// Renders the collected conditions as a `WHERE` clause (empty if none).
    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn arguments(&self) -> Result<PgArguments, StorageError> {
        let mut args = PgArguments::default();
        for param in &self.params {
            let added = match param {
                SqlValue::Text(s) => args.add(s.clone()),
                SqlValue::Float(f) => args.add(*f),
                SqlValue::Integer(i) => args.add(*i),
            };
            added.map_err(|e| StorageError::internal(format!("Failed to bind parameter: {e}")))?;
        }
        Ok(args)
    }
}

/// Decodes a stored JSONB document back into a course.
pub(crate) fn decode_course(
    course_id: &str,
    document: Value,
) -> Result<coursecat_core::Course, StorageError> {
    serde_json::from_value(document)
        .map_err(|e| PostgresError::decode(course_id, e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_follow_push_order() {
        let mut params = SqlParams::new();
        let a = params.add_text("cs");
        params.push_condition(format!("lower(document->>'category') = lower(${a})"));
        let b = params.add(SqlValue::Float(4.0));
        params.push_condition(format!("(document->>'rating')::float8 >= ${b}"));

        assert_eq!(params.len(), 2);
        assert_eq!(
            params.where_clause(),
            " WHERE lower(document->>'category') = lower($1) AND (document->>'rating')::float8 >= $2"
        );
    }

    #[test]
    fn empty_where_clause() {
        assert_eq!(SqlParams::new().where_clause(), "");
    }
}
