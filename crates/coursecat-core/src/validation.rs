//! Field-level validation primitives.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 5.0;

pub(crate) const MAX_COURSE_ID_LEN: usize = 64;
pub(crate) const MAX_TITLE_LEN: usize = 200;
pub(crate) const MAX_DESCRIPTION_LEN: usize = 5000;
pub(crate) const MAX_NAME_LEN: usize = 100;
pub(crate) const MAX_LABEL_LEN: usize = 50;

/// `course:stats` is a cache key of its own; a course with this id would alias it.
pub(crate) const RESERVED_COURSE_IDS: &[&str] = &["stats"];

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// All violations found while validating one input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// Returns `value` when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("validation failed: ")?;
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", v.field, v.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Checks that a rating is a finite number within `[0, 5]`.
pub fn validate_rating(rating: f64) -> Result<f64, String> {
    if !rating.is_finite() {
        return Err("must be a finite number".into());
    }
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(format!("must be between {MIN_RATING} and {MAX_RATING}"));
    }
    Ok(rating)
}

/// Trims a text field and enforces presence and length.
///
/// Returns `None` when the field is absent (and optional) or invalid; in the
/// latter case a violation is recorded.
pub(crate) fn check_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    required: bool,
    max_len: usize,
) -> Option<String> {
    let Some(raw) = value else {
        if required {
            errors.push(field, "is required");
        }
        return None;
    };
    let trimmed = raw.trim();
    if required && trimmed.is_empty() {
        errors.push(field, "must not be empty");
        return None;
    }
    if trimmed.chars().count() > max_len {
        errors.push(field, format!("must be at most {max_len} characters"));
        return None;
    }
    Some(trimmed.to_string())
}

pub(crate) fn check_course_id(
    errors: &mut ValidationErrors,
    value: Option<&str>,
) -> Option<String> {
    let id = check_text(errors, "course_id", value, true, MAX_COURSE_ID_LEN)?;
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        errors.push(
            "course_id",
            "may only contain letters, digits, '_', '-' and '.'",
        );
        return None;
    }
    if RESERVED_COURSE_IDS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(&id))
    {
        errors.push("course_id", format!("'{id}' is reserved"));
        return None;
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds_are_inclusive() {
        assert!(validate_rating(0.0).is_ok());
        assert!(validate_rating(5.0).is_ok());
        assert!(validate_rating(-0.1).is_err());
        assert!(validate_rating(5.1).is_err());
        assert!(validate_rating(f64::NAN).is_err());
    }

    #[test]
    fn text_is_trimmed_and_bounded() {
        let mut errors = ValidationErrors::new();
        assert_eq!(
            check_text(&mut errors, "title", Some("  Rust  "), true, 10),
            Some("Rust".to_string())
        );
        assert!(errors.is_empty());

        assert_eq!(check_text(&mut errors, "title", Some("   "), true, 10), None);
        assert_eq!(
            check_text(&mut errors, "title", Some("much too long"), true, 5),
            None
        );
        assert_eq!(errors.violations().len(), 2);
    }

    #[test]
    fn course_id_rejects_reserved_and_bad_chars() {
        let mut errors = ValidationErrors::new();
        assert!(check_course_id(&mut errors, Some("stats")).is_none());
        assert!(check_course_id(&mut errors, Some("cs 101")).is_none());
        assert!(check_course_id(&mut errors, Some("cs-101.a_b")).is_some());
        assert_eq!(errors.violations().len(), 2);
    }

    #[test]
    fn display_lists_every_violation() {
        let mut errors = ValidationErrors::single("rating", "must be between 0 and 5");
        errors.push("title", "is required");
        assert_eq!(
            errors.to_string(),
            "validation failed: rating: must be between 0 and 5; title: is required"
        );
    }
}
