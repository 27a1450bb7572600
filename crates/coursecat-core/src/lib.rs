//! # coursecat-core
//!
//! Course data model for the Coursecat catalog.
//!
//! This crate only knows about data invariants: what a course looks like and
//! which field values are acceptable. Storage concerns (indexes, table layout)
//! live in the storage backends, and cache concerns live in the server.
//!
//! Inputs arrive as drafts ([`CourseDraft`], [`CoursePatchDraft`]) where every
//! field is optional, so a missing field is reported as a field-level
//! violation instead of an opaque deserialization error.

pub mod course;
pub mod draft;
pub mod validation;

pub use course::{Course, CoursePatch, NewCourse, SkillLevel};
pub use draft::{CourseDraft, CoursePatchDraft};
pub use validation::{FieldViolation, MAX_RATING, MIN_RATING, ValidationErrors, validate_rating};

/// Returns the current UTC timestamp truncated to microseconds, the
/// resolution PostgreSQL stores.
pub fn now_utc() -> time::OffsetDateTime {
    let now = time::OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}
