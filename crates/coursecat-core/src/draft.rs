//! Unvalidated course input.
//!
//! Drafts are what HTTP bodies and CSV rows deserialize into. They accept the
//! camelCase spellings used by older clients (`courseId`, `skillLevel`).

use serde::{Deserialize, Serialize};

use crate::course::{CoursePatch, NewCourse, SkillLevel};
use crate::validation::{
    MAX_DESCRIPTION_LEN, MAX_LABEL_LEN, MAX_NAME_LEN, MAX_TITLE_LEN, ValidationErrors,
    check_course_id, check_text, validate_rating,
};

/// Input for creating a course.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseDraft {
    #[serde(default, alias = "courseId")]
    pub course_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, alias = "skillLevel")]
    pub skill_level: Option<String>,
}

impl CourseDraft {
    /// Returns the trimmed business key, if any, for error reporting.
    pub fn course_id_hint(&self) -> Option<String> {
        self.course_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    pub fn validate(self) -> Result<NewCourse, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let course_id = check_course_id(&mut errors, self.course_id.as_deref());
        let title = check_text(&mut errors, "title", self.title.as_deref(), true, MAX_TITLE_LEN);
        let description = check_text(
            &mut errors,
            "description",
            self.description.as_deref(),
            false,
            MAX_DESCRIPTION_LEN,
        );
        let category = check_text(
            &mut errors,
            "category",
            self.category.as_deref(),
            true,
            MAX_NAME_LEN,
        );
        let instructor = check_text(
            &mut errors,
            "instructor",
            self.instructor.as_deref(),
            true,
            MAX_NAME_LEN,
        );
        let duration = check_text(
            &mut errors,
            "duration",
            self.duration.as_deref(),
            false,
            MAX_LABEL_LEN,
        );
        let price = check_text(&mut errors, "price", self.price.as_deref(), false, MAX_LABEL_LEN);

        let rating = match self.rating.map(validate_rating) {
            None => Some(0.0),
            Some(Ok(r)) => Some(r),
            Some(Err(msg)) => {
                errors.push("rating", msg);
                None
            }
        };

        let skill_level = match self.skill_level.as_deref() {
            None => {
                errors.push("skill_level", "is required");
                None
            }
            Some(raw) => match raw.parse::<SkillLevel>() {
                Ok(level) => Some(level),
                Err(msg) => {
                    errors.push("skill_level", msg);
                    None
                }
            },
        };

        match (course_id, title, category, instructor, rating, skill_level) {
            (
                Some(course_id),
                Some(title),
                Some(category),
                Some(instructor),
                Some(rating),
                Some(skill_level),
            ) if errors.is_empty() => Ok(NewCourse {
                course_id,
                title,
                description: description.unwrap_or_default(),
                category,
                instructor,
                duration: duration.unwrap_or_default(),
                price: price.unwrap_or_default(),
                rating,
                skill_level,
            }),
            _ => Err(errors),
        }
    }
}

/// Input for a partial update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoursePatchDraft {
    /// Accepted only so that a mismatching id can be rejected explicitly.
    #[serde(default, alias = "courseId")]
    pub course_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, alias = "skillLevel")]
    pub skill_level: Option<String>,
}

impl CoursePatchDraft {
    /// Validates the patch for the course identified by `course_id`.
    pub fn validate(self, course_id: &str) -> Result<CoursePatch, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(ref body_id) = self.course_id {
            if body_id.trim() != course_id {
                errors.push("course_id", "cannot be changed");
            }
        }

        let patch = CoursePatch {
            title: check_text(
                &mut errors,
                "title",
                self.title.as_deref(),
                self.title.is_some(),
                MAX_TITLE_LEN,
            ),
            description: check_text(
                &mut errors,
                "description",
                self.description.as_deref(),
                false,
                MAX_DESCRIPTION_LEN,
            ),
            category: check_text(
                &mut errors,
                "category",
                self.category.as_deref(),
                self.category.is_some(),
                MAX_NAME_LEN,
            ),
            instructor: check_text(
                &mut errors,
                "instructor",
                self.instructor.as_deref(),
                self.instructor.is_some(),
                MAX_NAME_LEN,
            ),
            duration: check_text(
                &mut errors,
                "duration",
                self.duration.as_deref(),
                false,
                MAX_LABEL_LEN,
            ),
            price: check_text(&mut errors, "price", self.price.as_deref(), false, MAX_LABEL_LEN),
            rating: match self.rating.map(validate_rating) {
                None => None,
                Some(Ok(r)) => Some(r),
                Some(Err(msg)) => {
                    errors.push("rating", msg);
                    None
                }
            },
            skill_level: match self.skill_level.as_deref().map(str::parse::<SkillLevel>) {
                None => None,
                Some(Ok(level)) => Some(level),
                Some(Err(msg)) => {
                    errors.push("skill_level", msg);
                    None
                }
            },
        };

        if errors.is_empty() && patch.is_empty() {
            errors.push("body", "at least one field must be provided");
        }
        errors.into_result(patch)
    }
}
