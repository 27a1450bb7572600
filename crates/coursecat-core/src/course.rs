use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Course difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub const ALL: [SkillLevel; 3] = [Self::Beginner, Self::Intermediate, Self::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!(
                "'{other}' is not a skill level (expected beginner, intermediate or advanced)"
            )),
        }
    }
}

/// A stored course.
///
/// `course_id` is the business key: it is chosen by the catalog owner and is
/// unique across the collection, independent of whatever identifier the
/// storage backend uses internally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub instructor: String,
    pub duration: String,
    /// Free-form price label ("Free", "$49", "49.99 USD").
    pub price: String,
    pub rating: f64,
    pub skill_level: SkillLevel,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Course {
    /// Builds a stored course from validated input, stamping both timestamps.
    pub fn from_new(new: NewCourse, now: OffsetDateTime) -> Self {
        Self {
            course_id: new.course_id,
            title: new.title,
            description: new.description,
            category: new.category,
            instructor: new.instructor,
            duration: new.duration,
            price: new.price,
            rating: new.rating,
            skill_level: new.skill_level,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a validated patch and bumps `updated_at`.
    pub fn apply_patch(&mut self, patch: &CoursePatch, now: OffsetDateTime) {
        if let Some(ref title) = patch.title {
            self.title = title.clone();
        }
        if let Some(ref description) = patch.description {
            self.description = description.clone();
        }
        if let Some(ref category) = patch.category {
            self.category = category.clone();
        }
        if let Some(ref instructor) = patch.instructor {
            self.instructor = instructor.clone();
        }
        if let Some(ref duration) = patch.duration {
            self.duration = duration.clone();
        }
        if let Some(ref price) = patch.price {
            self.price = price.clone();
        }
        if let Some(rating) = patch.rating {
            self.rating = rating;
        }
        if let Some(level) = patch.skill_level {
            self.skill_level = level;
        }
        self.updated_at = now;
    }
}

/// Validated input for creating a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCourse {
    pub course_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub instructor: String,
    pub duration: String,
    pub price: String,
    pub rating: f64,
    pub skill_level: SkillLevel,
}

/// Validated partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoursePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<SkillLevel>,
}

impl CoursePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.instructor.is_none()
            && self.duration.is_none()
            && self.price.is_none()
            && self.rating.is_none()
            && self.skill_level.is_none()
    }
}
