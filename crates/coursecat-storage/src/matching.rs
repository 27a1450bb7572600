//! Text matching and relevance ranking.
//!
//! Backends that cannot push text search down into the database (the
//! in-memory store, the recommendation fallback) use these functions
//! directly; the PostgreSQL backend mirrors the same weights in SQL.

use coursecat_core::Course;

pub const MAX_QUERY_TOKENS: usize = 10;

pub const TITLE_WEIGHT: u32 = 3;
pub const CATEGORY_WEIGHT: u32 = 2;
pub const INSTRUCTOR_WEIGHT: u32 = 2;
pub const DESCRIPTION_WEIGHT: u32 = 1;

/// Splits a free-text query into lowercase tokens.
pub fn tokenize(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in query.split_whitespace().map(str::to_lowercase) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
        if tokens.len() == MAX_QUERY_TOKENS {
            break;
        }
    }
    tokens
}

/// Relevance of a course for the given tokens; `0` means no match.
pub fn relevance(course: &Course, tokens: &[String]) -> u32 {
    let title = course.title.to_lowercase();
    let category = course.category.to_lowercase();
    let instructor = course.instructor.to_lowercase();
    let description = course.description.to_lowercase();

    tokens
        .iter()
        .map(|token| {
            let mut score = 0;
            if title.contains(token.as_str()) {
                score += TITLE_WEIGHT;
            }
            if category.contains(token.as_str()) {
                score += CATEGORY_WEIGHT;
            }
            if instructor.contains(token.as_str()) {
                score += INSTRUCTOR_WEIGHT;
            }
            if description.contains(token.as_str()) {
                score += DESCRIPTION_WEIGHT;
            }
            score
        })
        .sum()
}

/// Whether a course matches a (possibly empty) token list.
pub fn matches(course: &Course, tokens: &[String]) -> bool {
    tokens.is_empty() || relevance(course, tokens) > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursecat_core::{NewCourse, SkillLevel};
    use time::OffsetDateTime;

    fn course(title: &str, description: &str) -> Course {
        Course::from_new(
            NewCourse {
                course_id: "x1".into(),
                title: title.into(),
                description: description.into(),
                category: "Programming".into(),
                instructor: "Grace Hopper".into(),
                duration: String::new(),
                price: String::new(),
                rating: 4.0,
                skill_level: SkillLevel::Beginner,
            },
            OffsetDateTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn tokenize_dedupes_and_caps() {
        assert_eq!(tokenize("  Rust rust  Async "), vec!["rust", "async"]);
        let many = (0..20).map(|i| format!("t{i}")).collect::<Vec<_>>().join(" ");
        assert_eq!(tokenize(&many).len(), MAX_QUERY_TOKENS);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn title_outranks_description() {
        let tokens = tokenize("rust");
        let in_title = course("Rust for beginners", "systems programming");
        let in_description = course("Systems programming", "uses rust");
        assert!(relevance(&in_title, &tokens) > relevance(&in_description, &tokens));
        assert_eq!(relevance(&course("Go", "Go"), &tokens), 0);
    }

    #[test]
    fn empty_tokens_match_everything() {
        assert!(matches(&course("Anything", ""), &[]));
    }
}
