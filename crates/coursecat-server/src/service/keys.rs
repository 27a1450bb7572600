//! Cache key scheme.
//!
//! | view    | key                                   |
//! |---------|---------------------------------------|
//! | detail  | `course:{course_id}`                  |
//! | search  | `search:{query json}`                 |
//! | listing | `courses:{filter json}:{page}:{limit}` |
//! | stats   | `course:stats`                        |
//!
//! Query descriptors serialize their fields in declaration order, so equal
//! queries always produce equal keys.

use coursecat_storage::{CourseFilter, PageRequest, SearchQuery};
use serde::Serialize;

pub const STATS_KEY: &str = "course:stats";
pub const SEARCH_PATTERN: &str = "search:*";
pub const LIST_PATTERN: &str = "courses:*";

pub fn course_key(course_id: &str) -> String {
    format!("course:{course_id}")
}

pub fn search_key(query: &SearchQuery) -> String {
    format!("search:{}", canonical_json(query))
}

pub fn list_key(filter: &CourseFilter, page: PageRequest) -> String {
    format!("courses:{}:{}:{}", canonical_json(filter), page.page, page.limit)
}

fn canonical_json<T: Serialize + std::fmt::Debug>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursecat_core::SkillLevel;
    use coursecat_storage::SearchParams;

    #[test]
    fn builder_order_does_not_change_search_key() {
        let a = SearchQuery::default()
            .with_skill_level(SkillLevel::Beginner)
            .with_category("CS")
            .with_page(1, 20);
        let b = SearchQuery::new("")
            .with_page(1, 20)
            .with_category("CS")
            .with_skill_level(SkillLevel::Beginner);
        assert_eq!(search_key(&a), search_key(&b));
        assert_eq!(
            search_key(&a),
            r#"search:{"query":"","category":"cs","skill_level":"beginner","min_rating":null,"page":1,"limit":20}"#
        );
    }

    #[test]
    fn query_string_order_does_not_change_search_key() {
        let from_params = |params: SearchParams| search_key(&params.into_query().unwrap());
        let a = from_params(SearchParams {
            skill_level: Some("Beginner".into()),
            q: Some(" rust ".into()),
            ..Default::default()
        });
        let b = from_params(SearchParams {
            q: Some("rust".into()),
            skill_level: Some("beginner".into()),
            page: Some("1".into()),
            ..Default::default()
        });
        assert_eq!(a, b);
    }

    #[test]
    fn different_pages_get_different_keys() {
        let filter = CourseFilter::default();
        assert_ne!(
            list_key(&filter, PageRequest { page: 1, limit: 20 }),
            list_key(&filter, PageRequest { page: 2, limit: 20 })
        );
        assert!(list_key(&filter, PageRequest::default()).starts_with("courses:{"));
    }

    #[test]
    fn every_key_is_covered_by_an_invalidation_rule() {
        use crate::cache::glob_match;

        assert!(glob_match(SEARCH_PATTERN, &search_key(&SearchQuery::new("x"))));
        assert!(glob_match(
            LIST_PATTERN,
            &list_key(&CourseFilter::default(), PageRequest::default())
        ));
        assert!(!glob_match(LIST_PATTERN, &course_key("cs101")));
        assert!(!glob_match(LIST_PATTERN, STATS_KEY));
    }
}
