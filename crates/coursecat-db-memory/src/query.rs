//! Query evaluation over a snapshot of the collection.

use std::cmp::Ordering;

use coursecat_core::Course;
use coursecat_storage::matching;
use coursecat_storage::{
    CourseFilter, CourseStats, Page, PageRequest, Pagination, SearchFacets, SearchPage,
    SearchQuery, count_facets, round_rating,
};

pub(crate) fn list(
    mut courses: Vec<Course>,
    filter: &CourseFilter,
    page: PageRequest,
) -> Page<Course> {
    courses.retain(|c| filter.matches(c));
    courses.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.course_id.cmp(&b.course_id))
    });
    Page {
        items: page.slice(&courses),
        pagination: Pagination::new(page, courses.len() as u64),
    }
}

pub(crate) fn search(courses: Vec<Course>, query: &SearchQuery) -> SearchPage {
    let tokens = query.tokens();

    // Facets ignore the category and skill-level filters so clients can pivot on them.
    let mut base: Vec<(u32, Course)> = courses
        .into_iter()
        .filter(|c| query.min_rating.is_none_or(|min| c.rating >= min))
        .filter_map(|c| {
            let score = matching::relevance(&c, &tokens);
            (tokens.is_empty() || score > 0).then_some((score, c))
        })
        .collect();

    let facets = SearchFacets {
        categories: count_facets(base.iter().map(|(_, c)| c.category.clone())),
        skill_levels: count_facets(base.iter().map(|(_, c)| c.skill_level.as_str())),
    };

    base.retain(|(_, c)| {
        query
            .category
            .as_deref()
            .is_none_or(|cat| c.category.to_lowercase() == cat.to_lowercase())
            && query.skill_level.is_none_or(|level| c.skill_level == level)
    });
    base.sort_by(|(sa, a), (sb, b)| rank(*sa, a, *sb, b));

    let page = query.page_request();
    let total = base.len() as u64;
    let ranked: Vec<Course> = base.into_iter().map(|(_, c)| c).collect();

    SearchPage {
        courses: page.slice(&ranked),
        pagination: Pagination::new(page, total),
        facets,
    }
}

fn rank(score_a: u32, a: &Course, score_b: u32, b: &Course) -> Ordering {
    score_b
        .cmp(&score_a)
        .then_with(|| b.rating.total_cmp(&a.rating))
        .then_with(|| a.course_id.cmp(&b.course_id))
}

pub(crate) fn stats(courses: &[Course]) -> CourseStats {
    let total = courses.len() as u64;
    let average_rating = if courses.is_empty() {
        0.0
    } else {
        round_rating(courses.iter().map(|c| c.rating).sum::<f64>() / courses.len() as f64)
    };
    CourseStats {
        total_courses: total,
        categories: count_facets(courses.iter().map(|c| c.category.clone())),
        skill_levels: count_facets(courses.iter().map(|c| c.skill_level.as_str())),
        average_rating,
    }
}
