//! Query descriptors and result types shared by all stores.

use std::collections::BTreeMap;

use coursecat_core::{Course, SkillLevel, ValidationErrors, validate_rating};
use serde::{Deserialize, Serialize};

use crate::matching;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_page(&mut errors, page, limit);
        errors.into_result(Self { page, limit })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Cuts the requested page out of an already ordered result set.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        items
            .iter()
            .skip(start)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

fn check_page(errors: &mut ValidationErrors, page: u32, limit: u32) {
    if page < 1 {
        errors.push("page", "must be at least 1");
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        errors.push("limit", format!("must be between 1 and {MAX_PAGE_SIZE}"));
    }
}

/// Search descriptor.
///
/// The field order below is the serialization order, which makes the JSON
/// form canonical: two logically equal queries always serialize to the same
/// string no matter how the caller assembled them. The cache key for search
/// pages relies on this. Text and category match case-insensitively, so both
/// are stored lowercased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub category: Option<String>,
    pub skill_level: Option<SkillLevel>,
    pub min_rating: Option<f64>,
    pub page: u32,
    pub limit: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            category: None,
            skill_level: None,
            min_rating: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SearchQuery {
    pub fn new(query: impl AsRef<str>) -> Self {
        Self::default().with_query(query)
    }

    pub fn with_query(mut self, query: impl AsRef<str>) -> Self {
        self.query = query.as_ref().trim().to_lowercase();
        self
    }

    pub fn with_category(mut self, category: impl AsRef<str>) -> Self {
        self.category = folded(category.as_ref());
        self
    }

    pub fn with_skill_level(mut self, level: SkillLevel) -> Self {
        self.skill_level = Some(level);
        self
    }

    pub fn with_min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn with_page(mut self, page: u32, limit: u32) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            limit: self.limit,
        }
    }

    /// Lowercased search tokens, capped at [`matching::MAX_QUERY_TOKENS`].
    pub fn tokens(&self) -> Vec<String> {
        matching::tokenize(&self.query)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_page(&mut errors, self.page, self.limit);
        if let Some(rating) = self.min_rating {
            if let Err(msg) = validate_rating(rating) {
                errors.push("min_rating", msg);
            }
        }
        errors.into_result(())
    }
}

/// Filter for plain listings. Serialized (in field order) into listing cache
/// keys; the query-string parser lowercases `category` and `instructor`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseFilter {
    pub category: Option<String>,
    pub skill_level: Option<SkillLevel>,
    pub instructor: Option<String>,
    pub min_rating: Option<f64>,
}

impl CourseFilter {
    pub fn matches(&self, course: &Course) -> bool {
        if let Some(ref category) = self.category {
            if course.category.to_lowercase() != category.to_lowercase() {
                return false;
            }
        }
        if let Some(level) = self.skill_level {
            if course.skill_level != level {
                return false;
            }
        }
        if let Some(ref instructor) = self.instructor {
            if !course
                .instructor
                .to_lowercase()
                .contains(&instructor.to_lowercase())
            {
                return false;
            }
        }
        if let Some(min) = self.min_rating {
            if course.rating < min {
                return false;
            }
        }
        true
    }
}

/// Raw search parameters as they arrive on a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default, alias = "query")]
    pub q: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "skillLevel")]
    pub skill_level: Option<String>,
    #[serde(default, alias = "minRating")]
    pub min_rating: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

impl SearchParams {
    pub fn into_query(self) -> Result<SearchQuery, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let common = parse_common(
            &mut errors,
            self.skill_level.as_deref(),
            self.min_rating.as_deref(),
            self.page.as_deref(),
            self.limit.as_deref(),
        );
        let query = SearchQuery {
            query: self.q.as_deref().unwrap_or_default().trim().to_lowercase(),
            category: self.category.as_deref().and_then(folded),
            skill_level: common.skill_level,
            min_rating: common.min_rating,
            page: common.page,
            limit: common.limit,
        };
        if errors.is_empty() {
            query.validate()?;
        }
        errors.into_result(query)
    }
}

/// Raw listing parameters as they arrive on a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "skillLevel")]
    pub skill_level: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default, alias = "minRating")]
    pub min_rating: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

impl ListParams {
    pub fn into_filter(self) -> Result<(CourseFilter, PageRequest), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let common = parse_common(
            &mut errors,
            self.skill_level.as_deref(),
            self.min_rating.as_deref(),
            self.page.as_deref(),
            self.limit.as_deref(),
        );
        let filter = CourseFilter {
            category: self.category.as_deref().and_then(folded),
            skill_level: common.skill_level,
            instructor: self.instructor.as_deref().and_then(folded),
            min_rating: common.min_rating,
        };
        if errors.is_empty() {
            let page = PageRequest::new(common.page, common.limit)?;
            return Ok((filter, page));
        }
        Err(errors)
    }
}

struct CommonParams {
    skill_level: Option<SkillLevel>,
    min_rating: Option<f64>,
    page: u32,
    limit: u32,
}

fn parse_common(
    errors: &mut ValidationErrors,
    skill_level: Option<&str>,
    min_rating: Option<&str>,
    page: Option<&str>,
    limit: Option<&str>,
) -> CommonParams {
    let skill_level = match skill_level.and_then(non_empty) {
        None => None,
        Some(raw) => match raw.parse::<SkillLevel>() {
            Ok(level) => Some(level),
            Err(msg) => {
                errors.push("skill_level", msg);
                None
            }
        },
    };
    let min_rating = match min_rating.and_then(non_empty) {
        None => None,
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => match validate_rating(value) {
                Ok(value) => Some(value),
                Err(msg) => {
                    errors.push("min_rating", msg);
                    None
                }
            },
            Err(_) => {
                errors.push("min_rating", "must be a number");
                None
            }
        },
    };
    CommonParams {
        skill_level,
        min_rating,
        page: parse_u32(errors, "page", page, 1),
        limit: parse_u32(errors, "limit", limit, DEFAULT_PAGE_SIZE),
    }
}

fn parse_u32(errors: &mut ValidationErrors, field: &str, raw: Option<&str>, default: u32) -> u32 {
    match raw.and_then(non_empty) {
        None => default,
        Some(raw) => raw.parse::<u32>().unwrap_or_else(|_| {
            errors.push(field, "must be a positive integer");
            default
        }),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Trimmed and lowercased, for fields that match case-insensitively.
fn folded(value: &str) -> Option<String> {
    non_empty(value).map(|v| v.to_lowercase())
}

/// Pagination metadata returned alongside every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total: u64) -> Self {
        let limit = u64::from(request.limit.max(1));
        let total_pages = total.div_ceil(limit);
        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_pages,
            has_next: u64::from(request.page) < total_pages,
            has_prev: request.page > 1,
        }
    }
}

/// One page of courses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFacets {
    pub categories: Vec<FacetCount>,
    pub skill_levels: Vec<FacetCount>,
}

/// One page of search results plus facet counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub courses: Vec<Course>,
    pub pagination: Pagination,
    pub facets: SearchFacets,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseStats {
    pub total_courses: u64,
    pub categories: Vec<FacetCount>,
    pub skill_levels: Vec<FacetCount>,
    pub average_rating: f64,
}

/// Outcome of a bulk insert: accepted rows versus rows rejected as duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkInsertReport {
    pub inserted: u64,
    pub duplicates: u64,
    pub duplicate_ids: Vec<String>,
}

impl BulkInsertReport {
    pub fn record_inserted(&mut self) {
        self.inserted += 1;
    }

    pub fn record_duplicate(&mut self, course_id: impl Into<String>) {
        self.duplicates += 1;
        self.duplicate_ids.push(course_id.into());
    }
}

/// Orders facets by count (desc) and then value (asc).
pub fn sort_facets(mut facets: Vec<FacetCount>) -> Vec<FacetCount> {
    facets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    facets
}

/// Counts occurrences of each value.
pub fn count_facets<I, S>(values: I) -> Vec<FacetCount>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for value in values {
        *counts.entry(value.into()).or_default() += 1;
    }
    sort_facets(
        counts
            .into_iter()
            .map(|(value, count)| FacetCount { value, count })
            .collect(),
    )
}

/// Rounds an average rating to two decimals.
pub fn round_rating(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
