//! Listing, search and aggregation queries.
//!
//! Relevance is computed in SQL with the same weights as
//! [`coursecat_storage::matching`], so both backends rank identically.

use coursecat_core::Course;
use coursecat_storage::matching::{
    CATEGORY_WEIGHT, DESCRIPTION_WEIGHT, INSTRUCTOR_WEIGHT, TITLE_WEIGHT,
};
use coursecat_storage::{
    CourseFilter, CourseStats, FacetCount, Page, PageRequest, Pagination, SearchFacets,
    SearchPage, SearchQuery, StorageError, round_rating, sort_facets,
};
use serde_json::Value;
use sqlx_core::query_as::query_as_with;
use sqlx_core::query_scalar::query_scalar_with;
use sqlx_postgres::{PgPool, Postgres};

use super::{SqlParams, SqlValue, decode_course};
use crate::error::from_sqlx;

const RATING: &str = "(document->>'rating')::float8";

/// Paginated listing, newest first.
pub async fn list(
    pool: &PgPool,
    filter: &CourseFilter,
    page: PageRequest,
) -> Result<Page<Course>, StorageError> {
    let mut params = SqlParams::new();
    push_filter(&mut params, filter);
    let where_clause = params.where_clause();

    let count_sql = format!("SELECT count(*) FROM courses{where_clause}");
    let total = count(pool, &count_sql, &params).await?;

    let (limit, offset) = push_page(&mut params, page);
    let sql = format!(
        "SELECT course_id, document FROM courses{where_clause} \
         ORDER BY created_at DESC, course_id ASC LIMIT ${limit} OFFSET ${offset}"
    );
    let items = fetch_courses(pool, &sql, &params).await?;

    Ok(Page {
        items,
        pagination: Pagination::new(page, total),
    })
}

/// Text search with relevance ranking and facets.
pub async fn search(pool: &PgPool, query: &SearchQuery) -> Result<SearchPage, StorageError> {
    let tokens = query.tokens();

    // Facets see the text and rating constraints only.
    let mut facet_params = SqlParams::new();
    let facet_cte = matched_cte(&mut facet_params, &tokens, query.min_rating);
    let facets = facet_counts(pool, &facet_cte, &facet_params).await?;

    let mut params = SqlParams::new();
    let cte = matched_cte(&mut params, &tokens, query.min_rating);
    if let Some(ref category) = query.category {
        let n = params.add_text(category.clone());
        params.push_condition(format!("lower(document->>'category') = lower(${n})"));
    }
    if let Some(level) = query.skill_level {
        let n = params.add_text(level.as_str());
        params.push_condition(format!("document->>'skill_level' = ${n}"));
    }
    let where_clause = params.where_clause();

    let count_sql = format!("{cte} SELECT count(*) FROM matched{where_clause}");
    let total = count(pool, &count_sql, &params).await?;

    let page = query.page_request();
    let (limit, offset) = push_page(&mut params, page);
    let sql = format!(
        "{cte} SELECT course_id, document FROM matched{where_clause} \
         ORDER BY score DESC, rating DESC, course_id ASC LIMIT ${limit} OFFSET ${offset}"
    );
    let courses = fetch_courses(pool, &sql, &params).await?;

    tracing::debug!(
        tokens = tokens.len(),
        total,
        returned = courses.len(),
        "search executed"
    );

    Ok(SearchPage {
        courses,
        pagination: Pagination::new(page, total),
        facets,
    })
}

/// Aggregate statistics over the whole table.
pub async fn stats(pool: &PgPool) -> Result<CourseStats, StorageError> {
    let params = SqlParams::new();
    let sql = format!("SELECT count(*), COALESCE(avg({RATING}), 0)::float8 FROM courses");
    let (total, average): (i64, f64) =
        query_as_with::<Postgres, (i64, f64), _>(&sql, params.arguments()?)
            .fetch_one(pool)
            .await
            .map_err(from_sqlx)?;

    let facets = facet_counts(
        pool,
        "WITH matched AS (SELECT document FROM courses)",
        &params,
    )
    .await?;

    Ok(CourseStats {
        total_courses: u64::try_from(total).unwrap_or_default(),
        categories: facets.categories,
        skill_levels: facets.skill_levels,
        average_rating: round_rating(average),
    })
}

fn push_filter(params: &mut SqlParams, filter: &CourseFilter) {
    if let Some(ref category) = filter.category {
        let n = params.add_text(category.clone());
        params.push_condition(format!("lower(document->>'category') = lower(${n})"));
    }
    if let Some(level) = filter.skill_level {
        let n = params.add_text(level.as_str());
        params.push_condition(format!("document->>'skill_level' = ${n}"));
    }
    if let Some(ref instructor) = filter.instructor {
        let n = params.add_text(instructor.to_lowercase());
        params.push_condition(format!(
            "strpos(lower(document->>'instructor'), ${n}) > 0"
        ));
    }
    if let Some(min) = filter.min_rating {
        let n = params.add(SqlValue::Float(min));
        params.push_condition(format!("{RATING} >= ${n}"));
    }
}

fn push_page(params: &mut SqlParams, page: PageRequest) -> (usize, usize) {
    let limit = params.add(SqlValue::Integer(i64::from(page.limit)));
    let offset = params.add(SqlValue::Integer(
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    ));
    (limit, offset)
}

/// Builds the `matched` CTE: every course passing the text and rating
/// constraints, with its relevance score.
fn matched_cte(params: &mut SqlParams, tokens: &[String], min_rating: Option<f64>) -> String {
    let score = relevance_expr(params, tokens);

    let mut conditions = Vec::new();
    if let Some(min) = min_rating {
        let n = params.add(SqlValue::Float(min));
        conditions.push(format!("{RATING} >= ${n}"));
    }
    let inner_where = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    let score_filter = if tokens.is_empty() { "" } else { " WHERE score > 0" };

    format!(
        "WITH scored AS (\
            SELECT course_id, document, {RATING} AS rating, {score} AS score \
            FROM courses{inner_where}\
         ), matched AS (SELECT * FROM scored{score_filter})"
    )
}

fn relevance_expr(params: &mut SqlParams, tokens: &[String]) -> String {
    if tokens.is_empty() {
        return "0".to_string();
    }
    tokens
        .iter()
        .map(|token| {
            let n = params.add_text(token.clone());
            format!(
                "(CASE WHEN strpos(lower(document->>'title'), ${n}) > 0 THEN {TITLE_WEIGHT} ELSE 0 END \
                 + CASE WHEN strpos(lower(document->>'category'), ${n}) > 0 THEN {CATEGORY_WEIGHT} ELSE 0 END \
                 + CASE WHEN strpos(lower(document->>'instructor'), ${n}) > 0 THEN {INSTRUCTOR_WEIGHT} ELSE 0 END \
                 + CASE WHEN strpos(lower(document->>'description'), ${n}) > 0 THEN {DESCRIPTION_WEIGHT} ELSE 0 END)"
            )
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

async fn facet_counts(
    pool: &PgPool,
    cte: &str,
    params: &SqlParams,
) -> Result<SearchFacets, StorageError> {
    let sql = format!(
        "{cte} \
         SELECT 'category'::text, document->>'category', count(*) FROM matched GROUP BY 2 \
         UNION ALL \
         SELECT 'skill_level'::text, document->>'skill_level', count(*) FROM matched GROUP BY 2"
    );
    let rows: Vec<(String, String, i64)> =
        query_as_with::<Postgres, (String, String, i64), _>(&sql, params.arguments()?)
            .fetch_all(pool)
            .await
            .map_err(from_sqlx)?;

    let mut categories = Vec::new();
    let mut skill_levels = Vec::new();
    for (facet, value, count) in rows {
        let entry = FacetCount {
            value,
            count: u64::try_from(count).unwrap_or_default(),
        };
        if facet == "category" {
            categories.push(entry);
        } else {
            skill_levels.push(entry);
        }
    }
    Ok(SearchFacets {
        categories: sort_facets(categories),
        skill_levels: sort_facets(skill_levels),
    })
}

async fn count(pool: &PgPool, sql: &str, params: &SqlParams) -> Result<u64, StorageError> {
    let total: i64 = query_scalar_with::<Postgres, i64, _>(sql, params.arguments()?)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Count query failed");
            from_sqlx(e)
        })?;
    Ok(u64::try_from(total).unwrap_or_default())
}

async fn fetch_courses(
    pool: &PgPool,
    sql: &str,
    params: &SqlParams,
) -> Result<Vec<Course>, StorageError> {
    let rows: Vec<(String, Value)> =
        query_as_with::<Postgres, (String, Value), _>(sql, params.arguments()?)
            .fetch_all(pool)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, sql = %sql, "Course query failed");
                from_sqlx(e)
            })?;

    rows.into_iter()
        .map(|(course_id, document)| decode_course(&course_id, document))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_scores_zero_without_score_filter() {
        let mut params = SqlParams::new();
        let cte = matched_cte(&mut params, &[], None);
        assert!(cte.contains("0 AS score"));
        assert!(!cte.contains("score > 0"));
        assert!(params.is_empty());
    }

    #[test]
    fn tokens_and_rating_are_bound_in_order() {
        let mut params = SqlParams::new();
        let tokens = vec!["rust".to_string(), "async".to_string()];
        let cte = matched_cte(&mut params, &tokens, Some(4.0));
        assert_eq!(params.len(), 3);
        assert!(cte.contains("strpos(lower(document->>'title'), $1)"));
        assert!(cte.contains("strpos(lower(document->>'title'), $2)"));
        assert!(cte.contains(">= $3"));
        assert!(cte.contains("WHERE score > 0"));
    }

    #[test]
    fn listing_filter_conditions() {
        let mut params = SqlParams::new();
        let filter = CourseFilter {
            category: Some("CS".into()),
            skill_level: Some(coursecat_core::SkillLevel::Advanced),
            instructor: Some("Ada".into()),
            min_rating: None,
        };
        push_filter(&mut params, &filter);
        let clause = params.where_clause();
        assert!(clause.starts_with(" WHERE lower(document->>'category') = lower($1)"));
        assert!(clause.contains("document->>'skill_level' = $2"));
        assert!(clause.contains("strpos(lower(document->>'instructor'), $3) > 0"));
        assert_eq!(push_page(&mut params, PageRequest::default()), (4, 5));
    }
}
