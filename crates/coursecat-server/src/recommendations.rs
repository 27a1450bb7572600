//! Course recommendations.
//!
//! An external recommender, when configured, receives the caller's interests
//! plus a compact catalog of candidate courses and answers with course ids.
//! Any failure on that path falls back to local ranking with the same
//! weights the search uses.

use std::collections::HashMap;
use std::time::Duration;

use coursecat_core::{Course, SkillLevel, ValidationErrors};
use coursecat_storage::{DynCourseStore, SearchQuery, matching};
use serde::{Deserialize, Serialize};

use crate::config::RecommendationsConfig;
use crate::service::ServiceError;

pub const DEFAULT_LIMIT: u32 = 5;
pub const MAX_LIMIT: u32 = 20;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default, alias = "skillLevel")]
    pub skill_level: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    External,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub course: Course,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<Recommendation>,
    pub source: RecommendationSource,
}

#[derive(Debug, thiserror::Error)]
enum ExternalError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("recommender returned no usable courses")]
    Empty,
}

/// Validated request.
struct Criteria {
    tokens: Vec<String>,
    skill_level: Option<SkillLevel>,
    limit: usize,
}

#[derive(Serialize)]
struct ExternalRequest<'a> {
    interests: &'a [String],
    skill_level: Option<SkillLevel>,
    limit: usize,
    catalog: Vec<CandidateSummary<'a>>,
}

#[derive(Serialize)]
struct CandidateSummary<'a> {
    course_id: &'a str,
    title: &'a str,
    category: &'a str,
    skill_level: SkillLevel,
    rating: f64,
}

#[derive(Deserialize)]
struct ExternalResponse {
    #[serde(default)]
    recommendations: Vec<ExternalPick>,
}

#[derive(Deserialize)]
struct ExternalPick {
    course_id: String,
    #[serde(default)]
    reason: Option<String>,
}

pub struct Recommender {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    candidate_limit: u32,
    store: DynCourseStore,
}

impl Recommender {
    pub fn new(
        config: &RecommendationsConfig,
        store: DynCourseStore,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            endpoint: config
                .endpoint
                .clone()
                .filter(|e| !e.trim().is_empty()),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            candidate_limit: config.candidate_limit.clamp(1, coursecat_storage::MAX_PAGE_SIZE),
            store,
        })
    }

    pub async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> Result<RecommendationResponse, ServiceError> {
        let criteria = validate(&request)?;
        let candidates = self.candidates(criteria.skill_level).await?;

        if let Some(endpoint) = self.endpoint.as_deref() {
            match self.call_external(endpoint, &request, &criteria, &candidates).await {
                Ok(recommendations) => {
                    return Ok(RecommendationResponse {
                        recommendations,
                        source: RecommendationSource::External,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "external recommender failed, using fallback ranking"
                    );
                }
            }
        }

        Ok(RecommendationResponse {
            recommendations: fallback(candidates, &criteria),
            source: RecommendationSource::Fallback,
        })
    }

    /// Top-rated courses, optionally restricted to one skill level.
    async fn candidates(
        &self,
        skill_level: Option<SkillLevel>,
    ) -> Result<Vec<Course>, ServiceError> {
        let mut query = SearchQuery::default().with_page(1, self.candidate_limit);
        if let Some(level) = skill_level {
            query = query.with_skill_level(level);
        }
        Ok(self.store.search(&query).await?.courses)
    }

    async fn call_external(
        &self,
        endpoint: &str,
        request: &RecommendationRequest,
        criteria: &Criteria,
        candidates: &[Course],
    ) -> Result<Vec<Recommendation>, ExternalError> {
        let body = ExternalRequest {
            interests: &request.interests,
            skill_level: criteria.skill_level,
            limit: criteria.limit,
            catalog: candidates
                .iter()
                .map(|c| CandidateSummary {
                    course_id: &c.course_id,
                    title: &c.title,
                    category: &c.category,
                    skill_level: c.skill_level,
                    rating: c.rating,
                })
                .collect(),
        };

        let mut http = self.client.post(endpoint).json(&body);
        if let Some(key) = self.api_key.as_deref() {
            http = http.bearer_auth(key);
        }
        let response: ExternalResponse = http.send().await?.error_for_status()?.json().await?;

        let by_id: HashMap<&str, &Course> =
            candidates.iter().map(|c| (c.course_id.as_str(), c)).collect();
        let mut recommendations = Vec::new();
        for pick in response.recommendations {
            if recommendations.len() == criteria.limit {
                break;
            }
            if recommendations
                .iter()
                .any(|r: &Recommendation| r.course.course_id == pick.course_id)
            {
                continue;
            }
            let course = match by_id.get(pick.course_id.as_str()) {
                Some(course) => Some((*course).clone()),
                None => self
                    .store
                    .find_by_course_id(&pick.course_id)
                    .await
                    .ok()
                    .flatten(),
            };
            match course {
                Some(course) => recommendations.push(Recommendation {
                    course,
                    reason: pick
                        .reason
                        .filter(|r| !r.trim().is_empty())
                        .unwrap_or_else(|| "Recommended for you".to_string()),
                }),
                None => {
                    tracing::debug!(course_id = %pick.course_id, "dropping unknown recommendation");
                }
            }
        }

        if recommendations.is_empty() {
            return Err(ExternalError::Empty);
        }
        Ok(recommendations)
    }
}

fn validate(request: &RecommendationRequest) -> Result<Criteria, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        errors.push("limit", format!("must be between 1 and {MAX_LIMIT}"));
    }
    let skill_level = match request.skill_level.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<SkillLevel>() {
            Ok(level) => Some(level),
            Err(msg) => {
                errors.push("skill_level", msg);
                None
            }
        },
    };

    errors.into_result(Criteria {
        tokens: matching::tokenize(&request.interests.join(" ")),
        skill_level,
        limit: limit as usize,
    })
}

/// Interest relevance first, then rating, then id.
fn fallback(candidates: Vec<Course>, criteria: &Criteria) -> Vec<Recommendation> {
    let mut scored: Vec<(u32, Course)> = candidates
        .into_iter()
        .map(|c| (matching::relevance(&c, &criteria.tokens), c))
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| {
        sb.cmp(sa)
            .then_with(|| b.rating.total_cmp(&a.rating))
            .then_with(|| a.course_id.cmp(&b.course_id))
    });

    scored
        .into_iter()
        .take(criteria.limit)
        .map(|(score, course)| {
            let matched = criteria
                .tokens
                .iter()
                .find(|t| matching::relevance(&course, std::slice::from_ref(*t)) > 0);
            let reason = match matched {
                Some(token) if score > 0 => format!("Matches your interest in \"{token}\""),
                _ => format!("Highly rated {} course", course.skill_level),
            };
            Recommendation { course, reason }
        })
        .collect()
}
