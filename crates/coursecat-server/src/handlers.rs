use axum::{
    Extension, Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use coursecat_api::{ApiError, ApiResponse};
use coursecat_core::{Course, CourseDraft, CoursePatchDraft};
use coursecat_storage::{ListParams, Pagination, SearchFacets, SearchParams};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{AdminClaims, IssuedToken};
use crate::import::{self, ImportReport};
use crate::recommendations::{RecommendationRequest, RecommendationResponse};
use crate::server::AppState;
use crate::service::{BulkInsertResult, ServiceError};

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct DataBody<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct CachedBody<T> {
    pub data: T,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct PagedBody<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<SearchFacets>,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct DeletedBody {
    pub deleted: bool,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(errors) => ApiError::Validation(errors),
            ServiceError::NotFound(course_id) => {
                ApiError::not_found(format!("Course '{course_id}' not found"))
            }
            ServiceError::Conflict(course_id) => {
                ApiError::conflict(format!("Course '{course_id}' already exists"))
            }
            ServiceError::Storage(e) => {
                tracing::error!(error = %e, category = ?e.category(), "storage failure");
                ApiError::internal("Internal server error")
            }
        }
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(ApiError::payload_too_large(rejection.body_text()))
        }
        Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
    }
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    if let Err(e) = state.service.check_store().await {
        tracing::warn!(error = %e, "readiness check failed");
        return Err(ApiError::unavailable("storage is not reachable"));
    }
    Ok(Json(json!({
        "status": "ready",
        "storage": state.service.storage_backend(),
        "cache": state.service.cache_backend(),
    })))
}

pub async fn metrics() -> Response {
    match crate::metrics::render_metrics() {
        Some(body) => (
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )],
            body,
        )
            .into_response(),
        None => ApiError::unavailable("metrics are not initialized").into_response(),
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<IssuedToken>, ApiError> {
    let LoginRequest { username, password } = json_body(payload)?;
    let auth = state.auth.clone();
    let issued = tokio::task::spawn_blocking(move || auth.login(&username, &password))
        .await
        .map_err(|e| ApiError::internal(format!("login task failed: {e}")))??;
    Ok(Json(issued))
}

pub async fn me(Extension(claims): Extension<AdminClaims>) -> Json<DataBody<AdminClaims>> {
    Json(DataBody { data: claims })
}

// ---------------------------------------------------------------------------
// Course reads
// ---------------------------------------------------------------------------

pub async fn list_courses(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<PagedBody<Course>>, ApiError> {
    let (filter, page) = query_params(params)?.into_filter()?;
    let result = state.service.list(&filter, page).await?;
    Ok(Json(PagedBody {
        data: result.value.items,
        pagination: result.value.pagination,
        facets: None,
        cached: result.cached,
    }))
}

pub async fn search_courses(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<PagedBody<Course>>, ApiError> {
    let query = query_params(params)?.into_query()?;
    let result = state.service.search(&query).await?;
    Ok(Json(PagedBody {
        data: result.value.courses,
        pagination: result.value.pagination,
        facets: Some(result.value.facets),
        cached: result.cached,
    }))
}

pub async fn course_stats(
    State(state): State<AppState>,
) -> Result<Json<CachedBody<coursecat_storage::CourseStats>>, ApiError> {
    let result = state.service.stats().await?;
    Ok(Json(CachedBody {
        data: result.value,
        cached: result.cached,
    }))
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<CachedBody<Course>>, ApiError> {
    let result = state.service.get_course(&course_id).await?;
    Ok(Json(CachedBody {
        data: result.value,
        cached: result.cached,
    }))
}

// ---------------------------------------------------------------------------
// Course writes (admin)
// ---------------------------------------------------------------------------

pub async fn create_course(
    State(state): State<AppState>,
    payload: Result<Json<CourseDraft>, JsonRejection>,
) -> Result<ApiResponse<DataBody<Course>>, ApiError> {
    let draft = json_body(payload)?;
    let course = state.service.create(draft).await?;

    let location = HeaderValue::from_str(&format!("/api/courses/{}", course.course_id)).ok();
    let mut response = ApiResponse::created(DataBody { data: course });
    if let Some(location) = location {
        response = response.with_header(header::LOCATION, location);
    }
    Ok(response)
}

pub async fn update_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    payload: Result<Json<CoursePatchDraft>, JsonRejection>,
) -> Result<Json<DataBody<Course>>, ApiError> {
    let draft = json_body(payload)?;
    let course = state.service.update(&course_id, draft).await?;
    Ok(Json(DataBody { data: course }))
}

pub async fn delete_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<DeletedBody>, ApiError> {
    if !state.service.delete(&course_id).await? {
        return Err(ApiError::not_found(format!("Course '{course_id}' not found")));
    }
    Ok(Json(DeletedBody { deleted: true }))
}

pub async fn bulk_insert(
    State(state): State<AppState>,
    payload: Result<Json<Vec<CourseDraft>>, JsonRejection>,
) -> Result<Json<DataBody<BulkInsertResult>>, ApiError> {
    let drafts = json_body(payload)?;
    if drafts.len() > state.import.max_rows {
        return Err(ApiError::invalid_field(
            "body",
            format!("at most {} courses per request", state.import.max_rows),
        ));
    }
    let result = state.service.bulk_insert(drafts).await?;
    Ok(Json(DataBody { data: result }))
}

pub async fn import_csv(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DataBody<ImportReport>>, ApiError> {
    let mut multipart = multipart.map_err(|r| ApiError::bad_request(r.body_text()))?;

    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            file = Some(field.bytes().await.map_err(multipart_error)?);
            break;
        }
    }
    let Some(bytes) = file else {
        return Err(ApiError::invalid_field("file", "a CSV file field named 'file' is required"));
    };

    let report = import::import_csv(&state.service, &bytes, state.import.max_rows)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(DataBody { data: report }))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(err.body_text())
    } else {
        ApiError::bad_request(err.body_text())
    }
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

pub async fn recommend(
    State(state): State<AppState>,
    payload: Result<Json<RecommendationRequest>, JsonRejection>,
) -> Result<Json<DataBody<RecommendationResponse>>, ApiError> {
    let request = json_body(payload)?;
    let response = state.recommender.recommend(request).await?;
    Ok(Json(DataBody { data: response }))
}
