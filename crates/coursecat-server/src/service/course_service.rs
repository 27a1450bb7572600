//! Read-through caching over the course store.
//!
//! Reads consult the cache first and populate it on a miss. Writes go to the
//! store first and, only once the store has acknowledged them, invalidate the
//! affected cache entries. Nothing is written to the cache on the write path,
//! so a value computed before a write can never be cached after it.
//!
//! Invalidation is coarse: every write sweeps all search and listing pages
//! plus the stats entry, since any write can change page membership, ranking
//! and aggregates.

use std::time::Duration;

use coursecat_core::{Course, CourseDraft, CoursePatchDraft, NewCourse, ValidationErrors};
use coursecat_storage::{
    CourseFilter, CourseStats, DynCourseStore, Page, PageRequest, SearchPage, SearchQuery,
    StorageError,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::keys;
use crate::cache::{CacheLookup, DynCacheGateway};
use crate::metrics;

/// Time-to-live per cached view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub course: Duration,
    pub search: Duration,
    pub list: Duration,
    pub stats: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            course: Duration::from_secs(1800),
            search: Duration::from_secs(600),
            list: Duration::from_secs(300),
            stats: Duration::from_secs(900),
        }
    }
}

/// A read result and whether it was served from the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cached<T> {
    pub value: T,
    pub cached: bool,
}

impl<T> Cached<T> {
    fn hit(value: T) -> Self {
        Self { value, cached: true }
    }

    fn fresh(value: T) -> Self {
        Self {
            value,
            cached: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Course not found: {0}")]
    NotFound(String),

    #[error("Course already exists: {0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { course_id } => ServiceError::NotFound(course_id),
            StorageError::AlreadyExists { course_id } => ServiceError::Conflict(course_id),
            StorageError::InvalidQuery { message } => {
                ServiceError::Validation(ValidationErrors::single("query", message))
            }
            other => ServiceError::Storage(other),
        }
    }
}

/// A bulk row that was rejected before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based position of the row in the submitted batch.
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkInsertResult {
    pub inserted: u64,
    pub duplicates: u64,
    pub duplicate_ids: Vec<String>,
    pub errors: Vec<RowError>,
}

/// Validates numbered drafts, splitting them into insertable courses and
/// per-row errors.
pub fn validate_rows<I>(rows: I) -> (Vec<NewCourse>, Vec<RowError>)
where
    I: IntoIterator<Item = (usize, CourseDraft)>,
{
    let mut valid = Vec::new();
    let mut errors = Vec::new();
    for (row, draft) in rows {
        let course_id = draft.course_id_hint();
        match draft.validate() {
            Ok(course) => valid.push(course),
            Err(violations) => errors.push(RowError {
                row,
                course_id,
                message: violations.to_string(),
            }),
        }
    }
    (valid, errors)
}

pub struct CourseService {
    store: DynCourseStore,
    cache: DynCacheGateway,
    ttls: CacheTtls,
}

impl CourseService {
    pub fn new(store: DynCourseStore, cache: DynCacheGateway) -> Self {
        Self::with_ttls(store, cache, CacheTtls::default())
    }

    pub fn with_ttls(store: DynCourseStore, cache: DynCacheGateway, ttls: CacheTtls) -> Self {
        Self { store, cache, ttls }
    }

    pub fn store(&self) -> &DynCourseStore {
        &self.store
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend_name()
    }

    pub fn storage_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn check_store(&self) -> Result<(), StorageError> {
        self.store.health_check().await
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Not-found results are never cached.
    pub async fn get_course(&self, course_id: &str) -> Result<Cached<Course>, ServiceError> {
        let key = keys::course_key(course_id);
        if let Some(course) = self.lookup("course", &key).await {
            return Ok(Cached::hit(course));
        }

        let course = self
            .store
            .find_by_course_id(course_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(course_id.to_string()))?;
        self.populate("course", &key, &course, self.ttls.course).await;
        Ok(Cached::fresh(course))
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Cached<SearchPage>, ServiceError> {
        query.validate()?;
        let key = keys::search_key(query);
        if let Some(page) = self.lookup("search", &key).await {
            return Ok(Cached::hit(page));
        }

        let page = self.store.search(query).await?;
        self.populate("search", &key, &page, self.ttls.search).await;
        Ok(Cached::fresh(page))
    }

    pub async fn list(
        &self,
        filter: &CourseFilter,
        page: PageRequest,
    ) -> Result<Cached<Page<Course>>, ServiceError> {
        let page = PageRequest::new(page.page, page.limit)?;
        let key = keys::list_key(filter, page);
        if let Some(listing) = self.lookup("list", &key).await {
            return Ok(Cached::hit(listing));
        }

        let listing = self.store.list(filter, page).await?;
        self.populate("list", &key, &listing, self.ttls.list).await;
        Ok(Cached::fresh(listing))
    }

    pub async fn stats(&self) -> Result<Cached<CourseStats>, ServiceError> {
        if let Some(stats) = self.lookup("stats", keys::STATS_KEY).await {
            return Ok(Cached::hit(stats));
        }

        let stats = self.store.stats().await?;
        self.populate("stats", keys::STATS_KEY, &stats, self.ttls.stats)
            .await;
        Ok(Cached::fresh(stats))
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub async fn create(&self, draft: CourseDraft) -> Result<Course, ServiceError> {
        let course = draft.validate()?;
        let created = self.store.insert(course).await?;
        tracing::info!(course_id = %created.course_id, "course created");
        metrics::record_course_write("create");
        self.invalidate(None).await;
        Ok(created)
    }

    pub async fn update(
        &self,
        course_id: &str,
        draft: CoursePatchDraft,
    ) -> Result<Course, ServiceError> {
        let patch = draft.validate(course_id)?;
        let updated = self
            .store
            .update(course_id, &patch)
            .await?
            .ok_or_else(|| ServiceError::NotFound(course_id.to_string()))?;
        tracing::info!(course_id = %course_id, "course updated");
        metrics::record_course_write("update");
        self.invalidate(Some(course_id)).await;
        Ok(updated)
    }

    /// Returns `false` when the course did not exist; nothing is invalidated then.
    pub async fn delete(&self, course_id: &str) -> Result<bool, ServiceError> {
        let deleted = self.store.delete(course_id).await?;
        if deleted {
            tracing::info!(course_id = %course_id, "course deleted");
            metrics::record_course_write("delete");
            self.invalidate(Some(course_id)).await;
        }
        Ok(deleted)
    }

    /// Validates every draft, inserts the valid ones and reports the rest.
    pub async fn bulk_insert(
        &self,
        drafts: Vec<CourseDraft>,
    ) -> Result<BulkInsertResult, ServiceError> {
        let rows = drafts.into_iter().enumerate().map(|(i, d)| (i + 1, d));
        let (valid, errors) = validate_rows(rows);
        let mut result = self.insert_validated(valid).await?;
        result.errors = errors;
        Ok(result)
    }

    /// Inserts already validated courses with partial-success semantics.
    pub async fn insert_validated(
        &self,
        courses: Vec<NewCourse>,
    ) -> Result<BulkInsertResult, ServiceError> {
        if courses.is_empty() {
            return Ok(BulkInsertResult::default());
        }

        let report = self.store.insert_many(courses).await?;
        tracing::info!(
            inserted = report.inserted,
            duplicates = report.duplicates,
            "bulk insert finished"
        );
        if report.inserted > 0 {
            metrics::record_course_write("bulk");
            self.invalidate(None).await;
        }
        Ok(BulkInsertResult {
            inserted: report.inserted,
            duplicates: report.duplicates,
            duplicate_ids: report.duplicate_ids,
            errors: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Cache plumbing
    // ------------------------------------------------------------------

    async fn lookup<T: DeserializeOwned>(&self, view: &'static str, key: &str) -> Option<T> {
        let lookup = self.cache.get(key).await;
        let payload = match lookup {
            CacheLookup::Hit(payload) => payload,
            CacheLookup::Miss => {
                tracing::debug!(key = %key, "cache miss");
                metrics::record_cache_lookup(view, "miss");
                return None;
            }
            CacheLookup::Unavailable => {
                tracing::warn!(key = %key, "cache unavailable, reading from store");
                metrics::record_cache_lookup(view, "unavailable");
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(value) => {
                tracing::debug!(key = %key, "cache hit");
                metrics::record_cache_lookup(view, "hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding undecodable cache entry");
                metrics::record_cache_lookup(view, "corrupt");
                self.cache.delete(key).await;
                None
            }
        }
    }

    async fn populate<T: Serialize>(
        &self,
        view: &'static str,
        key: &str,
        value: &T,
        ttl: Duration,
    ) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to serialize cache entry");
                return;
            }
        };
        if !self.cache.set(key, &payload, ttl).await.is_done() {
            metrics::record_cache_write_failure(view);
        }
    }

    /// Drops every entry a write can affect. Failures are logged and counted;
    /// stale entries then live at most until their TTL.
    async fn invalidate(&self, course_id: Option<&str>) {
        let mut complete = true;
        if let Some(course_id) = course_id {
            complete &= self.cache.delete(&keys::course_key(course_id)).await.is_done();
        }
        for pattern in [keys::SEARCH_PATTERN, keys::LIST_PATTERN] {
            complete &= self.cache.delete_matching(pattern).await.is_done();
        }
        complete &= self.cache.delete(keys::STATS_KEY).await.is_done();

        metrics::record_cache_invalidation(complete);
        if complete {
            tracing::debug!(course_id = ?course_id, "cache invalidated");
        } else {
            tracing::warn!(course_id = ?course_id, "cache invalidation incomplete");
        }
    }
}
