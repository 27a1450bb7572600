use std::sync::Arc;

use async_trait::async_trait;
use coursecat_core::{Course, CoursePatch, NewCourse, now_utc};
use coursecat_storage::{
    BulkInsertReport, CourseFilter, CourseStats, CourseStore, Page, PageRequest, SearchPage,
    SearchQuery, StorageError,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::query;

/// In-memory course store.
///
/// Single-record mutations go through `DashMap` entry/shard locks, which gives
/// the per-record atomicity the store contract asks for. Reads work on a
/// cloned snapshot so that no shard lock is held while sorting.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    data: Arc<DashMap<String, Course>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored courses.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn snapshot(&self) -> Vec<Course> {
        self.data.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[async_trait]
impl CourseStore for InMemoryStorage {
    async fn find_by_course_id(&self, course_id: &str) -> Result<Option<Course>, StorageError> {
        Ok(self.data.get(course_id).map(|c| c.value().clone()))
    }

    async fn list(
        &self,
        filter: &CourseFilter,
        page: PageRequest,
    ) -> Result<Page<Course>, StorageError> {
        Ok(query::list(self.snapshot(), filter, page))
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, StorageError> {
        Ok(query::search(self.snapshot(), query))
    }

    async fn stats(&self) -> Result<CourseStats, StorageError> {
        Ok(query::stats(&self.snapshot()))
    }

    async fn insert(&self, course: NewCourse) -> Result<Course, StorageError> {
        match self.data.entry(course.course_id.clone()) {
            Entry::Occupied(_) => Err(StorageError::already_exists(course.course_id)),
            Entry::Vacant(slot) => {
                let stored = Course::from_new(course, now_utc());
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn insert_many(&self, courses: Vec<NewCourse>) -> Result<BulkInsertReport, StorageError> {
        let mut report = BulkInsertReport::default();
        let now = now_utc();
        for course in courses {
            match self.data.entry(course.course_id.clone()) {
                Entry::Occupied(_) => report.record_duplicate(course.course_id),
                Entry::Vacant(slot) => {
                    slot.insert(Course::from_new(course, now));
                    report.record_inserted();
                }
            }
        }
        tracing::debug!(
            inserted = report.inserted,
            duplicates = report.duplicates,
            "bulk insert (memory)"
        );
        Ok(report)
    }

    async fn update(
        &self,
        course_id: &str,
        patch: &CoursePatch,
    ) -> Result<Option<Course>, StorageError> {
        Ok(self.data.get_mut(course_id).map(|mut entry| {
            entry.apply_patch(patch, now_utc());
            entry.clone()
        }))
    }

    async fn delete(&self, course_id: &str) -> Result<bool, StorageError> {
        Ok(self.data.remove(course_id).is_some())
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
