//! In-memory repository implementations

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use edu_common::TenantId;
use parking_lot::RwLock;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::domain::aggregates::{EnrollmentStatus, PaymentRecord};
use crate::ports::outbound::{
    Course, CourseCatalog, PaymentRecordStore, RepositoryError, StudentDirectory, StudentRecord,
};
use crate::{CourseId, StudentId};

/// Payment records in a sharded map. The status check and the write of
/// `update_if_status` happen under the same shard lock.
pub struct InMemoryRecordStore<R> {
    records: DashMap<Uuid, R>,
}

impl<R> InMemoryRecordStore<R> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R> Default for InMemoryRecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: PaymentRecord> PaymentRecordStore<R> for InMemoryRecordStore<R> {
    async fn insert(&self, record: &R) -> Result<(), RepositoryError> {
        match self.records.entry(record.record_id()) {
            Entry::Occupied(_) => Err(RepositoryError::DuplicateKey(record.record_id().to_string())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn find(&self, tenant_id: TenantId, id: Uuid) -> Result<Option<R>, RepositoryError> {
        Ok(self
            .records
            .get(&id)
            .filter(|r| r.tenant_id() == tenant_id)
            .map(|r| r.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<R>, RepositoryError> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn find_by_transaction(&self, transaction_id: &str) -> Result<Option<R>, RepositoryError> {
        Ok(self
            .records
            .iter()
            .find(|r| r.transaction_id() == Some(transaction_id))
            .map(|r| r.clone()))
    }

    async fn update_if_status(&self, expected: EnrollmentStatus, record: &R) -> Result<(), RepositoryError> {
        let mut stored = self
            .records
            .get_mut(&record.record_id())
            .filter(|r| r.tenant_id() == record.tenant_id())
            .ok_or(RepositoryError::NotFound)?;

        let actual = stored.status();
        if actual != expected {
            return Err(RepositoryError::Conflict { expected, actual });
        }
        *stored = record.clone();
        Ok(())
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<R>, RepositoryError> {
        let mut records: Vec<R> = self
            .records
            .iter()
            .filter(|r| r.tenant_id() == tenant_id)
            .map(|r| r.clone())
            .collect();
        records.sort_by_key(|r| (r.created_at(), r.record_id()));
        Ok(records)
    }
}

/// Courses and students loaded at startup
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogSeed {
    pub courses: Vec<Course>,
    pub students: Vec<StudentRecord>,
    pub certifications: Vec<Certification>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    pub student_id: StudentId,
    pub course_id: CourseId,
}

impl CatalogSeed {
    /// Read a JSON seed file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Split into the two in-memory adapters
    pub fn into_stores(self) -> (InMemoryCourseCatalog, InMemoryStudentDirectory) {
        let catalog = InMemoryCourseCatalog::new();
        for course in self.courses {
            catalog.add_course(course);
        }

        let directory = InMemoryStudentDirectory::new();
        for student in self.students {
            directory.add_student(student);
        }
        for c in self.certifications {
            directory.mark_certified(c.student_id, c.course_id);
        }

        (catalog, directory)
    }
}

/// In-memory course catalog
#[derive(Default)]
pub struct InMemoryCourseCatalog {
    courses: RwLock<HashMap<CourseId, Course>>,
}

impl InMemoryCourseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_course(&self, course: Course) {
        self.courses.write().insert(course.id, course);
    }
}

#[async_trait]
impl CourseCatalog for InMemoryCourseCatalog {
    async fn find_course(&self, tenant_id: TenantId, course_id: CourseId) -> Result<Option<Course>, RepositoryError> {
        Ok(self
            .courses
            .read()
            .get(&course_id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }
}

/// In-memory student directory
#[derive(Default)]
pub struct InMemoryStudentDirectory {
    students: RwLock<HashMap<StudentId, StudentRecord>>,
    certified: RwLock<HashSet<(StudentId, CourseId)>>,
}

impl InMemoryStudentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_student(&self, student: StudentRecord) {
        self.students.write().insert(student.id, student);
    }

    pub fn mark_certified(&self, student_id: StudentId, course_id: CourseId) {
        self.certified.write().insert((student_id, course_id));
    }
}

#[async_trait]
impl StudentDirectory for InMemoryStudentDirectory {
    async fn find_student(
        &self,
        tenant_id: TenantId,
        student_id: StudentId,
    ) -> Result<Option<StudentRecord>, RepositoryError> {
        Ok(self
            .students
            .read()
            .get(&student_id)
            .filter(|s| s.tenant_id == tenant_id)
            .cloned())
    }

    async fn is_certified(&self, student_id: StudentId, course_id: CourseId) -> Result<bool, RepositoryError> {
        Ok(self.certified.read().contains(&(student_id, course_id)))
    }

    async fn record_certification(&self, student_id: StudentId, course_id: CourseId) -> Result<(), RepositoryError> {
        self.mark_certified(student_id, course_id);
        Ok(())
    }
}
