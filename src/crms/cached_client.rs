//! Cached CRMS client that wraps [`CrmsClient`] with the tiered cache layer.

use color_eyre::Result;
use std::sync::Arc;

use crate::cache::{CacheKind, CacheLayer, CacheResult, MemoryCache, SqliteStore};
use crate::config::Config;

use super::cache::CrmsQueryKey;
use super::client::CrmsClient;
use super::minimize::{MinimalStats, MinimalSyllabus};
use super::types::{
  AnalyticsReport, ClassRecord, DashboardStats, Department, SchoolTerm, StudentRecord,
  SyllabusRecord,
};

/// CRMS client with transparent tiered caching.
///
/// Wraps the underlying [`CrmsClient`] with the same API surface plus
/// synchronous `peek_*` reads for instant paint. Each read-side method picks
/// its cache kind, query key, and persisted projection; write operations
/// bypass the cache and invalidate what they touched.
#[derive(Clone)]
pub struct CachedCrmsClient {
  inner: CrmsClient,
  cache: CacheLayer<SqliteStore>,
}

impl CachedCrmsClient {
  /// Create a new cached client backed by the on-disk mirror.
  pub fn new(config: &Config) -> Result<Self> {
    let inner = CrmsClient::new(config)?;
    let store = SqliteStore::open()?;
    let cache = CacheLayer::new(Arc::new(MemoryCache::new()), Arc::new(store));

    Ok(Self { inner, cache })
  }

  /// Create a cached client over an explicit cache layer.
  pub fn with_cache(inner: CrmsClient, cache: CacheLayer<SqliteStore>) -> Self {
    Self { inner, cache }
  }

  pub fn base_url(&self) -> &str {
    self.inner.base_url()
  }

  pub fn cache(&self) -> &CacheLayer<SqliteStore> {
    &self.cache
  }

  /// All school terms, cached.
  pub async fn school_terms(&self) -> Result<Vec<SchoolTerm>> {
    let key = CrmsQueryKey::Terms;
    let result = self
      .cache
      .fetch_list(CacheKind::Terms, &key, || {
        let inner = self.inner.clone();
        async move { inner.school_terms().await }
      })
      .await?;
    Ok(result.data)
  }

  pub fn peek_school_terms(&self) -> Option<CacheResult<Vec<SchoolTerm>>> {
    self
      .cache
      .peek_list(CacheKind::Terms, &CrmsQueryKey::Terms)
  }

  /// All departments, cached.
  pub async fn departments(&self) -> Result<Vec<Department>> {
    let key = CrmsQueryKey::Departments;
    let result = self
      .cache
      .fetch_list(CacheKind::Departments, &key, || {
        let inner = self.inner.clone();
        async move { inner.departments().await }
      })
      .await?;
    Ok(result.data)
  }

  pub fn peek_departments(&self) -> Option<CacheResult<Vec<Department>>> {
    self
      .cache
      .peek_list(CacheKind::Departments, &CrmsQueryKey::Departments)
  }

  /// Classes taught by a faculty member, cached.
  pub async fn faculty_classes(&self, faculty_id: i64) -> Result<Vec<ClassRecord>> {
    let key = CrmsQueryKey::FacultyClasses { faculty_id };
    let result = self
      .cache
      .fetch_list(CacheKind::Classes, &key, || {
        let inner = self.inner.clone();
        async move { inner.faculty_classes(faculty_id).await }
      })
      .await?;
    Ok(result.data)
  }

  pub fn peek_faculty_classes(&self, faculty_id: i64) -> Option<CacheResult<Vec<ClassRecord>>> {
    self.cache.peek_list(
      CacheKind::Classes,
      &CrmsQueryKey::FacultyClasses { faculty_id },
    )
  }

  /// Students of a section-course, cached.
  pub async fn section_students(&self, section_course_id: i64) -> Result<Vec<StudentRecord>> {
    let key = CrmsQueryKey::SectionStudents { section_course_id };
    let result = self
      .cache
      .fetch_list(CacheKind::Students, &key, || {
        let inner = self.inner.clone();
        async move { inner.section_students(section_course_id).await }
      })
      .await?;
    Ok(result.data)
  }

  pub fn peek_section_students(
    &self,
    section_course_id: i64,
  ) -> Option<CacheResult<Vec<StudentRecord>>> {
    self.cache.peek_list(
      CacheKind::Students,
      &CrmsQueryKey::SectionStudents { section_course_id },
    )
  }

  /// The syllabus review queue, cached.
  pub async fn syllabi(&self) -> Result<Vec<SyllabusRecord>> {
    let key = CrmsQueryKey::Syllabi { department: None };
    let result = self
      .cache
      .fetch_list(CacheKind::Syllabi, &key, || {
        let inner = self.inner.clone();
        async move { inner.syllabi().await }
      })
      .await?;
    Ok(result.data)
  }

  pub fn peek_syllabi(&self) -> Option<CacheResult<Vec<SyllabusRecord>>> {
    self.cache.peek_list(
      CacheKind::Syllabi,
      &CrmsQueryKey::Syllabi { department: None },
    )
  }

  /// Approve a syllabus. Write operation: goes straight to the API, then
  /// invalidates the syllabus queue and the dashboard numbers it skews.
  pub async fn approve_syllabus(&self, syllabus_id: i64) -> Result<()> {
    self.inner.approve_syllabus(syllabus_id).await?;
    self.cache.invalidate_kind::<MinimalSyllabus>(CacheKind::Syllabi);
    self.cache.invalidate_kind::<MinimalStats>(CacheKind::Stats);
    Ok(())
  }

  /// Headline dashboard numbers, cached.
  pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
    let key = CrmsQueryKey::DashboardStats;
    let result = self
      .cache
      .fetch_one(CacheKind::Stats, &key, || {
        let inner = self.inner.clone();
        async move { inner.dashboard_stats().await }
      })
      .await?;
    Ok(result.data)
  }

  pub fn peek_dashboard_stats(&self) -> Option<CacheResult<DashboardStats>> {
    self
      .cache
      .peek_one(CacheKind::Stats, &CrmsQueryKey::DashboardStats)
  }

  /// Student performance analytics, cached. `force_refresh` asks the backend
  /// to recompute clusters and bypasses the fresh-hit shortcut here.
  pub async fn analytics(
    &self,
    term_id: Option<i64>,
    force_refresh: bool,
  ) -> Result<AnalyticsReport> {
    let key = CrmsQueryKey::Analytics { term_id };
    let fetcher = || {
      let inner = self.inner.clone();
      async move { inner.dean_analytics(term_id, force_refresh).await }
    };

    let result = if force_refresh {
      self
        .cache
        .refresh_one(
          CacheKind::Analytics,
          &key,
          fetcher,
        )
        .await?
    } else {
      self
        .cache
        .fetch_one(
          CacheKind::Analytics,
          &key,
          fetcher,
        )
        .await?
    };
    Ok(result.data)
  }

  pub fn peek_analytics(&self, term_id: Option<i64>) -> Option<CacheResult<AnalyticsReport>> {
    self.cache.peek_one(
      CacheKind::Analytics,
      &CrmsQueryKey::Analytics { term_id },
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{Cacheable, PersistentStore, QueryKey};
  use crate::config::{AnalyticsConfig, ApiConfig};
  use crate::crms::minimize::MinimalStudent;

  fn client() -> CachedCrmsClient {
    let config = Config {
      api: ApiConfig {
        url: "http://localhost:9/api".into(),
        user_id: Some("41".into()),
      },
      default_department: None,
      faculty_id: None,
      title: None,
      analytics: AnalyticsConfig::default(),
    };
    let inner = CrmsClient::new(&config).unwrap();
    let cache = CacheLayer::new(
      Arc::new(MemoryCache::new()),
      Arc::new(SqliteStore::open_in_memory().unwrap()),
    );
    CachedCrmsClient::with_cache(inner, cache)
  }

  #[test]
  fn test_peek_students_restores_minimized_mirror() {
    let client = client();
    let key = CrmsQueryKey::SectionStudents {
      section_course_id: 12,
    };
    let minimal = vec![MinimalStudent {
      enrollment_id: 3,
      student_id: 103,
      student_number: "2023-00003".into(),
      full_name: "Alice Reyes".into(),
      contact_email: None,
      has_photo: true,
    }];
    let value = serde_json::to_value(&minimal).unwrap();
    assert!(client.cache().store().put(
      MinimalStudent::entity_type(),
      &key.cache_hash(),
      &value
    ));

    let peeked = client.peek_section_students(12).unwrap();
    assert_eq!(peeked.data[0].full_name, "Alice Reyes");
    // Restored from the projection: flag kept, blob absent.
    assert!(peeked.data[0].has_photo);
    assert_eq!(peeked.data[0].student_photo, None);
  }

  #[test]
  fn test_peek_misses_when_both_tiers_are_empty() {
    let client = client();
    assert!(client.peek_section_students(99).is_none());
    assert!(client.peek_dashboard_stats().is_none());
  }
}
