//! Caching implementations for CRMS types.

use crate::cache::{Cacheable, Mirrored, QueryKey};

use super::minimize::{
  MinimalAnalyticsReport, MinimalClass, MinimalStats, MinimalStudent, MinimalSyllabus,
};
use super::types::{
  AnalyticsReport, ClassRecord, DashboardStats, Department, SchoolTerm, StudentRecord,
  SyllabusRecord,
};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for SchoolTerm {
  fn cache_key(&self) -> String {
    self.term_id.to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    None
  }

  fn entity_type() -> &'static str {
    "terms"
  }
}

// Terms are tiny; the mirror persists them as-is.
impl From<&SchoolTerm> for SchoolTerm {
  fn from(t: &SchoolTerm) -> Self {
    t.clone()
  }
}

impl Cacheable for Department {
  fn cache_key(&self) -> String {
    self.department_id.to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    None
  }

  fn entity_type() -> &'static str {
    "departments"
  }
}

impl From<&Department> for Department {
  fn from(d: &Department) -> Self {
    d.clone()
  }
}

impl Cacheable for ClassRecord {
  fn cache_key(&self) -> String {
    self.section_course_id.to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    self.updated_at.as_deref()
  }

  fn entity_type() -> &'static str {
    "class"
  }
}

impl Cacheable for MinimalClass {
  fn cache_key(&self) -> String {
    self.section_course_id.to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    self.updated_at.as_deref()
  }

  fn entity_type() -> &'static str {
    "classes"
  }
}

impl Cacheable for StudentRecord {
  fn cache_key(&self) -> String {
    self.enrollment_id.to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    None
  }

  fn entity_type() -> &'static str {
    "student"
  }
}

impl Cacheable for MinimalStudent {
  fn cache_key(&self) -> String {
    self.enrollment_id.to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    None
  }

  fn entity_type() -> &'static str {
    "students"
  }
}

impl Cacheable for SyllabusRecord {
  fn cache_key(&self) -> String {
    self.syllabus_id.to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    self.updated_at.as_deref()
  }

  fn entity_type() -> &'static str {
    "syllabus"
  }
}

impl Cacheable for MinimalSyllabus {
  fn cache_key(&self) -> String {
    self.syllabus_id.to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    self.updated_at.as_deref()
  }

  fn entity_type() -> &'static str {
    "syllabi"
  }
}

impl Cacheable for DashboardStats {
  fn cache_key(&self) -> String {
    "dashboard".to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    None
  }

  fn entity_type() -> &'static str {
    "dashboard_stats"
  }
}

impl Cacheable for MinimalStats {
  fn cache_key(&self) -> String {
    "dashboard".to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    None
  }

  fn entity_type() -> &'static str {
    "stats"
  }
}

impl Cacheable for AnalyticsReport {
  fn cache_key(&self) -> String {
    "analytics".to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    None
  }

  fn entity_type() -> &'static str {
    "analytics_report"
  }
}

impl Cacheable for MinimalAnalyticsReport {
  fn cache_key(&self) -> String {
    "analytics".to_string()
  }

  fn updated_at(&self) -> Option<&str> {
    None
  }

  fn entity_type() -> &'static str {
    "analytics_rows"
  }
}

// ============================================================================
// Persisted projections
// ============================================================================

impl Mirrored for SchoolTerm {
  type Projection = SchoolTerm;
}

impl Mirrored for Department {
  type Projection = Department;
}

impl Mirrored for ClassRecord {
  type Projection = MinimalClass;
}

impl Mirrored for StudentRecord {
  type Projection = MinimalStudent;
}

impl Mirrored for SyllabusRecord {
  type Projection = MinimalSyllabus;
}

impl Mirrored for DashboardStats {
  type Projection = MinimalStats;
}

impl Mirrored for AnalyticsReport {
  type Projection = MinimalAnalyticsReport;
}

// ============================================================================
// Query key types
// ============================================================================

/// Query key types for CRMS API calls.
#[derive(Clone, Debug)]
pub enum CrmsQueryKey {
  /// All school terms
  Terms,
  /// All departments
  Departments,
  /// Section-courses taught by one faculty member
  FacultyClasses { faculty_id: i64 },
  /// Students of one section-course
  SectionStudents { section_course_id: i64 },
  /// Syllabus review queue, optionally scoped to a department
  Syllabi { department: Option<String> },
  /// Headline dashboard numbers
  DashboardStats,
  /// Student performance analytics, optionally filtered by term
  Analytics { term_id: Option<i64> },
}

impl QueryKey for CrmsQueryKey {
  fn normalized(&self) -> String {
    match self {
      Self::Terms => "terms".to_string(),
      Self::Departments => "departments".to_string(),
      Self::FacultyClasses { faculty_id } => format!("faculty_classes:{}", faculty_id),
      Self::SectionStudents { section_course_id } => {
        format!("section_students:{}", section_course_id)
      }
      Self::Syllabi { department } => format!(
        "syllabi:{}",
        department
          .as_deref()
          .map(|d| d.trim().to_lowercase())
          .unwrap_or_default()
      ),
      Self::DashboardStats => "dashboard_stats".to_string(),
      Self::Analytics { term_id } => format!(
        "analytics:{}",
        term_id.map(|t| t.to_string()).unwrap_or_default()
      ),
    }
  }

  fn description(&self) -> String {
    match self {
      Self::Terms => "school terms".to_string(),
      Self::Departments => "departments".to_string(),
      Self::FacultyClasses { faculty_id } => format!("classes for faculty {}", faculty_id),
      Self::SectionStudents { section_course_id } => {
        format!("students of section-course {}", section_course_id)
      }
      Self::Syllabi { department } => match department {
        Some(d) => format!("syllabi for {}", d),
        None => "all syllabi".to_string(),
      },
      Self::DashboardStats => "dashboard stats".to_string(),
      Self::Analytics { term_id } => match term_id {
        Some(t) => format!("analytics for term {}", t),
        None => "analytics".to_string(),
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_query_keys_are_distinct_per_target() {
    let a = CrmsQueryKey::FacultyClasses { faculty_id: 7 }.cache_hash();
    let b = CrmsQueryKey::FacultyClasses { faculty_id: 8 }.cache_hash();
    let c = CrmsQueryKey::SectionStudents {
      section_course_id: 7,
    }
    .cache_hash();
    assert_ne!(a, b);
    assert_ne!(a, c);
  }

  #[test]
  fn test_syllabi_key_normalizes_department_case() {
    let a = CrmsQueryKey::Syllabi {
      department: Some("CCS".into()),
    };
    let b = CrmsQueryKey::Syllabi {
      department: Some("  ccs ".into()),
    };
    assert_eq!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_analytics_key_distinguishes_term_filter() {
    let all = CrmsQueryKey::Analytics { term_id: None };
    let term = CrmsQueryKey::Analytics { term_id: Some(2) };
    assert_ne!(all.cache_hash(), term.cache_hash());
    assert_eq!(term.description(), "analytics for term 2");
  }
}
