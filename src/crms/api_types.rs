//! Serde-deserializable types matching CRMS API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs. Conversions
//! compute the `has_*` presence flags from the blobs actually on the wire.

use serde::Deserialize;

use super::types::{
  AnalyticsReport, AnalyticsRow, ApprovalStatus, ClassRecord, ClusteringMeta, DashboardStats,
  Department, SchoolTerm, StudentRecord, SyllabusRecord,
};

#[derive(Debug, Deserialize)]
pub struct ApiSchoolTerm {
  pub term_id: i64,
  #[serde(default)]
  pub school_year: String,
  #[serde(default)]
  pub semester: String,
  #[serde(default)]
  pub is_active: bool,
}

impl From<ApiSchoolTerm> for SchoolTerm {
  fn from(t: ApiSchoolTerm) -> Self {
    Self {
      term_id: t.term_id,
      school_year: t.school_year,
      semester: t.semester,
      is_active: t.is_active,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiDepartment {
  pub department_id: i64,
  #[serde(default)]
  pub name: String,
  pub department_abbreviation: Option<String>,
}

impl From<ApiDepartment> for Department {
  fn from(d: ApiDepartment) -> Self {
    Self {
      department_id: d.department_id,
      name: d.name,
      department_abbreviation: d.department_abbreviation,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiClassRecord {
  pub section_course_id: i64,
  #[serde(default)]
  pub section_id: i64,
  #[serde(default)]
  pub section_code: String,
  #[serde(default)]
  pub course_id: i64,
  #[serde(default)]
  pub course_code: String,
  #[serde(default)]
  pub course_title: String,
  pub instructor_id: Option<i64>,
  pub faculty_name: Option<String>,
  #[serde(default)]
  pub term_id: i64,
  pub semester: Option<String>,
  pub school_year: Option<String>,
  pub banner_type: Option<String>,
  pub banner_color: Option<String>,
  pub banner_image: Option<String>,
  pub faculty_avatar: Option<String>,
  pub updated_at: Option<String>,
}

impl ApiClassRecord {
  pub fn into_record(self) -> ClassRecord {
    let has_banner_image = self.banner_image.is_some();
    let has_faculty_avatar = self.faculty_avatar.is_some();
    ClassRecord {
      section_course_id: self.section_course_id,
      section_id: self.section_id,
      section_code: self.section_code,
      course_id: self.course_id,
      course_code: self.course_code,
      course_title: self.course_title,
      instructor_id: self.instructor_id,
      faculty_name: self.faculty_name,
      term_id: self.term_id,
      semester: self.semester,
      school_year: self.school_year,
      banner_type: self.banner_type,
      banner_color: self.banner_color,
      banner_image: self.banner_image,
      faculty_avatar: self.faculty_avatar,
      has_banner_image,
      has_faculty_avatar,
      updated_at: self.updated_at,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiStudentRecord {
  pub enrollment_id: i64,
  #[serde(default)]
  pub student_id: i64,
  #[serde(default)]
  pub student_number: String,
  #[serde(default)]
  pub full_name: String,
  pub contact_email: Option<String>,
  pub student_photo: Option<String>,
}

impl ApiStudentRecord {
  pub fn into_record(self) -> StudentRecord {
    let has_photo = self.student_photo.is_some();
    StudentRecord {
      enrollment_id: self.enrollment_id,
      student_id: self.student_id,
      student_number: self.student_number,
      full_name: self.full_name,
      contact_email: self.contact_email,
      student_photo: self.student_photo,
      has_photo,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiSyllabus {
  pub syllabus_id: i64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub course_code: String,
  #[serde(default)]
  pub section_code: String,
  pub faculty_name: Option<String>,
  #[serde(default = "default_status")]
  pub approval_status: ApprovalStatus,
  pub version: Option<String>,
  pub content: Option<String>,
  pub updated_at: Option<String>,
}

fn default_status() -> ApprovalStatus {
  ApprovalStatus::Unknown
}

impl ApiSyllabus {
  pub fn into_record(self) -> SyllabusRecord {
    let has_content = self.content.is_some();
    SyllabusRecord {
      syllabus_id: self.syllabus_id,
      title: self.title,
      course_code: self.course_code,
      section_code: self.section_code,
      faculty_name: self.faculty_name,
      approval_status: self.approval_status,
      version: self.version,
      content: self.content,
      has_content,
      updated_at: self.updated_at,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiDashboardStats {
  #[serde(default)]
  pub total_classes: i64,
  #[serde(default)]
  pub total_students: i64,
  #[serde(default)]
  pub total_faculty: i64,
  #[serde(default)]
  pub pending_syllabi: i64,
  #[serde(default)]
  pub approved_syllabi: i64,
  pub attendance_rate: Option<f64>,
}

impl From<ApiDashboardStats> for DashboardStats {
  fn from(s: ApiDashboardStats) -> Self {
    Self {
      total_classes: s.total_classes,
      total_students: s.total_students,
      total_faculty: s.total_faculty,
      pending_syllabi: s.pending_syllabi,
      approved_syllabi: s.approved_syllabi,
      attendance_rate: s.attendance_rate,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiAnalyticsRow {
  #[serde(default)]
  pub student_id: i64,
  pub student_number: Option<String>,
  #[serde(default)]
  pub full_name: String,
  pub section_course_id: Option<i64>,
  pub course_code: Option<String>,
  pub section_code: Option<String>,
  pub attendance_percentage: Option<f64>,
  pub average_score: Option<f64>,
  pub submission_rate: Option<f64>,
  pub cluster: Option<i64>,
  // The clustering service emits numbers, strings, or the literal "NaN" here;
  // keep whatever JSON arrived and stringify at the edge.
  pub cluster_label: Option<serde_json::Value>,
}

impl ApiAnalyticsRow {
  pub fn into_row(self) -> AnalyticsRow {
    AnalyticsRow {
      student_id: self.student_id,
      student_number: self.student_number,
      full_name: self.full_name,
      section_course_id: self.section_course_id,
      course_code: self.course_code,
      section_code: self.section_code,
      attendance_percentage: self.attendance_percentage,
      average_score: self.average_score,
      submission_rate: self.submission_rate,
      cluster: self.cluster,
      cluster_label: stringify_label(self.cluster_label),
    }
  }
}

/// Flatten a pass-through label to a string, dropping JSON null and non-finite
/// numbers on the floor.
fn stringify_label(value: Option<serde_json::Value>) -> Option<String> {
  match value? {
    serde_json::Value::String(s) => Some(s),
    serde_json::Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiClusteringMeta {
  #[serde(default)]
  pub enabled: bool,
  #[serde(default)]
  pub cached: bool,
  #[serde(
    default,
    rename = "silhouetteScore",
    alias = "silhouette_score"
  )]
  pub silhouette_score: Option<f64>,
}

impl From<ApiClusteringMeta> for ClusteringMeta {
  fn from(m: ApiClusteringMeta) -> Self {
    Self {
      enabled: m.enabled,
      cached: m.cached,
      silhouette_score: m.silhouette_score,
    }
  }
}

/// Envelope of `GET /assessments/dean-analytics/sample`.
#[derive(Debug, Deserialize)]
pub struct ApiAnalyticsResponse {
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub data: Vec<ApiAnalyticsRow>,
  pub clustering: Option<ApiClusteringMeta>,
  pub error: Option<String>,
}

impl ApiAnalyticsResponse {
  pub fn into_report(self) -> AnalyticsReport {
    AnalyticsReport {
      rows: self.data.into_iter().map(ApiAnalyticsRow::into_row).collect(),
      clustering: self
        .clustering
        .map(Into::into)
        .unwrap_or(ClusteringMeta {
          enabled: false,
          cached: false,
          silhouette_score: None,
        }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_class_record_presence_flags() {
    let api: ApiClassRecord = serde_json::from_str(
      r#"{
        "section_course_id": 12,
        "section_code": "BSIT-3A",
        "course_code": "IT301",
        "course_title": "Web Systems",
        "term_id": 2,
        "banner_image": "ZGF0YQ==",
        "faculty_avatar": null
      }"#,
    )
    .unwrap();

    let record = api.into_record();
    assert!(record.has_banner_image);
    assert!(!record.has_faculty_avatar);
  }

  #[test]
  fn test_analytics_row_label_variants() {
    let row: ApiAnalyticsRow = serde_json::from_str(
      r#"{"student_id": 1, "full_name": "A", "cluster_label": "At Risk"}"#,
    )
    .unwrap();
    assert_eq!(row.into_row().cluster_label.as_deref(), Some("At Risk"));

    let row: ApiAnalyticsRow =
      serde_json::from_str(r#"{"student_id": 1, "full_name": "A", "cluster_label": 2}"#).unwrap();
    assert_eq!(row.into_row().cluster_label.as_deref(), Some("2"));

    let row: ApiAnalyticsRow =
      serde_json::from_str(r#"{"student_id": 1, "full_name": "A", "cluster_label": null}"#)
        .unwrap();
    assert_eq!(row.into_row().cluster_label, None);
  }

  #[test]
  fn test_analytics_envelope_without_clustering_block() {
    let response: ApiAnalyticsResponse = serde_json::from_str(
      r#"{"success": true, "data": [{"student_id": 5, "full_name": "B"}]}"#,
    )
    .unwrap();

    let report = response.into_report();
    assert_eq!(report.rows.len(), 1);
    assert!(!report.clustering.enabled);
    assert_eq!(report.clustering.silhouette_score, None);
  }

  #[test]
  fn test_clustering_meta_accepts_both_key_styles() {
    let meta: ApiClusteringMeta =
      serde_json::from_str(r#"{"enabled": true, "silhouetteScore": 0.62}"#).unwrap();
    assert_eq!(meta.silhouette_score, Some(0.62));

    let meta: ApiClusteringMeta =
      serde_json::from_str(r#"{"enabled": true, "silhouette_score": 0.41}"#).unwrap();
    assert_eq!(meta.silhouette_score, Some(0.41));
  }
}
