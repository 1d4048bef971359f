use serde::{Deserialize, Serialize};

/// An academic term (school year + semester).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolTerm {
  pub term_id: i64,
  pub school_year: String,
  pub semester: String,
  pub is_active: bool,
}

impl SchoolTerm {
  /// The term marked active, falling back to the newest one.
  pub fn pick_active(terms: &[SchoolTerm]) -> Option<&SchoolTerm> {
    terms
      .iter()
      .find(|t| t.is_active)
      .or_else(|| terms.iter().max_by_key(|t| t.term_id))
  }

  pub fn display_label(&self) -> String {
    format!("{} {}", self.school_year, self.semester)
  }
}

/// A department offering courses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
  pub department_id: i64,
  pub name: String,
  pub department_abbreviation: Option<String>,
}

/// One section-course offering: a course taught to a section by an instructor
/// within a term. The banner and avatar blobs are base64 images and can be
/// hundreds of kilobytes each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
  pub section_course_id: i64,
  pub section_id: i64,
  pub section_code: String,
  pub course_id: i64,
  pub course_code: String,
  pub course_title: String,
  pub instructor_id: Option<i64>,
  pub faculty_name: Option<String>,
  pub term_id: i64,
  pub semester: Option<String>,
  pub school_year: Option<String>,
  pub banner_type: Option<String>,
  pub banner_color: Option<String>,
  pub banner_image: Option<String>,
  pub faculty_avatar: Option<String>,
  /// True when the full record carries (or carried) a banner image, even if
  /// this copy was restored from the minimized mirror without the blob.
  pub has_banner_image: bool,
  pub has_faculty_avatar: bool,
  pub updated_at: Option<String>,
}

/// A student enrolled in a section-course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
  pub enrollment_id: i64,
  pub student_id: i64,
  pub student_number: String,
  pub full_name: String,
  pub contact_email: Option<String>,
  pub student_photo: Option<String>,
  pub has_photo: bool,
}

/// Where a syllabus sits in the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
  Draft,
  Pending,
  Approved,
  Rejected,
  #[serde(other)]
  Unknown,
}

impl ApprovalStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ApprovalStatus::Draft => "draft",
      ApprovalStatus::Pending => "pending",
      ApprovalStatus::Approved => "approved",
      ApprovalStatus::Rejected => "rejected",
      ApprovalStatus::Unknown => "unknown",
    }
  }
}

/// A syllabus awaiting or past review. `content` is the full document blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllabusRecord {
  pub syllabus_id: i64,
  pub title: String,
  pub course_code: String,
  pub section_code: String,
  pub faculty_name: Option<String>,
  pub approval_status: ApprovalStatus,
  pub version: Option<String>,
  pub content: Option<String>,
  pub has_content: bool,
  pub updated_at: Option<String>,
}

/// Headline numbers for the dashboard view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
  pub total_classes: i64,
  pub total_students: i64,
  pub total_faculty: i64,
  pub pending_syllabi: i64,
  pub approved_syllabi: i64,
  pub attendance_rate: Option<f64>,
}

/// Per-student performance row from the analytics endpoint. `cluster_label`
/// is produced by an external clustering service and passed through untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRow {
  pub student_id: i64,
  pub student_number: Option<String>,
  pub full_name: String,
  pub section_course_id: Option<i64>,
  pub course_code: Option<String>,
  pub section_code: Option<String>,
  pub attendance_percentage: Option<f64>,
  pub average_score: Option<f64>,
  pub submission_rate: Option<f64>,
  pub cluster: Option<i64>,
  pub cluster_label: Option<String>,
}

impl AnalyticsRow {
  /// The cluster label if it is worth showing.
  ///
  /// The clustering service leaks `"NaN"` strings and empty labels for rows
  /// it could not place; those render as no badge at all.
  pub fn cluster_badge(&self) -> Option<&str> {
    displayable_cluster_label(self.cluster_label.as_deref())
  }
}

/// Sentinel filter for labels coming back from the clustering service.
pub fn displayable_cluster_label(label: Option<&str>) -> Option<&str> {
  let label = label?;
  let trimmed = label.trim();
  if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
    return None;
  }
  Some(label)
}

/// Metadata about the clustering run attached to an analytics response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringMeta {
  pub enabled: bool,
  pub cached: bool,
  pub silhouette_score: Option<f64>,
}

/// A full analytics response: the rows plus the clustering run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
  pub rows: Vec<AnalyticsRow>,
  pub clustering: ClusteringMeta,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn term(id: i64, active: bool) -> SchoolTerm {
    SchoolTerm {
      term_id: id,
      school_year: "2025-2026".into(),
      semester: "1st Semester".into(),
      is_active: active,
    }
  }

  #[test]
  fn test_pick_active_prefers_flagged_term() {
    let terms = vec![term(3, false), term(1, true), term(2, false)];
    assert_eq!(SchoolTerm::pick_active(&terms).unwrap().term_id, 1);
  }

  #[test]
  fn test_pick_active_falls_back_to_newest() {
    let terms = vec![term(3, false), term(5, false), term(2, false)];
    assert_eq!(SchoolTerm::pick_active(&terms).unwrap().term_id, 5);
  }

  #[test]
  fn test_pick_active_empty() {
    assert!(SchoolTerm::pick_active(&[]).is_none());
  }

  #[test]
  fn test_cluster_label_sentinels_are_filtered() {
    assert_eq!(displayable_cluster_label(None), None);
    assert_eq!(displayable_cluster_label(Some("")), None);
    assert_eq!(displayable_cluster_label(Some("   ")), None);
    assert_eq!(displayable_cluster_label(Some("NaN")), None);
    assert_eq!(displayable_cluster_label(Some("nan")), None);
    assert_eq!(
      displayable_cluster_label(Some("At Risk")),
      Some("At Risk")
    );
  }

  #[test]
  fn test_approval_status_tolerates_unknown_values() {
    let status: ApprovalStatus = serde_json::from_str("\"in_review\"").unwrap();
    assert_eq!(status, ApprovalStatus::Unknown);
    let status: ApprovalStatus = serde_json::from_str("\"approved\"").unwrap();
    assert_eq!(status, ApprovalStatus::Approved);
  }
}
