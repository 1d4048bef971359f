//! Minimized projections persisted by the cache mirror.
//!
//! Each projection is a strict field subset of its full record: the base64
//! blobs (banner images, avatars, photos, syllabus content) are dropped and
//! replaced by `has_*` presence flags. Projecting is pure and idempotent -
//! minimizing a record restored from its own projection changes nothing.

use serde::{Deserialize, Serialize};

use super::types::{
  AnalyticsReport, AnalyticsRow, ApprovalStatus, ClassRecord, ClusteringMeta, DashboardStats,
  StudentRecord, SyllabusRecord,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalClass {
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
  pub has_banner_image: bool,
  pub has_faculty_avatar: bool,
  pub updated_at: Option<String>,
}

impl From<&ClassRecord> for MinimalClass {
  fn from(c: &ClassRecord) -> Self {
    Self {
      section_course_id: c.section_course_id,
      section_id: c.section_id,
      section_code: c.section_code.clone(),
      course_id: c.course_id,
      course_code: c.course_code.clone(),
      course_title: c.course_title.clone(),
      instructor_id: c.instructor_id,
      faculty_name: c.faculty_name.clone(),
      term_id: c.term_id,
      semester: c.semester.clone(),
      school_year: c.school_year.clone(),
      banner_type: c.banner_type.clone(),
      banner_color: c.banner_color.clone(),
      has_banner_image: c.banner_image.is_some() || c.has_banner_image,
      has_faculty_avatar: c.faculty_avatar.is_some() || c.has_faculty_avatar,
      updated_at: c.updated_at.clone(),
    }
  }
}

impl From<MinimalClass> for ClassRecord {
  fn from(m: MinimalClass) -> Self {
    Self {
      section_course_id: m.section_course_id,
      section_id: m.section_id,
      section_code: m.section_code,
      course_id: m.course_id,
      course_code: m.course_code,
      course_title: m.course_title,
      instructor_id: m.instructor_id,
      faculty_name: m.faculty_name,
      term_id: m.term_id,
      semester: m.semester,
      school_year: m.school_year,
      banner_type: m.banner_type,
      banner_color: m.banner_color,
      banner_image: None,
      faculty_avatar: None,
      has_banner_image: m.has_banner_image,
      has_faculty_avatar: m.has_faculty_avatar,
      updated_at: m.updated_at,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalStudent {
  pub enrollment_id: i64,
  pub student_id: i64,
  pub student_number: String,
  pub full_name: String,
  pub contact_email: Option<String>,
  pub has_photo: bool,
}

impl From<&StudentRecord> for MinimalStudent {
  fn from(s: &StudentRecord) -> Self {
    Self {
      enrollment_id: s.enrollment_id,
      student_id: s.student_id,
      student_number: s.student_number.clone(),
      full_name: s.full_name.clone(),
      contact_email: s.contact_email.clone(),
      has_photo: s.student_photo.is_some() || s.has_photo,
    }
  }
}

impl From<MinimalStudent> for StudentRecord {
  fn from(m: MinimalStudent) -> Self {
    Self {
      enrollment_id: m.enrollment_id,
      student_id: m.student_id,
      student_number: m.student_number,
      full_name: m.full_name,
      contact_email: m.contact_email,
      student_photo: None,
      has_photo: m.has_photo,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalSyllabus {
  pub syllabus_id: i64,
  pub title: String,
  pub course_code: String,
  pub section_code: String,
  pub faculty_name: Option<String>,
  pub approval_status: ApprovalStatus,
  pub version: Option<String>,
  pub has_content: bool,
  pub updated_at: Option<String>,
}

impl From<&SyllabusRecord> for MinimalSyllabus {
  fn from(s: &SyllabusRecord) -> Self {
    Self {
      syllabus_id: s.syllabus_id,
      title: s.title.clone(),
      course_code: s.course_code.clone(),
      section_code: s.section_code.clone(),
      faculty_name: s.faculty_name.clone(),
      approval_status: s.approval_status,
      version: s.version.clone(),
      has_content: s.content.is_some() || s.has_content,
      updated_at: s.updated_at.clone(),
    }
  }
}

impl From<MinimalSyllabus> for SyllabusRecord {
  fn from(m: MinimalSyllabus) -> Self {
    Self {
      syllabus_id: m.syllabus_id,
      title: m.title,
      course_code: m.course_code,
      section_code: m.section_code,
      faculty_name: m.faculty_name,
      approval_status: m.approval_status,
      version: m.version,
      content: None,
      has_content: m.has_content,
      updated_at: m.updated_at,
    }
  }
}

/// Analytics rows carry no blobs; the projection exists so the persisted
/// shape stays stable if the full row grows server-side extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalAnalyticsReport {
  pub rows: Vec<AnalyticsRow>,
  pub clustering: ClusteringMeta,
}

impl From<&AnalyticsReport> for MinimalAnalyticsReport {
  fn from(r: &AnalyticsReport) -> Self {
    Self {
      rows: r.rows.clone(),
      clustering: r.clustering.clone(),
    }
  }
}

impl From<MinimalAnalyticsReport> for AnalyticsReport {
  fn from(m: MinimalAnalyticsReport) -> Self {
    Self {
      rows: m.rows,
      clustering: m.clustering,
    }
  }
}

/// Identity projection for the dashboard numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalStats {
  pub total_classes: i64,
  pub total_students: i64,
  pub total_faculty: i64,
  pub pending_syllabi: i64,
  pub approved_syllabi: i64,
  pub attendance_rate: Option<f64>,
}

impl From<&DashboardStats> for MinimalStats {
  fn from(s: &DashboardStats) -> Self {
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

impl From<MinimalStats> for DashboardStats {
  fn from(m: MinimalStats) -> Self {
    Self {
      total_classes: m.total_classes,
      total_students: m.total_students,
      total_faculty: m.total_faculty,
      pending_syllabi: m.pending_syllabi,
      approved_syllabi: m.approved_syllabi,
      attendance_rate: m.attendance_rate,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn class() -> ClassRecord {
    ClassRecord {
      section_course_id: 12,
      section_id: 3,
      section_code: "BSIT-3A".into(),
      course_id: 7,
      course_code: "IT301".into(),
      course_title: "Web Systems and Technologies".into(),
      instructor_id: Some(41),
      faculty_name: Some("R. Santos".into()),
      term_id: 2,
      semester: Some("1st Semester".into()),
      school_year: Some("2025-2026".into()),
      banner_type: Some("image".into()),
      banner_color: Some("#3B82F6".into()),
      banner_image: Some("aW1hZ2UtYnl0ZXM=".into()),
      faculty_avatar: None,
      has_banner_image: true,
      has_faculty_avatar: false,
      updated_at: Some("2026-01-15T08:00:00Z".into()),
    }
  }

  fn student(enrollment_id: i64, photo: Option<&str>) -> StudentRecord {
    StudentRecord {
      enrollment_id,
      student_id: enrollment_id + 100,
      student_number: format!("2023-{:05}", enrollment_id),
      full_name: "Alice Reyes".into(),
      contact_email: Some("alice@example.edu".into()),
      student_photo: photo.map(String::from),
      has_photo: photo.is_some(),
    }
  }

  #[test]
  fn test_minimal_class_drops_blobs_and_keeps_flags() {
    let minimal = MinimalClass::from(&class());
    assert!(minimal.has_banner_image);
    assert!(!minimal.has_faculty_avatar);

    let json = serde_json::to_value(&minimal).unwrap();
    assert!(json.get("banner_image").is_none());
    assert!(json.get("faculty_avatar").is_none());
  }

  #[test]
  fn test_class_minimizer_is_idempotent() {
    let once = MinimalClass::from(&class());
    let restored = ClassRecord::from(once.clone());
    let twice = MinimalClass::from(&restored);
    assert_eq!(once, twice);
  }

  #[test]
  fn test_student_minimizer_is_idempotent() {
    let once = MinimalStudent::from(&student(1, Some("cGhvdG8=")));
    let twice = MinimalStudent::from(&StudentRecord::from(once.clone()));
    assert_eq!(once, twice);
    assert!(twice.has_photo);
  }

  #[test]
  fn test_syllabus_minimizer_is_idempotent() {
    let record = SyllabusRecord {
      syllabus_id: 9,
      title: "IT301 Syllabus".into(),
      course_code: "IT301".into(),
      section_code: "BSIT-3A".into(),
      faculty_name: Some("R. Santos".into()),
      approval_status: ApprovalStatus::Pending,
      version: Some("v2".into()),
      content: Some("very large document".into()),
      has_content: true,
      updated_at: None,
    };

    let once = MinimalSyllabus::from(&record);
    let twice = MinimalSyllabus::from(&SyllabusRecord::from(once.clone()));
    assert_eq!(once, twice);
    assert!(twice.has_content);
  }

  #[test]
  fn test_restored_student_keeps_presence_flag_without_blob() {
    let restored = StudentRecord::from(MinimalStudent::from(&student(7, Some("cGhvdG8="))));
    assert_eq!(restored.student_photo, None);
    assert!(restored.has_photo);

    let restored = StudentRecord::from(MinimalStudent::from(&student(8, None)));
    assert!(!restored.has_photo);
  }
}
