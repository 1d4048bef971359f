use crate::config::Config;
use crate::crms::api_types::{
  ApiAnalyticsResponse, ApiClassRecord, ApiDashboardStats, ApiDepartment, ApiSchoolTerm,
  ApiStudentRecord, ApiSyllabus,
};
use crate::crms::types::{
  AnalyticsReport, ClassRecord, DashboardStats, Department, SchoolTerm, StudentRecord,
  SyllabusRecord,
};
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// CRMS REST API client wrapper.
#[derive(Clone)]
pub struct CrmsClient {
  http: reqwest::Client,
  base: Url,
}

impl CrmsClient {
  /// Cold-started backends routinely take tens of seconds to answer their
  /// first request.
  const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

  pub fn new(config: &Config) -> Result<Self> {
    let mut base = Url::parse(&config.api.url)
      .map_err(|e| eyre!("Invalid API url {}: {}", config.api.url, e))?;
    // Url::join treats a path without a trailing slash as a file and would
    // replace the last segment.
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    let mut headers = HeaderMap::new();
    if let Some(token) = Config::api_token() {
      let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| eyre!("Invalid API token: {}", e))?;
      headers.insert(AUTHORIZATION, value);
    }
    if let Some(user_id) = &config.api.user_id {
      // Department-scoped access control reads this on the server side.
      let value =
        HeaderValue::from_str(user_id).map_err(|e| eyre!("Invalid user id: {}", e))?;
      headers.insert("user-id", value);
    }

    let http = reqwest::Client::builder()
      .timeout(Self::REQUEST_TIMEOUT)
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base })
  }

  pub fn base_url(&self) -> &str {
    self.base.as_str()
  }

  /// GET a JSON endpoint with one silent retry on timeout.
  async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
    let url = self
      .base
      .join(path.trim_start_matches('/'))
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))?;

    let send = || async {
      self
        .http
        .get(url.clone())
        .query(query)
        .send()
        .await
    };

    let response = match send().await {
      Ok(response) => response,
      Err(e) if e.is_timeout() => {
        warn!(endpoint = path, "request timed out, retrying once");
        send().await.map_err(|e| eyre!("Request to {} failed: {}", path, e))?
      }
      Err(e) => return Err(eyre!("Request to {} failed: {}", path, e)),
    };

    let status = response.status();
    if !status.is_success() {
      return Err(eyre!("Request to {} failed with status {}", path, status));
    }

    debug!(endpoint = path, status = %status, "request ok");
    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse response from {}: {}", path, e))
  }

  /// All school terms.
  pub async fn school_terms(&self) -> Result<Vec<SchoolTerm>> {
    let terms: Vec<ApiSchoolTerm> = self.get_json("school-terms", &[]).await?;
    Ok(terms.into_iter().map(Into::into).collect())
  }

  /// All departments visible to the current user.
  pub async fn departments(&self) -> Result<Vec<Department>> {
    let departments: Vec<ApiDepartment> = self.get_json("departments", &[]).await?;
    Ok(departments.into_iter().map(Into::into).collect())
  }

  /// Section-courses taught by a faculty member.
  pub async fn faculty_classes(&self, faculty_id: i64) -> Result<Vec<ClassRecord>> {
    let classes: Vec<ApiClassRecord> = self
      .get_json(&format!("section-courses/faculty/{}", faculty_id), &[])
      .await?;
    Ok(classes.into_iter().map(ApiClassRecord::into_record).collect())
  }

  /// Students enrolled in a section-course.
  pub async fn section_students(&self, section_course_id: i64) -> Result<Vec<StudentRecord>> {
    let students: Vec<ApiStudentRecord> = self
      .get_json(
        &format!("section-courses/{}/students", section_course_id),
        &[],
      )
      .await?;
    Ok(
      students
        .into_iter()
        .map(ApiStudentRecord::into_record)
        .collect(),
    )
  }

  /// Syllabi visible to the current user (dean/program-chair review queue).
  pub async fn syllabi(&self) -> Result<Vec<SyllabusRecord>> {
    let syllabi: Vec<ApiSyllabus> = self.get_json("syllabi", &[]).await?;
    Ok(syllabi.into_iter().map(ApiSyllabus::into_record).collect())
  }

  /// Approve a pending syllabus (write operation, never cached).
  pub async fn approve_syllabus(&self, syllabus_id: i64) -> Result<()> {
    let url = self
      .base
      .join(&format!("syllabi/{}/approve", syllabus_id))
      .map_err(|e| eyre!("Invalid endpoint: {}", e))?;

    let response = self
      .http
      .patch(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to approve syllabus {}: {}", syllabus_id, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(eyre!(
        "Approving syllabus {} failed with status {}",
        syllabus_id,
        status
      ));
    }
    Ok(())
  }

  /// Headline dashboard numbers.
  pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
    let stats: ApiDashboardStats = self.get_json("dashboard/stats", &[]).await?;
    Ok(stats.into())
  }

  /// Student performance analytics with externally computed cluster labels.
  pub async fn dean_analytics(
    &self,
    term_id: Option<i64>,
    force_refresh: bool,
  ) -> Result<AnalyticsReport> {
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(term_id) = term_id {
      query.push(("term_id", term_id.to_string()));
    }
    if force_refresh {
      query.push(("force_refresh", "true".to_string()));
    }

    let response: ApiAnalyticsResponse = self
      .get_json("assessments/dean-analytics/sample", &query)
      .await?;

    if !response.success {
      return Err(eyre!(
        "Analytics request failed: {}",
        response.error.unwrap_or_else(|| "unknown error".to_string())
      ));
    }

    Ok(response.into_report())
  }
}
