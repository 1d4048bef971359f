use ratatui::prelude::Color;

use crate::crms::types::ApprovalStatus;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.len() <= max_len {
    s.to_string()
  } else {
    format!("{}...", &s[..max_len.saturating_sub(3)])
  }
}

/// Display color for a cluster label from the clustering service.
///
/// Label wording varies across clustering runs ("At Risk" vs "Needs
/// Support"), so this matches on fragments, most severe first.
pub fn cluster_color(label: &str) -> Color {
  let normalized = label.to_lowercase();

  if normalized.contains("risk") || normalized.contains("support") {
    return Color::Red;
  }
  if normalized.contains("improvement")
    || normalized.contains("guidance")
    || normalized.contains("needs")
  {
    return Color::Yellow;
  }
  if normalized.contains("average")
    || normalized.contains("performing")
    || normalized.contains("track")
  {
    return Color::Blue;
  }
  if normalized.contains("excellent") || normalized.contains("high") {
    return Color::Green;
  }
  Color::Gray
}

/// Display color for a syllabus approval status.
pub fn approval_color(status: ApprovalStatus) -> Color {
  match status {
    ApprovalStatus::Approved => Color::Green,
    ApprovalStatus::Pending => Color::Yellow,
    ApprovalStatus::Rejected => Color::Red,
    ApprovalStatus::Draft | ApprovalStatus::Unknown => Color::DarkGray,
  }
}

/// Format an optional percentage with one decimal, or a dash.
pub fn fmt_pct(value: Option<f64>) -> String {
  match value {
    Some(v) => format!("{:.1}%", v),
    None => "-".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_cluster_color_severity_fragments() {
    assert_eq!(cluster_color("At Risk"), Color::Red);
    assert_eq!(cluster_color("Needs Support"), Color::Red);
    assert_eq!(cluster_color("Needs Improvement"), Color::Yellow);
    assert_eq!(cluster_color("Needs Guidance"), Color::Yellow);
    assert_eq!(cluster_color("Average Performance"), Color::Blue);
    assert_eq!(cluster_color("On Track"), Color::Blue);
    assert_eq!(cluster_color("Performing Well"), Color::Blue);
    assert_eq!(cluster_color("Excellent Performance"), Color::Green);
    assert_eq!(cluster_color("Cluster 3"), Color::Gray);
  }

  #[test]
  fn test_cluster_color_needs_beats_performance_wording() {
    // "Needs Improvement" must not fall through to the "performance" bucket.
    assert_eq!(cluster_color("needs improvement"), Color::Yellow);
  }

  #[test]
  fn test_approval_colors() {
    assert_eq!(approval_color(ApprovalStatus::Approved), Color::Green);
    assert_eq!(approval_color(ApprovalStatus::Pending), Color::Yellow);
    assert_eq!(approval_color(ApprovalStatus::Rejected), Color::Red);
    assert_eq!(approval_color(ApprovalStatus::Unknown), Color::DarkGray);
  }

  #[test]
  fn test_fmt_pct() {
    assert_eq!(fmt_pct(Some(87.25)), "87.2%");
    assert_eq!(fmt_pct(None), "-");
  }
}
