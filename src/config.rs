use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Department the dashboards are scoped to (display + syllabus filter)
  pub default_department: Option<String>,
  /// Faculty id whose classes the classes view lists
  pub faculty_id: Option<i64>,
  /// Custom title for the header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the CRMS REST API, e.g. https://crms.example.edu/api
  pub url: String,
  /// Sent as the `user-id` header for department-scoped access control
  pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsConfig {
  /// Cluster labels to hide in the analytics view (case-insensitive)
  #[serde(default, deserialize_with = "deserialize_lowercase_set")]
  pub hide_clusters: BTreeSet<String>,
}

fn deserialize_lowercase_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(v.into_iter().map(|s| s.to_lowercase()).collect())
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./crms.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/crms/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/crms/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("crms.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("crms").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Bearer token for the API, if one is configured in the environment.
  ///
  /// Checks CRMS_API_TOKEN first, then CRMS_AUTH_TOKEN as fallback. Most
  /// read endpoints answer without one; writes will be rejected server-side.
  pub fn api_token() -> Option<String> {
    std::env::var("CRMS_API_TOKEN")
      .or_else(|_| std::env::var("CRMS_AUTH_TOKEN"))
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_minimal_config() {
    let config = Config::parse("api:\n  url: https://crms.example.edu/api\n").unwrap();
    assert_eq!(config.api.url, "https://crms.example.edu/api");
    assert!(config.faculty_id.is_none());
    assert!(config.analytics.hide_clusters.is_empty());
  }

  #[test]
  fn test_hide_clusters_are_lowercased() {
    let config = Config::parse(
      "api:\n  url: https://crms.example.edu/api\nanalytics:\n  hide_clusters:\n    - \"At Risk\"\n",
    )
    .unwrap();
    assert!(config.analytics.hide_clusters.contains("at risk"));
  }
}
