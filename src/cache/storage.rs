//! Persistent cache tier over SQLite.
//!
//! This tier mirrors minimized projections of fetched data so a restart can
//! paint instantly from disk while the in-memory tier is still cold. It is
//! best-effort storage: every failure is absorbed here and logged, never
//! surfaced to callers.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// A row read back from the persistent tier.
#[derive(Debug, Clone)]
pub struct StoredEntry {
  pub value: Value,
  pub cached_at: DateTime<Utc>,
}

/// Trait for persistent cache backends.
///
/// All operations are infallible from the caller's point of view; `put`
/// reports refusal (oversized payload, quota exhaustion) as `false`.
pub trait PersistentStore: Send + Sync {
  fn put(&self, entity_type: &str, key: &str, value: &Value) -> bool;
  fn get(&self, entity_type: &str, key: &str) -> Option<StoredEntry>;
  fn remove(&self, entity_type: &str, key: &str);
  fn clear_type(&self, entity_type: &str);
  fn clear_all(&self);
  fn total_bytes(&self) -> u64;
}

/// Store implementation that doesn't persist anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStore;

impl PersistentStore for NoopStore {
  fn put(&self, _entity_type: &str, _key: &str, _value: &Value) -> bool {
    false // Discard
  }

  fn get(&self, _entity_type: &str, _key: &str) -> Option<StoredEntry> {
    None // Always miss
  }

  fn remove(&self, _entity_type: &str, _key: &str) {}

  fn clear_type(&self, _entity_type: &str) {}

  fn clear_all(&self) {}

  fn total_bytes(&self) -> u64 {
    0
  }
}

/// Entry types that only matter while a particular section is open. They are
/// the largest rows and the first to go when space runs out.
const SECTION_SCOPED_TYPES: &[&str] = &["students", "analytics_rows"];

/// SQLite-backed persistent cache tier.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  max_payload_bytes: usize,
  soft_quota_bytes: u64,
}

impl SqliteStore {
  /// Largest single payload the store will accept.
  pub const MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;
  /// Total payload budget before the priority sweep runs.
  pub const SOFT_QUOTA_BYTES: u64 = 32 * 1024 * 1024;

  /// Open or create the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open an in-memory store. Used by tests and `--no-persist` runs.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open cache database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
      max_payload_bytes: Self::MAX_PAYLOAD_BYTES,
      soft_quota_bytes: Self::SOFT_QUOTA_BYTES,
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Override the payload and quota limits.
  pub fn with_limits(mut self, max_payload_bytes: usize, soft_quota_bytes: u64) -> Self {
    self.max_payload_bytes = max_payload_bytes;
    self.soft_quota_bytes = soft_quota_bytes;
    self
  }

  /// Get the default database path.
  pub fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("crms").join("cache.db"))
  }

  fn lock(&self) -> MutexGuard<'_, Connection> {
    self.conn.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock();
    conn
      .execute_batch(MIRROR_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;
    Ok(())
  }

  fn stored_bytes(conn: &Connection) -> u64 {
    conn
      .query_row(
        "SELECT COALESCE(SUM(byte_size), 0) FROM mirror_cache",
        [],
        |row| row.get::<_, i64>(0),
      )
      .map(|n| n.max(0) as u64)
      .unwrap_or(0)
  }

  /// Free space in priority order: section-scoped rows first, then every
  /// classes row except the most recently cached one. Returns rows removed.
  fn sweep(conn: &Connection) -> usize {
    let mut removed = 0;

    for entity_type in SECTION_SCOPED_TYPES {
      match conn.execute(
        "DELETE FROM mirror_cache WHERE entity_type = ?",
        params![entity_type],
      ) {
        Ok(n) => removed += n,
        Err(e) => warn!(entity_type, error = %e, "cache sweep failed"),
      }
    }

    if removed == 0 {
      let keep: Option<String> = conn
        .query_row(
          "SELECT entry_key FROM mirror_cache WHERE entity_type = 'classes'
           ORDER BY cached_at DESC, entry_key LIMIT 1",
          [],
          |row| row.get(0),
        )
        .optional()
        .ok()
        .flatten();

      if let Some(keep) = keep {
        match conn.execute(
          "DELETE FROM mirror_cache WHERE entity_type = 'classes' AND entry_key != ?",
          params![keep],
        ) {
          Ok(n) => removed += n,
          Err(e) => warn!(error = %e, "cache sweep failed"),
        }
      }
    }

    if removed > 0 {
      debug!(removed, "swept persistent cache entries");
    }
    removed
  }
}

/// Schema for the mirror table.
const MIRROR_SCHEMA: &str = r#"
-- Minimized projections of fetched data (serialized JSON)
CREATE TABLE IF NOT EXISTS mirror_cache (
    entity_type TEXT NOT NULL,
    entry_key TEXT NOT NULL,
    data BLOB NOT NULL,
    byte_size INTEGER NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (entity_type, entry_key)
);

CREATE INDEX IF NOT EXISTS idx_mirror_cache_type
    ON mirror_cache(entity_type, cached_at);
"#;

impl PersistentStore for SqliteStore {
  fn put(&self, entity_type: &str, key: &str, value: &Value) -> bool {
    let data = match serde_json::to_vec(value) {
      Ok(data) => data,
      Err(e) => {
        warn!(entity_type, key, error = %e, "failed to serialize cache payload");
        return false;
      }
    };

    if data.len() > self.max_payload_bytes {
      warn!(
        entity_type,
        key,
        bytes = data.len(),
        "payload too large for persistent cache, skipping"
      );
      return false;
    }

    let conn = self.lock();

    if Self::stored_bytes(&conn) + data.len() as u64 > self.soft_quota_bytes {
      Self::sweep(&conn);
      if Self::stored_bytes(&conn) + data.len() as u64 > self.soft_quota_bytes {
        warn!(entity_type, key, "persistent cache quota exhausted, skipping");
        return false;
      }
    }

    match conn.execute(
      "INSERT OR REPLACE INTO mirror_cache (entity_type, entry_key, data, byte_size, cached_at)
       VALUES (?, ?, ?, ?, datetime('now'))",
      params![entity_type, key, data, data.len() as i64],
    ) {
      Ok(_) => true,
      Err(e) => {
        warn!(entity_type, key, error = %e, "failed to write cache entry");
        false
      }
    }
  }

  fn get(&self, entity_type: &str, key: &str) -> Option<StoredEntry> {
    let conn = self.lock();

    let row: (Vec<u8>, String) = conn
      .query_row(
        "SELECT data, cached_at FROM mirror_cache WHERE entity_type = ? AND entry_key = ?",
        params![entity_type, key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .unwrap_or_else(|e| {
        warn!(entity_type, key, error = %e, "failed to read cache entry");
        None
      })?;

    let (data, cached_at_str) = row;

    let value: Value = match serde_json::from_slice(&data) {
      Ok(value) => value,
      Err(e) => {
        // A corrupt row is worse than a miss; drop it so the next read is a
        // clean miss instead of a repeated parse failure.
        warn!(entity_type, key, error = %e, "corrupt cache entry, removing");
        let _ = conn.execute(
          "DELETE FROM mirror_cache WHERE entity_type = ? AND entry_key = ?",
          params![entity_type, key],
        );
        return None;
      }
    };

    let cached_at = match parse_datetime(&cached_at_str) {
      Ok(dt) => dt,
      Err(e) => {
        warn!(entity_type, key, error = %e, "corrupt cache timestamp, removing");
        let _ = conn.execute(
          "DELETE FROM mirror_cache WHERE entity_type = ? AND entry_key = ?",
          params![entity_type, key],
        );
        return None;
      }
    };

    Some(StoredEntry { value, cached_at })
  }

  fn remove(&self, entity_type: &str, key: &str) {
    let conn = self.lock();
    if let Err(e) = conn.execute(
      "DELETE FROM mirror_cache WHERE entity_type = ? AND entry_key = ?",
      params![entity_type, key],
    ) {
      warn!(entity_type, key, error = %e, "failed to remove cache entry");
    }
  }

  fn clear_type(&self, entity_type: &str) {
    let conn = self.lock();
    if let Err(e) = conn.execute(
      "DELETE FROM mirror_cache WHERE entity_type = ?",
      params![entity_type],
    ) {
      warn!(entity_type, error = %e, "failed to clear cache type");
    }
  }

  fn clear_all(&self) {
    let conn = self.lock();
    if let Err(e) = conn.execute("DELETE FROM mirror_cache", []) {
      warn!(error = %e, "failed to clear cache");
    }
  }

  fn total_bytes(&self) -> u64 {
    Self::stored_bytes(&self.lock())
  }
}

impl SqliteStore {
  /// Row counts per entity type, for diagnostics.
  pub fn type_counts(&self) -> Vec<(String, i64)> {
    let conn = self.lock();
    let mut stmt = match conn.prepare(
      "SELECT entity_type, COUNT(*) FROM mirror_cache GROUP BY entity_type ORDER BY entity_type",
    ) {
      Ok(stmt) => stmt,
      Err(e) => {
        warn!(error = %e, "failed to read cache stats");
        return Vec::new();
      }
    };

    stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
      .map(|rows| rows.filter_map(|r| r.ok()).collect())
      .unwrap_or_default()
  }
}

#[cfg(test)]
impl SqliteStore {
  /// Overwrite a row's payload with bytes that no longer parse as JSON.
  pub(crate) fn corrupt(&self, entity_type: &str, key: &str) {
    let conn = self.lock();
    conn
      .execute(
        "UPDATE mirror_cache SET data = ? WHERE entity_type = ? AND entry_key = ?",
        params![b"{truncated".to_vec(), entity_type, key],
      )
      .unwrap();
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn store() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
  }

  #[test]
  fn test_put_then_get_roundtrip() {
    let store = store();
    let value = json!([{"section_course_id": 12, "course_code": "IT301"}]);

    assert!(store.put("classes", "faculty:7", &value));
    let entry = store.get("classes", "faculty:7").unwrap();
    assert_eq!(entry.value, value);
  }

  #[test]
  fn test_oversized_payload_is_refused_without_writing() {
    let store = store().with_limits(64, SqliteStore::SOFT_QUOTA_BYTES);
    let value = json!({"content": "x".repeat(256)});

    assert!(!store.put("syllabi", "syllabus:1", &value));
    assert!(store.get("syllabi", "syllabus:1").is_none());
    assert_eq!(store.total_bytes(), 0);
  }

  #[test]
  fn test_corrupt_row_is_removed_and_reads_as_miss() {
    let store = store();
    store.put("students", "section:3", &json!([{"student_id": 1}]));
    store.corrupt("students", "section:3");

    assert!(store.get("students", "section:3").is_none());
    // The corrupt row is gone, not just skipped.
    assert!(store.get("students", "section:3").is_none());
    assert_eq!(store.total_bytes(), 0);
  }

  #[test]
  fn test_quota_sweep_clears_section_scoped_rows_first() {
    let store = store().with_limits(SqliteStore::MAX_PAYLOAD_BYTES, 600);
    let filler = json!({"rows": "y".repeat(200)});

    assert!(store.put("classes", "faculty:7", &filler));
    assert!(store.put("students", "section:3", &filler));

    // This put pushes past the quota; the students row must go, classes stays.
    assert!(store.put("terms", "all", &filler));
    assert!(store.get("students", "section:3").is_none());
    assert!(store.get("classes", "faculty:7").is_some());
    assert!(store.get("terms", "all").is_some());
  }

  #[test]
  fn test_quota_sweep_keeps_most_recent_class_list() {
    let store = store().with_limits(SqliteStore::MAX_PAYLOAD_BYTES, 600);
    let filler = json!({"rows": "y".repeat(200)});

    assert!(store.put("classes", "faculty:7", &filler));
    assert!(store.put("classes", "faculty:8", &filler));
    // Make faculty:8 unambiguously the newest row.
    {
      let conn = store.lock();
      conn
        .execute(
          "UPDATE mirror_cache SET cached_at = datetime('now', '+1 hour') WHERE entry_key = 'faculty:8'",
          [],
        )
        .unwrap();
    }

    // No section-scoped rows exist, so the sweep falls back to trimming class
    // lists down to the newest one.
    assert!(store.put("terms", "all", &filler));
    assert!(store.get("classes", "faculty:7").is_none());
    assert!(store.get("classes", "faculty:8").is_some());
  }

  #[test]
  fn test_put_refused_when_sweep_cannot_free_enough() {
    let store = store().with_limits(SqliteStore::MAX_PAYLOAD_BYTES, 300);
    let filler = json!({"rows": "y".repeat(200)});

    assert!(store.put("terms", "all", &filler));
    // Nothing sweepable (no section rows, no surplus class lists): refused.
    assert!(!store.put("departments", "all", &filler));
    assert!(store.get("departments", "all").is_none());
    assert!(store.get("terms", "all").is_some());
  }

  #[test]
  fn test_clear_type_and_clear_all() {
    let store = store();
    store.put("classes", "a", &json!(1));
    store.put("terms", "b", &json!(2));

    store.clear_type("classes");
    assert!(store.get("classes", "a").is_none());
    assert!(store.get("terms", "b").is_some());

    store.clear_all();
    assert!(store.get("terms", "b").is_none());
    assert_eq!(store.total_bytes(), 0);
  }
}
