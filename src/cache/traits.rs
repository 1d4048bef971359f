//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

/// Trait for entities that can be cached.
///
/// Implementors must provide a unique cache key and optionally an updated_at
/// timestamp so stores can tell apart revisions of the same record.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this entity (e.g., section_course_id, syllabus_id)
  fn cache_key(&self) -> String;

  /// Last modification timestamp (ISO 8601).
  /// Returns None if the entity doesn't track modification time.
  fn updated_at(&self) -> Option<&str>;

  /// Entity type name for storage organization (e.g., "class", "student")
  fn entity_type() -> &'static str;
}

/// Trait for the logical identity of a fetch target.
///
/// The hash is what both cache tiers key on; the description is for logs and
/// diagnostics only.
pub trait QueryKey {
  /// Stable, fixed-length key derived from the normalized query inputs.
  fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.normalized().as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Normalized string form of the query inputs (trimmed, lowercased where
  /// matching is case-insensitive). Input to the hash.
  fn normalized(&self) -> String;

  /// Human-readable description for logs.
  fn description(&self) -> String;
}

/// A cacheable type with a declared persisted projection.
///
/// The projection is what the persistent tier stores: a strict field subset
/// with blobs replaced by presence flags. Restoring it yields the full type
/// with the blobs absent and the flags kept. Small types declare themselves
/// as their own projection.
pub trait Mirrored: Cacheable {
  type Projection: Cacheable + for<'a> From<&'a Self> + Into<Self>;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data. The memory tier tracks age
  /// monotonically and has no wall-clock timestamp to report.
  pub fn from_cache(data: T, cached_at: Option<DateTime<Utc>>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      cached_at,
    }
  }

  /// Create a new cache result for offline fallback.
  pub fn offline(data: T, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache, considered stale but usable for instant paint
  CacheStale,
  /// Network unavailable, serving whatever a cache tier had
  Offline,
}

#[cfg(test)]
mod tests {
  use super::*;

  struct FacultyKey {
    faculty_id: i64,
  }

  impl QueryKey for FacultyKey {
    fn normalized(&self) -> String {
      format!("faculty_classes:{}", self.faculty_id)
    }

    fn description(&self) -> String {
      format!("classes for faculty {}", self.faculty_id)
    }
  }

  #[test]
  fn test_cache_hash_is_stable() {
    let a = FacultyKey { faculty_id: 7 }.cache_hash();
    let b = FacultyKey { faculty_id: 7 }.cache_hash();
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
  }

  #[test]
  fn test_cache_hash_differs_per_input() {
    let a = FacultyKey { faculty_id: 7 }.cache_hash();
    let b = FacultyKey { faculty_id: 8 }.cache_hash();
    assert_ne!(a, b);
  }
}
