//! In-memory cache tier with per-kind TTLs and a bounded entry count.
//!
//! Entries are serialized JSON values keyed by `(kind, key)`. Expiry is
//! checked at read time; the size cap is enforced at write time by sweeping
//! expired entries first and evicting the oldest survivors only if the sweep
//! freed nothing.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Logical cache types, each with its own TTL and keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
  Analytics,
  Classes,
  Students,
  Syllabi,
  Departments,
  Terms,
  Stats,
}

impl CacheKind {
  pub const ALL: [CacheKind; 7] = [
    CacheKind::Analytics,
    CacheKind::Classes,
    CacheKind::Students,
    CacheKind::Syllabi,
    CacheKind::Departments,
    CacheKind::Terms,
    CacheKind::Stats,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      CacheKind::Analytics => "analytics",
      CacheKind::Classes => "classes",
      CacheKind::Students => "students",
      CacheKind::Syllabi => "syllabi",
      CacheKind::Departments => "departments",
      CacheKind::Terms => "terms",
      CacheKind::Stats => "stats",
    }
  }

  /// How long entries of this kind stay fresh.
  ///
  /// Reference data (departments, terms) changes rarely; analytics is
  /// expensive to recompute server-side so it gets a longer window than the
  /// per-section lists.
  pub fn default_ttl(&self) -> Duration {
    match self {
      CacheKind::Analytics => Duration::from_secs(10 * 60),
      CacheKind::Classes => Duration::from_secs(5 * 60),
      CacheKind::Students => Duration::from_secs(5 * 60),
      CacheKind::Syllabi => Duration::from_secs(5 * 60),
      CacheKind::Stats => Duration::from_secs(5 * 60),
      CacheKind::Departments => Duration::from_secs(30 * 60),
      CacheKind::Terms => Duration::from_secs(30 * 60),
    }
  }
}

impl std::fmt::Display for CacheKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone)]
struct Entry {
  data: Value,
  stored_at: Instant,
}

#[derive(Default)]
struct State {
  caches: HashMap<CacheKind, HashMap<String, Entry>>,
  last_updated: HashMap<CacheKind, DateTime<Utc>>,
}

/// Per-kind entry counts and rough sizes, for diagnostics only.
#[derive(Debug, Clone)]
pub struct CacheStats {
  pub total_entries: usize,
  pub approx_bytes: usize,
  pub kinds: Vec<KindStats>,
}

#[derive(Debug, Clone)]
pub struct KindStats {
  pub kind: CacheKind,
  pub entries: usize,
  pub approx_bytes: usize,
  pub last_updated: Option<DateTime<Utc>>,
}

/// The in-memory cache tier.
///
/// Construct one per application and share it via `Arc`; there is no global
/// instance. Reads and writes never fail; the only fallible operation is
/// [`MemoryCache::get_with_refresh`], which surfaces its fetcher's error.
pub struct MemoryCache {
  state: Mutex<State>,
  max_entries: usize,
}

impl Default for MemoryCache {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryCache {
  /// Maximum entries per cache kind before eviction kicks in.
  pub const DEFAULT_MAX_ENTRIES: usize = 100;

  pub fn new() -> Self {
    Self {
      state: Mutex::new(State::default()),
      max_entries: Self::DEFAULT_MAX_ENTRIES,
    }
  }

  /// Override the per-kind entry cap.
  pub fn with_max_entries(mut self, max_entries: usize) -> Self {
    self.max_entries = max_entries.max(1);
    self
  }

  // The maps hold plain data, so a panic mid-operation cannot leave them in a
  // state worth rejecting.
  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Look up an entry, enforcing its TTL.
  ///
  /// An expired entry is removed on the spot; the next `get` misses too.
  pub fn get(&self, kind: CacheKind, key: &str, custom_ttl: Option<Duration>) -> Option<Value> {
    let mut state = self.lock();
    let cache = state.caches.get_mut(&kind)?;

    let ttl = custom_ttl.unwrap_or_else(|| kind.default_ttl());
    let expired = match cache.get(key) {
      Some(entry) => entry.stored_at.elapsed() > ttl,
      None => return None,
    };

    if expired {
      cache.remove(key);
      debug!(kind = %kind, key, "cache entry expired");
      return None;
    }

    trace!(kind = %kind, key, "cache hit");
    cache.get(key).map(|entry| entry.data.clone())
  }

  /// Insert or overwrite an entry.
  ///
  /// When the kind is at capacity, expired entries are swept first; if the
  /// sweep frees nothing, the oldest entries are evicted so the map never
  /// exceeds the cap after the insert.
  pub fn set(&self, kind: CacheKind, key: &str, data: Value) -> bool {
    let mut state = self.lock();
    let max_entries = self.max_entries;
    let cache = state.caches.entry(kind).or_default();

    if cache.len() >= max_entries && !cache.contains_key(key) {
      let swept = sweep_expired(cache, kind.default_ttl());
      if swept > 0 {
        debug!(kind = %kind, swept, "swept expired cache entries");
      }
      while cache.len() >= max_entries {
        let oldest = cache
          .iter()
          .min_by_key(|(_, e)| e.stored_at)
          .map(|(k, _)| k.clone());
        match oldest {
          Some(k) => {
            cache.remove(&k);
            debug!(kind = %kind, key = %k, "evicted oldest cache entry");
          }
          None => break,
        }
      }
    }

    cache.insert(
      key.to_string(),
      Entry {
        data,
        stored_at: Instant::now(),
      },
    );
    state.last_updated.insert(kind, Utc::now());
    trace!(kind = %kind, key, "cache store");
    true
  }

  /// Remove one entry, or every entry of a kind.
  pub fn clear(&self, kind: CacheKind, key: Option<&str>) {
    let mut state = self.lock();
    match key {
      Some(k) => {
        if let Some(cache) = state.caches.get_mut(&kind) {
          cache.remove(k);
        }
      }
      None => {
        state.caches.remove(&kind);
        state.last_updated.remove(&kind);
      }
    }
  }

  /// Empty every kind.
  pub fn clear_all(&self) {
    let mut state = self.lock();
    state.caches.clear();
    state.last_updated.clear();
  }

  /// Entry counts and serialized-size estimates per kind.
  pub fn stats(&self) -> CacheStats {
    let state = self.lock();
    let mut kinds = Vec::with_capacity(CacheKind::ALL.len());
    let mut total_entries = 0;
    let mut approx_bytes = 0;

    for kind in CacheKind::ALL {
      let (entries, bytes) = state
        .caches
        .get(&kind)
        .map(|cache| {
          let bytes: usize = cache
            .iter()
            .map(|(k, e)| k.len() + e.data.to_string().len())
            .sum();
          (cache.len(), bytes)
        })
        .unwrap_or((0, 0));

      total_entries += entries;
      approx_bytes += bytes;
      kinds.push(KindStats {
        kind,
        entries,
        approx_bytes: bytes,
        last_updated: state.last_updated.get(&kind).copied(),
      });
    }

    CacheStats {
      total_entries,
      approx_bytes,
      kinds,
    }
  }

  /// Get-or-populate. The only path through this tier that can fail, and it
  /// fails only with the fetcher's own error.
  pub async fn get_with_refresh<F, Fut>(
    &self,
    kind: CacheKind,
    key: &str,
    fetch: F,
    custom_ttl: Option<Duration>,
  ) -> Result<Value>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value>>,
  {
    if let Some(cached) = self.get(kind, key, custom_ttl) {
      return Ok(cached);
    }

    let data = fetch().await?;
    self.set(kind, key, data.clone());
    Ok(data)
  }

  #[cfg(test)]
  pub(crate) fn backdate(&self, kind: CacheKind, key: &str, age: Duration) {
    let mut state = self.lock();
    if let Some(entry) = state.caches.get_mut(&kind).and_then(|c| c.get_mut(key)) {
      entry.stored_at = Instant::now() - age;
    }
  }
}

fn sweep_expired(cache: &mut HashMap<String, Entry>, ttl: Duration) -> usize {
  let before = cache.len();
  cache.retain(|_, e| e.stored_at.elapsed() <= ttl);
  before - cache.len()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_set_then_get_returns_stored_value() {
    let cache = MemoryCache::new();
    let value = json!({"section_code": "BSIT-3A", "course_code": "IT301"});

    assert!(cache.set(CacheKind::Classes, "faculty:7", value.clone()));
    assert_eq!(cache.get(CacheKind::Classes, "faculty:7", None), Some(value));
  }

  #[test]
  fn test_expired_entry_is_removed_on_get() {
    let cache = MemoryCache::new();
    cache.set(CacheKind::Terms, "all", json!([1, 2, 3]));

    // Zero TTL: immediately expired, and the entry must be deleted...
    assert_eq!(
      cache.get(CacheKind::Terms, "all", Some(Duration::ZERO)),
      None
    );
    // ...so a follow-up read with the generous default TTL misses too.
    assert_eq!(cache.get(CacheKind::Terms, "all", None), None);
  }

  #[test]
  fn test_set_overwrites_existing_entry() {
    let cache = MemoryCache::new();
    cache.set(CacheKind::Stats, "dashboard", json!({"students": 10}));
    cache.set(CacheKind::Stats, "dashboard", json!({"students": 11}));

    assert_eq!(
      cache.get(CacheKind::Stats, "dashboard", None),
      Some(json!({"students": 11}))
    );
  }

  #[test]
  fn test_capacity_sweep_prefers_expired_entries() {
    let cache = MemoryCache::new();
    for i in 0..MemoryCache::DEFAULT_MAX_ENTRIES {
      cache.set(CacheKind::Classes, &format!("key-{i}"), json!(i));
    }
    // Age a third of the entries past the Classes TTL.
    for i in 0..30 {
      cache.backdate(
        CacheKind::Classes,
        &format!("key-{i}"),
        Duration::from_secs(6 * 60),
      );
    }

    cache.set(CacheKind::Classes, "key-overflow", json!("fresh"));

    let stats = cache.stats();
    let classes = stats
      .kinds
      .iter()
      .find(|k| k.kind == CacheKind::Classes)
      .unwrap();
    assert!(classes.entries <= MemoryCache::DEFAULT_MAX_ENTRIES);
    // Expired entries went first; the fresh ones survived.
    assert_eq!(cache.get(CacheKind::Classes, "key-0", None), None);
    assert!(cache.get(CacheKind::Classes, "key-99", None).is_some());
    assert!(cache.get(CacheKind::Classes, "key-overflow", None).is_some());
  }

  #[test]
  fn test_capacity_evicts_oldest_when_nothing_expired() {
    let cache = MemoryCache::new().with_max_entries(3);
    cache.set(CacheKind::Syllabi, "a", json!(1));
    cache.set(CacheKind::Syllabi, "b", json!(2));
    cache.set(CacheKind::Syllabi, "c", json!(3));
    // Make "b" clearly the oldest without expiring it.
    cache.backdate(CacheKind::Syllabi, "b", Duration::from_secs(60));

    cache.set(CacheKind::Syllabi, "d", json!(4));

    assert_eq!(cache.get(CacheKind::Syllabi, "b", None), None);
    assert!(cache.get(CacheKind::Syllabi, "a", None).is_some());
    assert!(cache.get(CacheKind::Syllabi, "d", None).is_some());
  }

  #[test]
  fn test_clear_single_entry_and_kind() {
    let cache = MemoryCache::new();
    cache.set(CacheKind::Departments, "all", json!(["CCS"]));
    cache.set(CacheKind::Departments, "ccs", json!({"name": "CCS"}));

    cache.clear(CacheKind::Departments, Some("all"));
    assert_eq!(cache.get(CacheKind::Departments, "all", None), None);
    assert!(cache.get(CacheKind::Departments, "ccs", None).is_some());

    cache.clear(CacheKind::Departments, None);
    assert_eq!(cache.get(CacheKind::Departments, "ccs", None), None);
  }

  #[test]
  fn test_stats_counts_entries() {
    let cache = MemoryCache::new();
    cache.set(CacheKind::Classes, "a", json!({"x": 1}));
    cache.set(CacheKind::Classes, "b", json!({"x": 2}));
    cache.set(CacheKind::Terms, "all", json!([]));

    let stats = cache.stats();
    assert_eq!(stats.total_entries, 3);
    assert!(stats.approx_bytes > 0);
    let classes = stats
      .kinds
      .iter()
      .find(|k| k.kind == CacheKind::Classes)
      .unwrap();
    assert_eq!(classes.entries, 2);
    assert!(classes.last_updated.is_some());
  }

  #[tokio::test]
  async fn test_get_with_refresh_populates_on_miss() {
    let cache = MemoryCache::new();
    let value = cache
      .get_with_refresh(CacheKind::Terms, "all", || async { Ok(json!([2024])) }, None)
      .await
      .unwrap();

    assert_eq!(value, json!([2024]));
    assert_eq!(cache.get(CacheKind::Terms, "all", None), Some(json!([2024])));
  }

  #[tokio::test]
  async fn test_get_with_refresh_skips_fetch_on_hit() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let cache = MemoryCache::new();
    cache.set(CacheKind::Terms, "all", json!([2023]));

    let fetched = AtomicBool::new(false);
    let value = cache
      .get_with_refresh(
        CacheKind::Terms,
        "all",
        || {
          fetched.store(true, Ordering::SeqCst);
          async { Ok(json!([9999])) }
        },
        None,
      )
      .await
      .unwrap();

    assert_eq!(value, json!([2023]));
    assert!(!fetched.load(Ordering::SeqCst));
  }

  #[tokio::test]
  async fn test_get_with_refresh_propagates_fetch_error() {
    let cache = MemoryCache::new();
    let result = cache
      .get_with_refresh(
        CacheKind::Analytics,
        "term:1",
        || async { Err::<Value, _>(color_eyre::eyre::eyre!("backend unavailable")) },
        None,
      )
      .await;

    assert!(result.is_err());
    assert_eq!(cache.get(CacheKind::Analytics, "term:1", None), None);
  }
}
