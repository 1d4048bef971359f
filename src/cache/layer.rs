//! Cache layer that coordinates the memory tier, the persistent mirror, and
//! network fetching.
//!
//! Read path: a fresh memory hit short-circuits; otherwise the network is
//! fetched and both tiers are updated - the memory tier with the full value,
//! the persistent tier with its minimized projection. On network failure the
//! persistent tier is served as offline fallback, regardless of age. An error
//! reaches the caller only when every tier misses.

use color_eyre::Result;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::memory::{CacheKind, MemoryCache};
use super::storage::PersistentStore;
use super::traits::{CacheResult, Cacheable, Mirrored, QueryKey};

/// Tiered cache coordinator.
///
/// Cheap to clone; both tiers are shared. What each type persists is declared
/// by its [`Mirrored`] projection, so call sites cannot forget to minimize.
pub struct CacheLayer<S: PersistentStore> {
  memory: Arc<MemoryCache>,
  store: Arc<S>,
}

impl<S: PersistentStore> CacheLayer<S> {
  pub fn new(memory: Arc<MemoryCache>, store: Arc<S>) -> Self {
    Self { memory, store }
  }

  pub fn memory(&self) -> &MemoryCache {
    &self.memory
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Synchronous read for instant paint: memory tier first, then the
  /// minimized persistent projection. Never touches the network.
  pub fn peek_list<T: Mirrored>(
    &self,
    kind: CacheKind,
    key: &impl QueryKey,
  ) -> Option<CacheResult<Vec<T>>> {
    let hash = key.cache_hash();

    if let Some(value) = self.memory.get(kind, &hash, None) {
      if let Ok(items) = serde_json::from_value::<Vec<T>>(value) {
        return Some(CacheResult::from_cache(items, None, false));
      }
      // The stored shape no longer matches the type; treat as a miss.
      self.memory.clear(kind, Some(&hash));
    }

    let entry = self.store.get(T::Projection::entity_type(), &hash)?;
    let minimal: Vec<T::Projection> = serde_json::from_value(entry.value).ok()?;
    let items = minimal.into_iter().map(Into::into).collect();
    Some(CacheResult::from_cache(items, Some(entry.cached_at), true))
  }

  /// Synchronous single-entity read for instant paint.
  pub fn peek_one<T: Mirrored>(
    &self,
    kind: CacheKind,
    key: &impl QueryKey,
  ) -> Option<CacheResult<T>> {
    let hash = key.cache_hash();

    if let Some(value) = self.memory.get(kind, &hash, None) {
      if let Ok(item) = serde_json::from_value::<T>(value) {
        return Some(CacheResult::from_cache(item, None, false));
      }
      self.memory.clear(kind, Some(&hash));
    }

    let entry = self.store.get(T::Projection::entity_type(), &hash)?;
    let minimal: T::Projection = serde_json::from_value(entry.value).ok()?;
    Some(CacheResult::from_cache(
      minimal.into(),
      Some(entry.cached_at),
      true,
    ))
  }

  /// Fetch a list with cache-first strategy.
  pub async fn fetch_list<T, F, Fut>(
    &self,
    kind: CacheKind,
    key: &impl QueryKey,
    fetcher: F,
  ) -> Result<CacheResult<Vec<T>>>
  where
    T: Mirrored,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    self.fetch_list_inner(kind, key, fetcher, false).await
  }

  /// Fetch a list, bypassing the fresh-hit shortcut. Both tiers are still
  /// updated on success and still serve as fallback on failure.
  pub async fn refresh_list<T, F, Fut>(
    &self,
    kind: CacheKind,
    key: &impl QueryKey,
    fetcher: F,
  ) -> Result<CacheResult<Vec<T>>>
  where
    T: Mirrored,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    self.fetch_list_inner(kind, key, fetcher, true).await
  }

  async fn fetch_list_inner<T, F, Fut>(
    &self,
    kind: CacheKind,
    key: &impl QueryKey,
    fetcher: F,
    force: bool,
  ) -> Result<CacheResult<Vec<T>>>
  where
    T: Mirrored,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let hash = key.cache_hash();

    if !force {
      if let Some(value) = self.memory.get(kind, &hash, None) {
        if let Ok(items) = serde_json::from_value::<Vec<T>>(value) {
          debug!(kind = %kind, query = %key.description(), "serving fresh cache");
          return Ok(CacheResult::from_cache(items, None, false));
        }
        self.memory.clear(kind, Some(&hash));
      }
    }

    match fetcher().await {
      Ok(items) => {
        self.store_list_tiers(kind, &hash, &items);
        Ok(CacheResult::from_network(items))
      }
      Err(err) => {
        if let Some(entry) = self.store.get(T::Projection::entity_type(), &hash) {
          if let Ok(minimal) = serde_json::from_value::<Vec<T::Projection>>(entry.value) {
            warn!(
              kind = %kind,
              query = %key.description(),
              error = %err,
              "fetch failed, serving persistent cache"
            );
            let items = minimal.into_iter().map(Into::into).collect();
            return Ok(CacheResult::offline(items, Some(entry.cached_at)));
          }
        }
        Err(err)
      }
    }
  }

  /// Fetch a single entity with the same tier contract as [`fetch_list`].
  ///
  /// [`fetch_list`]: CacheLayer::fetch_list
  pub async fn fetch_one<T, F, Fut>(
    &self,
    kind: CacheKind,
    key: &impl QueryKey,
    fetcher: F,
  ) -> Result<CacheResult<T>>
  where
    T: Mirrored,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    self.fetch_one_inner(kind, key, fetcher, false).await
  }

  /// Fetch a single entity, bypassing the fresh-hit shortcut.
  pub async fn refresh_one<T, F, Fut>(
    &self,
    kind: CacheKind,
    key: &impl QueryKey,
    fetcher: F,
  ) -> Result<CacheResult<T>>
  where
    T: Mirrored,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    self.fetch_one_inner(kind, key, fetcher, true).await
  }

  async fn fetch_one_inner<T, F, Fut>(
    &self,
    kind: CacheKind,
    key: &impl QueryKey,
    fetcher: F,
    force: bool,
  ) -> Result<CacheResult<T>>
  where
    T: Mirrored,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let hash = key.cache_hash();

    if !force {
      if let Some(value) = self.memory.get(kind, &hash, None) {
        if let Ok(item) = serde_json::from_value::<T>(value) {
          return Ok(CacheResult::from_cache(item, None, false));
        }
        self.memory.clear(kind, Some(&hash));
      }
    }

    match fetcher().await {
      Ok(item) => {
        match serde_json::to_value(&item) {
          Ok(value) => {
            self.memory.set(kind, &hash, value);
          }
          Err(e) => warn!(kind = %kind, error = %e, "failed to serialize for memory cache"),
        }
        let minimal = T::Projection::from(&item);
        if let Ok(value) = serde_json::to_value(&minimal) {
          self.store.put(T::Projection::entity_type(), &hash, &value);
        }
        Ok(CacheResult::from_network(item))
      }
      Err(err) => {
        if let Some(entry) = self.store.get(T::Projection::entity_type(), &hash) {
          if let Ok(minimal) = serde_json::from_value::<T::Projection>(entry.value) {
            warn!(kind = %kind, error = %err, "fetch failed, serving persistent cache");
            return Ok(CacheResult::offline(minimal.into(), Some(entry.cached_at)));
          }
        }
        Err(err)
      }
    }
  }

  fn store_list_tiers<T: Mirrored>(&self, kind: CacheKind, hash: &str, items: &[T]) {
    match serde_json::to_value(items) {
      Ok(value) => {
        self.memory.set(kind, hash, value);
      }
      Err(e) => warn!(kind = %kind, error = %e, "failed to serialize for memory cache"),
    }

    let minimal: Vec<T::Projection> = items.iter().map(T::Projection::from).collect();
    match serde_json::to_value(&minimal) {
      Ok(value) => {
        self.store.put(T::Projection::entity_type(), hash, &value);
      }
      Err(e) => warn!(kind = %kind, error = %e, "failed to serialize for persistent cache"),
    }
  }

  /// Drop one query's entry from both tiers at once, so the minimized mirror
  /// can never outlive its full counterpart for this key.
  pub fn invalidate<P: Cacheable, K: QueryKey>(&self, kind: CacheKind, key: &K) {
    let hash = key.cache_hash();
    self.memory.clear(kind, Some(&hash));
    self.store.remove(P::entity_type(), &hash);
  }

  /// Drop every entry of a kind from both tiers.
  pub fn invalidate_kind<P: Cacheable>(&self, kind: CacheKind) {
    self.memory.clear(kind, None);
    self.store.clear_type(P::entity_type());
  }

  /// Raw memory-tier value for diagnostics.
  pub fn raw(&self, kind: CacheKind, key: &impl QueryKey) -> Option<Value> {
    self.memory.get(kind, &key.cache_hash(), None)
  }
}

impl<S: PersistentStore> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      memory: Arc::clone(&self.memory),
      store: Arc::clone(&self.store),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::SqliteStore;
  use color_eyre::eyre::eyre;
  use serde::{Deserialize, Serialize};
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Record {
    id: i64,
    name: String,
    photo: Option<String>,
    has_photo: bool,
  }

  impl Cacheable for Record {
    fn cache_key(&self) -> String {
      self.id.to_string()
    }

    fn updated_at(&self) -> Option<&str> {
      None
    }

    fn entity_type() -> &'static str {
      "record"
    }
  }

  impl Mirrored for Record {
    type Projection = RecordLite;
  }

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct RecordLite {
    id: i64,
    name: String,
    has_photo: bool,
  }

  impl Cacheable for RecordLite {
    fn cache_key(&self) -> String {
      self.id.to_string()
    }

    fn updated_at(&self) -> Option<&str> {
      None
    }

    fn entity_type() -> &'static str {
      "record_lite"
    }
  }

  impl From<&Record> for RecordLite {
    fn from(r: &Record) -> Self {
      Self {
        id: r.id,
        name: r.name.clone(),
        has_photo: r.photo.is_some() || r.has_photo,
      }
    }
  }

  impl From<RecordLite> for Record {
    fn from(l: RecordLite) -> Self {
      Self {
        id: l.id,
        name: l.name,
        photo: None,
        has_photo: l.has_photo,
      }
    }
  }

  struct Key(&'static str);

  impl QueryKey for Key {
    fn normalized(&self) -> String {
      self.0.to_string()
    }

    fn description(&self) -> String {
      self.0.to_string()
    }
  }

  fn layer() -> CacheLayer<SqliteStore> {
    CacheLayer::new(
      Arc::new(MemoryCache::new()),
      Arc::new(SqliteStore::open_in_memory().unwrap()),
    )
  }

  fn sample() -> Vec<Record> {
    vec![Record {
      id: 1,
      name: "Alice Reyes".into(),
      photo: Some("base64-bytes".into()),
      has_photo: true,
    }]
  }

  #[tokio::test]
  async fn test_network_success_populates_both_tiers() {
    let layer = layer();
    let key = Key("students:section:3");

    let result = layer
      .fetch_list(CacheKind::Students, &key, || async { Ok(sample()) })
      .await
      .unwrap();
    assert_eq!(result.source, crate::cache::CacheSource::Network);

    // Memory tier holds the full value.
    let raw = layer.raw(CacheKind::Students, &key).unwrap();
    assert_eq!(raw[0]["photo"], "base64-bytes");

    // Persistent tier holds the minimized projection, blobs stripped.
    let stored = layer
      .store()
      .get(RecordLite::entity_type(), &key.cache_hash())
      .unwrap();
    assert_eq!(stored.value[0]["has_photo"], true);
    assert!(stored.value[0].get("photo").is_none());
  }

  #[tokio::test]
  async fn test_fresh_memory_hit_skips_fetcher() {
    let layer = layer();
    let key = Key("students:section:3");
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
      let result = layer
        .fetch_list(CacheKind::Students, &key, || {
          calls.fetch_add(1, Ordering::SeqCst);
          async { Ok(sample()) }
        })
        .await
        .unwrap();
      assert_eq!(result.data.len(), 1);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refresh_bypasses_fresh_hit() {
    let layer = layer();
    let key = Key("students:section:3");
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
      layer
        .refresh_list(CacheKind::Students, &key, || {
          calls.fetch_add(1, Ordering::SeqCst);
          async { Ok(sample()) }
        })
        .await
        .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_network_failure_serves_persistent_tier() {
    let layer = layer();
    let key = Key("students:section:3");

    layer
      .fetch_list(CacheKind::Students, &key, || async { Ok(sample()) })
      .await
      .unwrap();
    // Drop the memory tier so only the mirror can answer.
    layer.memory().clear_all();

    let result: CacheResult<Vec<Record>> = layer
      .fetch_list(CacheKind::Students, &key, || async {
        Err(eyre!("502 Bad Gateway"))
      })
      .await
      .unwrap();

    assert_eq!(result.source, crate::cache::CacheSource::Offline);
    assert_eq!(result.data[0].name, "Alice Reyes");
    // Up-converted from the minimized shape: blob gone, flag kept.
    assert_eq!(result.data[0].photo, None);
    assert!(result.data[0].has_photo);
  }

  #[tokio::test]
  async fn test_network_failure_with_no_cache_is_an_error() {
    let layer = layer();
    let key = Key("students:section:9");

    let result = layer
      .fetch_list(CacheKind::Students, &key, || async {
        Err::<Vec<Record>, _>(eyre!("timed out"))
      })
      .await;

    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_peek_serves_stale_mirror_when_memory_cold() {
    let layer = layer();
    let key = Key("students:section:3");

    layer
      .fetch_list(CacheKind::Students, &key, || async { Ok(sample()) })
      .await
      .unwrap();
    layer.memory().clear_all();

    let peeked: CacheResult<Vec<Record>> =
      layer.peek_list(CacheKind::Students, &key).unwrap();
    assert_eq!(peeked.source, crate::cache::CacheSource::CacheStale);
    assert!(peeked.cached_at.is_some());
    assert_eq!(peeked.data[0].name, "Alice Reyes");
  }

  #[tokio::test]
  async fn test_invalidate_clears_both_tiers() {
    let layer = layer();
    let key = Key("students:section:3");

    layer
      .fetch_list(CacheKind::Students, &key, || async { Ok(sample()) })
      .await
      .unwrap();

    layer.invalidate::<RecordLite, _>(CacheKind::Students, &key);

    assert!(layer.raw(CacheKind::Students, &key).is_none());
    assert!(layer
      .store()
      .get(RecordLite::entity_type(), &key.cache_hash())
      .is_none());
    let peeked: Option<CacheResult<Vec<Record>>> = layer.peek_list(CacheKind::Students, &key);
    assert!(peeked.is_none());
  }
}
