//! Async query abstraction: one stale-while-revalidate state machine per
//! fetch target.
//!
//! A `Query<T>` owns the fetching logic for one logical target (school terms,
//! a class list, students of a section). Views seed it with whatever a cache
//! tier had (`with_initial`), start a fetch, and poll from the event-loop
//! tick. Data stays on screen while a refresh is in flight, and a refresh
//! failure falls back to the data already shown - an error is only surfaced
//! when there is nothing to show instead.
//!
//! # Example
//!
//! ```ignore
//! let client = cached_client.clone();
//! let mut query = Query::new(move || {
//!     let client = client.clone();
//!     async move { client.school_terms().await.map_err(|e| e.to_string()) }
//! });
//!
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// The state of a query.
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// First fetch in flight, nothing to display yet
  Loading,
  /// A fetch is in flight while previously resolved data stays displayed
  Refreshing(T),
  /// Query completed successfully
  Success(T),
  /// Query failed with no data to fall back to
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_refreshing(&self) -> bool {
    matches!(self, QueryState::Refreshing(_))
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  /// Displayable data: present in both the settled and the refreshing state.
  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) | QueryState::Refreshing(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A boxed future that returns a Result<T, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async query for data fetching with state management.
///
/// Supersession rule: starting a new fetch drops the previous fetch's result
/// channel, so a superseded request can never complete into state - even if
/// its response arrives after the replacement's. Within one query, only the
/// most recently issued fetch lands.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
  fetched_at: Option<Instant>,
  stale_time: Duration,
  /// Error from the most recent failed refresh whose data fallback was used.
  last_error: Option<String>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It will be called
  /// each time `fetch()` or `refetch()` is invoked.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      fetched_at: None,
      stale_time: Duration::from_secs(60),
      last_error: None,
    }
  }

  /// Seed the query with data from a cache peek.
  ///
  /// The data displays immediately and counts as stale, so the first
  /// `fetch()` revalidates it in the background instead of blanking the view.
  pub fn with_initial(mut self, data: T) -> Self {
    self.state = QueryState::Success(data);
    self.fetched_at = None;
    self
  }

  /// Set the stale time for this query.
  pub fn with_stale_time(mut self, duration: Duration) -> Self {
    self.stale_time = duration;
    self
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Get the data if the query has any to display.
  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_refreshing(&self) -> bool {
    self.state.is_refreshing()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Get the error message if the query failed with nothing to display.
  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Error from the latest refresh that was absorbed by a data fallback.
  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  /// Check if the data is stale (older than stale_time, or cache-seeded and
  /// never revalidated).
  pub fn is_stale(&self) -> bool {
    match &self.state {
      QueryState::Success(_) | QueryState::Refreshing(_) => self
        .fetched_at
        .map(|t| t.elapsed() > self.stale_time)
        .unwrap_or(true),
      _ => false,
    }
  }

  /// Start fetching data if no fetch is in flight.
  pub fn fetch(&mut self) {
    if self.receiver.is_some() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, superseding any in-flight fetch.
  pub fn refetch(&mut self) {
    // Dropping the receiver closes the channel; the superseded task's send
    // fails and its result is discarded, success or not.
    self.receiver = None;
    self.start_fetch();
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  /// Call this from the event-loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.fetched_at = Some(Instant::now());
        self.last_error = None;
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.receiver = None;
        self.settle_error(error);
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - the fetch task died.
        self.receiver = None;
        self.settle_error("request was cancelled".to_string());
        true
      }
    }
  }

  /// Internal: start the fetch operation
  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);

    self.state = match std::mem::replace(&mut self.state, QueryState::Idle) {
      QueryState::Success(data) | QueryState::Refreshing(data) => QueryState::Refreshing(data),
      _ => QueryState::Loading,
    };

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - the receiver is dropped on supersession
      let _ = tx.send(result);
    });
  }

  /// Internal: a failed fetch falls back to displayed data when there is any.
  fn settle_error(&mut self, error: String) {
    self.state = match std::mem::replace(&mut self.state, QueryState::Idle) {
      QueryState::Refreshing(data) => {
        self.last_error = Some(error);
        QueryState::Success(data)
      }
      _ => QueryState::Error(error),
    };
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("fetched_at", &self.fetched_at)
      .field("stale_time", &self.stale_time)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error_without_fallback() {
    let mut query: Query<i32> = Query::new(|| async { Err("502 Bad Gateway".to_string()) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error(), Some("502 Bad Gateway"));
  }

  #[tokio::test]
  async fn test_seeded_query_shows_data_while_refreshing() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec![9]) }).with_initial(vec![1]);

    // Cache-seeded data displays before any fetch and counts as stale.
    assert_eq!(query.data(), Some(&vec![1]));
    assert!(query.is_stale());

    query.fetch();
    assert!(query.is_refreshing());
    assert_eq!(query.data(), Some(&vec![1]));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![9]));
    assert!(!query.is_stale());
  }

  #[tokio::test]
  async fn test_refresh_error_falls_back_to_displayed_data() {
    let mut query =
      Query::new(|| async { Err("timed out".to_string()) }).with_initial(vec![1, 2]);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    // The stale view stays; the failure is recorded but not state-visible.
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 2]));
    assert_eq!(query.last_error(), Some("timed out"));
  }

  #[tokio::test]
  async fn test_fetch_while_in_flight_is_noop() {
    let mut query = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok::<_, String>(42)
    });

    query.fetch();
    assert!(query.is_loading());

    // Second fetch should be no-op
    query.fetch();
    assert!(query.is_loading());
  }

  #[tokio::test]
  async fn test_superseded_fetch_cannot_land_even_if_it_resolves_later() {
    let attempt = Arc::new(AtomicU32::new(0));
    let attempt_clone = attempt.clone();

    // First call resolves slowly with "A"; second quickly with "B". "A"
    // arrives well after "B" and must still be discarded.
    let mut query = Query::new(move || {
      let n = attempt_clone.fetch_add(1, Ordering::SeqCst);
      async move {
        if n == 0 {
          tokio::time::sleep(Duration::from_millis(80)).await;
          Ok::<_, String>("A")
        } else {
          tokio::time::sleep(Duration::from_millis(10)).await;
          Ok("B")
        }
      }
    });

    query.fetch();
    query.refetch();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&"B"));

    // "A" has resolved by now; nothing further may arrive.
    assert!(!query.poll());
    assert_eq!(query.data(), Some(&"B"));
  }

  #[tokio::test]
  async fn test_query_stale() {
    let mut query = Query::new(|| async { Ok::<_, String>(42) }).with_stale_time(Duration::ZERO);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    // With zero stale time, should immediately be stale
    assert!(query.is_stale());
  }
}
