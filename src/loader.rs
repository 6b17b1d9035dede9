//! Date-windowed, incremental photo loading for one container.
//!
//! The loader walks a container's date range one chunk at a time, starting from
//! the newest date (descending) or the oldest (ascending). Each `load_more` call
//! fetches the next window and merges the result into a deduplicated, sorted
//! list. Only one fetch runs at a time; calls made while a fetch is in flight
//! are dropped, which makes it safe to call from scroll callbacks.
//!
//! `load_initial` is the exception: it restarts the walk even while a fetch is
//! running, so for a moment the superseded fetch and the new first window can
//! both be in flight. The superseded result is discarded when it lands.
//!
//! State lives in a `watch` channel so views can subscribe to changes.

use chrono::{Local, NaiveDate};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::PhotoSource;
use crate::chunk::{ChunkStrategy, DEFAULT_TARGET_BATCH};
use crate::error::FetchError;
use crate::model::{Container, Photo, SortOrder};

/// Observable state of a loader.
#[derive(Debug, Clone)]
pub struct LoaderState {
    pub photos: Vec<Photo>,
    pub is_loading: bool,
    pub has_more: bool,
    /// Date up to which the container has been walked.
    pub last_limit_date: NaiveDate,
    pub error: Option<String>,
    known_ids: HashSet<i64>,
    /// Bumped on every reset so results of superseded fetches can be dropped.
    generation: u64,
}

impl LoaderState {
    fn new(last_limit_date: NaiveDate) -> Self {
        Self {
            photos: Vec::new(),
            is_loading: false,
            has_more: true,
            last_limit_date,
            error: None,
            known_ids: HashSet::new(),
            generation: 0,
        }
    }

    /// Add photos not seen yet and restore ordering. Returns how many were new.
    fn merge(&mut self, incoming: Vec<Photo>, order: SortOrder) -> usize {
        let before = self.photos.len();
        for photo in incoming {
            if self.known_ids.insert(photo.id) {
                self.photos.push(photo);
            }
        }

        match order {
            SortOrder::Asc => self.photos.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
            SortOrder::Desc => self.photos.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        }

        self.photos.len() - before
    }
}

/// One date window to fetch, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: NaiveDate,
    end: NaiveDate,
    next_limit: NaiveDate,
    generation: u64,
}

pub struct PhotoLoader {
    source: Arc<dyn PhotoSource>,
    container: Container,
    order: SortOrder,
    strategy: ChunkStrategy,
    state: watch::Sender<LoaderState>,
}

impl PhotoLoader {
    pub fn new(source: Arc<dyn PhotoSource>, container: Container, order: SortOrder) -> Self {
        Self::with_target_batch(source, container, order, DEFAULT_TARGET_BATCH)
    }

    pub fn with_target_batch(
        source: Arc<dyn PhotoSource>,
        container: Container,
        order: SortOrder,
        target_batch: u32,
    ) -> Self {
        let strategy = ChunkStrategy::estimate(&container, target_batch);
        debug!(
            "Loader for {} ({} photos, {:?}..{:?}) pages by {}",
            source.describe(),
            container.number_of_photos,
            container.min_date,
            container.max_date,
            strategy
        );

        let start = starting_limit(&container, order);
        let (state, _) = watch::channel(LoaderState::new(start));

        Self {
            source,
            container,
            order,
            strategy,
            state,
        }
    }

    pub fn strategy(&self) -> ChunkStrategy {
        self.strategy
    }

    /// Human-readable window size, e.g. "7 jours".
    pub fn chunk_description(&self) -> String {
        self.strategy.to_string()
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn subscribe(&self) -> watch::Receiver<LoaderState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> LoaderState {
        self.state.borrow().clone()
    }

    pub fn photos(&self) -> Vec<Photo> {
        self.state.borrow().photos.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn has_more(&self) -> bool {
        self.state.borrow().has_more
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn should_load_more(&self) -> bool {
        let state = self.state.borrow();
        !state.is_loading && state.has_more
    }

    /// Start over from the first window without waiting for a fetch already in
    /// flight; that fetch's result is ignored when it completes.
    pub async fn load_initial(&self) {
        let start = starting_limit(&self.container, self.order);
        self.state.send_modify(|state| {
            let generation = state.generation.wrapping_add(1);
            *state = LoaderState::new(start);
            state.generation = generation;
        });

        self.load_more().await;
    }

    /// Clear a previous failure and fetch the window that failed. Without a
    /// pending failure this is the same as `load_more`.
    pub async fn retry(&self) {
        self.state.send_if_modified(|state| {
            if state.is_loading || state.error.is_none() {
                return false;
            }
            state.error = None;
            state.has_more = true;
            true
        });

        self.load_more().await;
    }

    /// Fetch the next window unless a fetch is running or the walk is over.
    pub async fn load_more(&self) {
        let Some(window) = self.begin_fetch() else {
            return;
        };

        debug!(
            "Fetching {} window {}..={} ({})",
            self.order, window.start, window.end, self.strategy
        );

        let source = Arc::clone(&self.source);
        let order = self.order;
        let result = tokio::task::spawn_blocking(move || source.load_photos(order, window.start, window.end))
            .await
            .unwrap_or_else(|e| Err(FetchError::Transport(format!("fetch task failed: {}", e))));

        self.finish_fetch(window, result);
    }

    /// Claim the loading flag and compute the next window, atomically.
    fn begin_fetch(&self) -> Option<Window> {
        let mut window = None;

        self.state.send_if_modified(|state| {
            if state.is_loading || !state.has_more {
                return false;
            }

            let (start, end, next_limit) =
                next_window(&self.container, self.strategy, self.order, state.last_limit_date);

            state.is_loading = true;
            state.error = None;
            window = Some(Window {
                start,
                end,
                next_limit,
                generation: state.generation,
            });
            true
        });

        window
    }

    fn finish_fetch(&self, window: Window, result: Result<Vec<Photo>, FetchError>) {
        let order = self.order;
        let container = &self.container;

        self.state.send_if_modified(|state| {
            if state.generation != window.generation {
                debug!("Dropping result for superseded window {}..={}", window.start, window.end);
                return false;
            }

            state.is_loading = false;

            match result {
                Ok(photos) => {
                    let received = photos.len();
                    let added = state.merge(photos, order);
                    state.last_limit_date = window.next_limit;
                    state.has_more = more_after(container, order, window.next_limit, received);

                    debug!(
                        "Window {}..={}: {} photos, {} new, {} total",
                        window.start,
                        window.end,
                        received,
                        added,
                        state.photos.len()
                    );
                    if !state.has_more {
                        info!("Loaded all {} photos", state.photos.len());
                    }
                }
                Err(e) => {
                    warn!("Failed to load window {}..={}: {}", window.start, window.end, e);
                    state.has_more = false;
                    state.error = Some(e.user_message());
                }
            }

            true
        });
    }
}

/// Where the walk begins: the newest date for descending order, the oldest for
/// ascending. When only the opposite extreme is known the walk starts at the
/// calendar limit, which `next_window` turns into one open-ended window. With no
/// dates at all it starts today.
fn starting_limit(container: &Container, order: SortOrder) -> NaiveDate {
    match (order, container.min_date, container.max_date) {
        (SortOrder::Desc, _, Some(max)) => max,
        (SortOrder::Asc, Some(min), _) => min,
        (SortOrder::Desc, Some(_), None) => NaiveDate::MAX,
        (SortOrder::Asc, None, Some(_)) => NaiveDate::MIN,
        (_, None, None) => Local::now().date_naive(),
    }
}

/// Window `(start, end, next_limit)` following `limit` in walk order.
fn next_window(
    container: &Container,
    strategy: ChunkStrategy,
    order: SortOrder,
    limit: NaiveDate,
) -> (NaiveDate, NaiveDate, NaiveDate) {
    match (order, container.min_date, container.max_date) {
        // Unknown newest date: everything from the oldest one on, in one request.
        (SortOrder::Desc, Some(min), None) if limit == NaiveDate::MAX => (min, limit, min),
        // Unknown oldest date: everything up to the newest one.
        (SortOrder::Asc, None, Some(max)) if limit == NaiveDate::MIN => (limit, max, max),
        (SortOrder::Desc, ..) => {
            let start = strategy.step_back(limit);
            (start, limit, start)
        }
        (SortOrder::Asc, ..) => {
            let end = strategy.step_forward(limit);
            (limit, end, end)
        }
    }
}

/// Whether anything is left after walking up to `limit`.
fn more_after(container: &Container, order: SortOrder, limit: NaiveDate, received: usize) -> bool {
    let (extreme, sentinel) = match order {
        SortOrder::Desc => (container.min_date, NaiveDate::MIN),
        SortOrder::Asc => (container.max_date, NaiveDate::MAX),
    };

    // Without a known end the walk has nothing to stop on but an empty chunk.
    if extreme.is_none() && received == 0 {
        return false;
    }

    let extreme = extreme.unwrap_or(sentinel);
    match order {
        SortOrder::Desc => limit > extreme,
        SortOrder::Asc => limit < extreme,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};
    use std::time::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn photo(id: i64, day: NaiveDate) -> Photo {
        Photo {
            id,
            name: format!("IMG_{:04}.jpg", id),
            timestamp: NaiveDateTime::new(day, chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap()),
            is_video: false,
            directory_id: None,
        }
    }

    /// Serves photos from memory, filtering by window, and records every request.
    struct MemorySource {
        photos: Vec<Photo>,
        calls: Mutex<Vec<(SortOrder, NaiveDate, NaiveDate)>>,
        failure: Mutex<Option<FetchError>>,
    }

    impl MemorySource {
        fn new(photos: Vec<Photo>) -> Self {
            Self {
                photos,
                calls: Mutex::new(Vec::new()),
                failure: Mutex::new(None),
            }
        }

        fn fail_with(&self, error: Option<FetchError>) {
            *self.failure.lock().unwrap() = error;
        }

        fn calls(&self) -> Vec<(SortOrder, NaiveDate, NaiveDate)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PhotoSource for MemorySource {
        fn load_photos(&self, order: SortOrder, start: NaiveDate, end: NaiveDate) -> Result<Vec<Photo>, FetchError> {
            self.calls.lock().unwrap().push((order, start, end));
            if let Some(err) = self.failure.lock().unwrap().clone() {
                return Err(err);
            }
            Ok(self
                .photos
                .iter()
                .filter(|p| {
                    let day = p.timestamp.date();
                    day >= start && day <= end
                })
                .cloned()
                .collect())
        }
    }

    /// Blocks each fetch until the test releases it.
    struct GatedSource {
        calls: AtomicUsize,
        release: Mutex<mpsc::Receiver<Vec<Photo>>>,
    }

    impl PhotoSource for GatedSource {
        fn load_photos(&self, _: SortOrder, _: NaiveDate, _: NaiveDate) -> Result<Vec<Photo>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let photos = self.release.lock().unwrap().recv().unwrap_or_default();
            Ok(photos)
        }
    }

    fn january() -> Container {
        Container::new(Some(date(2020, 1, 1)), Some(date(2020, 1, 31)), 600)
    }

    fn january_photos() -> Vec<Photo> {
        (1..=31).map(|d| photo(d as i64, date(2020, 1, d))).collect()
    }

    async fn load_all(loader: &PhotoLoader) {
        loader.load_initial().await;
        while loader.should_load_more() {
            loader.load_more().await;
        }
    }

    async fn wait_for_calls(source: &GatedSource, expected: usize) {
        for _ in 0..200 {
            if source.calls.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("fetch never started");
    }

    fn assert_sorted(photos: &[Photo], order: SortOrder) {
        for pair in photos.windows(2) {
            match order {
                SortOrder::Asc => assert!(pair[0].timestamp <= pair[1].timestamp),
                SortOrder::Desc => assert!(pair[0].timestamp >= pair[1].timestamp),
            }
        }
    }

    #[tokio::test]
    async fn test_initial_load_fetches_newest_window() {
        let source = Arc::new(MemorySource::new(january_photos()));
        let loader = PhotoLoader::new(source.clone(), january(), SortOrder::Desc);
        assert_eq!(loader.chunk_description(), "10 jours");

        loader.load_initial().await;

        assert_eq!(source.calls(), vec![(SortOrder::Desc, date(2020, 1, 21), date(2020, 1, 31))]);
        let state = loader.snapshot();
        assert_eq!(state.photos.len(), 11);
        assert_eq!(state.last_limit_date, date(2020, 1, 21));
        assert!(state.has_more);
        assert!(!state.is_loading);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_initial_load_ascending_starts_at_oldest() {
        let source = Arc::new(MemorySource::new(january_photos()));
        let loader = PhotoLoader::new(source.clone(), january(), SortOrder::Asc);

        loader.load_initial().await;

        assert_eq!(source.calls(), vec![(SortOrder::Asc, date(2020, 1, 1), date(2020, 1, 11))]);
        assert_eq!(loader.snapshot().last_limit_date, date(2020, 1, 11));
    }

    #[tokio::test]
    async fn test_walk_covers_container_once_without_duplicates() {
        for order in [SortOrder::Desc, SortOrder::Asc] {
            let source = Arc::new(MemorySource::new(january_photos()));
            let loader = PhotoLoader::new(source.clone(), january(), order);

            load_all(&loader).await;

            let state = loader.snapshot();
            assert!(!state.has_more);
            assert_eq!(source.calls().len(), 3);

            // Window edges overlap by one day; each photo must still appear once.
            let ids: HashSet<i64> = state.photos.iter().map(|p| p.id).collect();
            assert_eq!(ids.len(), 31);
            assert_eq!(state.photos.len(), 31);
            assert_sorted(&state.photos, order);
        }
    }

    #[tokio::test]
    async fn test_load_initial_resets_previous_results() {
        let source = Arc::new(MemorySource::new(january_photos()));
        let loader = PhotoLoader::new(source.clone(), january(), SortOrder::Desc);

        load_all(&loader).await;
        assert_eq!(loader.photos().len(), 31);

        loader.load_initial().await;
        assert_eq!(loader.photos().len(), 11);
        assert_eq!(source.calls().last(), Some(&(SortOrder::Desc, date(2020, 1, 21), date(2020, 1, 31))));
    }

    #[tokio::test]
    async fn test_load_more_is_dropped_while_loading() {
        let (tx, rx) = mpsc::channel();
        let source = Arc::new(GatedSource {
            calls: AtomicUsize::new(0),
            release: Mutex::new(rx),
        });
        let loader = Arc::new(PhotoLoader::new(source.clone(), january(), SortOrder::Desc));

        let first = tokio::spawn({
            let loader = Arc::clone(&loader);
            async move { loader.load_initial().await }
        });
        wait_for_calls(&source, 1).await;

        assert!(loader.is_loading());
        assert!(!loader.should_load_more());
        loader.load_more().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tx.send(vec![photo(1, date(2020, 1, 30))]).unwrap();
        first.await.unwrap();

        assert!(!loader.is_loading());
        assert_eq!(loader.photos().len(), 1);
    }

    #[test]
    fn test_overlapping_results_are_deduplicated() {
        let shared = photo(42, date(2020, 1, 21));
        let mut state = LoaderState::new(date(2020, 1, 31));

        assert_eq!(state.merge(vec![photo(1, date(2020, 1, 25)), shared.clone()], SortOrder::Desc), 2);
        assert_eq!(state.merge(vec![shared, photo(2, date(2020, 1, 15))], SortOrder::Desc), 1);

        let ids: Vec<i64> = state.photos.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 42, 2]);
    }

    #[tokio::test]
    async fn test_rejected_fetch_stops_walk_with_message() {
        let source = Arc::new(MemorySource::new(january_photos()));
        source.fail_with(Some(FetchError::rejected("boom")));
        let loader = PhotoLoader::new(source.clone(), january(), SortOrder::Desc);

        loader.load_initial().await;

        let state = loader.snapshot();
        assert!(!state.has_more);
        assert!(!state.is_loading);
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert_eq!(state.last_limit_date, date(2020, 1, 31));

        // No further fetches until retried
        loader.load_more().await;
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_treated_like_rejection() {
        let source = Arc::new(MemorySource::new(january_photos()));
        source.fail_with(Some(FetchError::Transport("connection refused".into())));
        let loader = PhotoLoader::new(source.clone(), january(), SortOrder::Asc);

        loader.load_initial().await;

        assert!(!loader.has_more());
        assert_eq!(loader.error().as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn test_retry_reissues_failed_window() {
        let source = Arc::new(MemorySource::new(january_photos()));
        let loader = PhotoLoader::new(source.clone(), january(), SortOrder::Desc);

        loader.load_initial().await;
        source.fail_with(Some(FetchError::rejected("boom")));
        loader.load_more().await;
        assert_eq!(loader.error().as_deref(), Some("boom"));

        source.fail_with(None);
        loader.retry().await;

        let calls = source.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1], calls[2]);
        assert_eq!(loader.error(), None);
        assert_eq!(loader.photos().len(), 21);
    }

    #[tokio::test]
    async fn test_superseded_fetch_is_discarded() {
        let (tx, rx) = mpsc::channel();
        let source = Arc::new(GatedSource {
            calls: AtomicUsize::new(0),
            release: Mutex::new(rx),
        });
        let loader = Arc::new(PhotoLoader::new(source.clone(), january(), SortOrder::Desc));

        let stale = tokio::spawn({
            let loader = Arc::clone(&loader);
            async move { loader.load_initial().await }
        });
        wait_for_calls(&source, 1).await;

        let fresh = tokio::spawn({
            let loader = Arc::clone(&loader);
            async move { loader.load_initial().await }
        });
        wait_for_calls(&source, 2).await;

        // Fetches queue on the same receiver: the first release goes to the stale one.
        tx.send(vec![photo(1, date(2020, 1, 30))]).unwrap();
        stale.await.unwrap();
        assert!(loader.is_loading());
        assert!(loader.photos().is_empty());

        tx.send(vec![photo(2, date(2020, 1, 29))]).unwrap();
        fresh.await.unwrap();

        let ids: Vec<i64> = loader.photos().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2]);
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn test_empty_container_without_dates() {
        let source = Arc::new(MemorySource::new(Vec::new()));
        let loader = PhotoLoader::new(source.clone(), Container::default(), SortOrder::Desc);
        assert_eq!(loader.chunk_description(), "3 mois");

        loader.load_initial().await;

        assert_eq!(source.calls().len(), 1);
        assert!(!loader.has_more());
        assert_eq!(loader.error(), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let source = Arc::new(MemorySource::new(january_photos()));
        let loader = PhotoLoader::new(source, january(), SortOrder::Desc);
        let mut rx = loader.subscribe();

        loader.load_initial().await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().photos.len(), 11);
    }

    #[test]
    fn test_more_after_uses_sentinels() {
        let open_start = Container::new(None, Some(date(2020, 1, 31)), 5);

        assert!(more_after(&open_start, SortOrder::Desc, date(2020, 1, 1), 3));
        assert!(!more_after(&open_start, SortOrder::Desc, date(2020, 1, 1), 0));
        assert!(!more_after(&open_start, SortOrder::Asc, date(2020, 1, 31), 3));
    }

    #[test]
    fn test_missing_start_date_opens_first_window() {
        let open_start = Container::new(None, Some(date(2020, 1, 31)), 31);
        let limit = starting_limit(&open_start, SortOrder::Asc);
        assert_eq!(limit, NaiveDate::MIN);
        assert_eq!(
            next_window(&open_start, ChunkStrategy::default(), SortOrder::Asc, limit),
            (NaiveDate::MIN, date(2020, 1, 31), date(2020, 1, 31))
        );

        let open_end = Container::new(Some(date(2020, 1, 1)), None, 31);
        let limit = starting_limit(&open_end, SortOrder::Desc);
        assert_eq!(limit, NaiveDate::MAX);
        assert_eq!(
            next_window(&open_end, ChunkStrategy::default(), SortOrder::Desc, limit),
            (date(2020, 1, 1), NaiveDate::MAX, date(2020, 1, 1))
        );
    }

    #[tokio::test]
    async fn test_half_open_containers_load_everything_in_both_orders() {
        let containers = [
            Container::new(None, Some(date(2020, 1, 31)), 31),
            Container::new(Some(date(2020, 1, 1)), None, 31),
        ];

        for container in containers {
            for order in [SortOrder::Desc, SortOrder::Asc] {
                let source = Arc::new(MemorySource::new(january_photos()));
                let loader = PhotoLoader::new(source, container.clone(), order);

                load_all(&loader).await;

                let state = loader.snapshot();
                assert_eq!(state.photos.len(), 31, "{:?} {:?}", container, order);
                assert_eq!(state.error, None);
                assert!(!state.has_more);
                assert_sorted(&state.photos, order);
            }
        }
    }
}
