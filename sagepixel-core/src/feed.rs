use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::client::FetchError;
use crate::photo::{Page, Photo, Provider};

/// Quiet interval a query edit must survive before it triggers a fetch.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    InitialLoading,
    LoadingPage1,
    LoadingMore,
    Idle,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Fresh page-1 load for a (possibly new) query; replaces the list.
    Page1,
    /// Incremental page; appends to the list.
    More,
    /// Page-1 reload that keeps the current list visible until it resolves.
    Refresh,
}

/// A fetch the host should execute and hand back via [`FeedController::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: u64,
    pub query: String,
    pub page: u32,
    pub kind: FetchKind,
}

/// Progress handoff for the welcome/splash sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplashReport {
    pub images_loaded: bool,
    pub total_images: usize,
}

#[derive(Debug)]
struct Debounce {
    text: String,
    deadline: Instant,
}

/// Owns all feed state. Performs no I/O: hosts call `poll` to pick up the
/// next due request, run it however they like, and report the outcome with
/// `complete`. Only one fetch is current at a time; a page-1 trigger
/// supersedes whatever is in flight and the superseded result is discarded
/// when it eventually arrives.
pub struct FeedController {
    query_text: String,
    debounced_query: String,
    page_number: u32,
    photos: Vec<Photo>,
    total_results: u64,
    phase: Phase,
    error_message: Option<String>,
    refreshing: bool,
    loaded_once: bool,
    debounce_interval: Duration,
    debounce: Option<Debounce>,
    queued: Option<FetchRequest>,
    in_flight: Option<FetchRequest>,
    last_failed: Option<FetchRequest>,
    next_ticket: u64,
}

impl Default for FeedController {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedController {
    /// Starts in `InitialLoading` with a curated page-1 fetch already queued.
    pub fn new() -> Self {
        let mut controller = FeedController {
            query_text: String::new(),
            debounced_query: String::new(),
            page_number: 1,
            photos: Vec::new(),
            total_results: 0,
            phase: Phase::InitialLoading,
            error_message: None,
            refreshing: false,
            loaded_once: false,
            debounce_interval: DEBOUNCE_INTERVAL,
            debounce: None,
            queued: None,
            in_flight: None,
            last_failed: None,
            next_ticket: 0,
        };
        controller.issue(String::new(), 1, FetchKind::Page1);
        controller
    }

    pub fn with_debounce_interval(mut self, interval: Duration) -> Self {
        self.debounce_interval = interval;
        self
    }

    /// Updates the displayed query immediately; the fetch waits for the
    /// debounce timer, which is re-armed on every call.
    pub fn set_query_text(&mut self, text: &str, now: Instant) {
        self.query_text = text.to_string();
        self.debounce = Some(Debounce {
            text: text.to_string(),
            deadline: now + self.debounce_interval,
        });
    }

    /// Suggestions are discrete taps, not keystrokes: no debounce.
    pub fn select_suggestion(&mut self, text: &str) {
        self.query_text = text.to_string();
        self.debounced_query = text.to_string();
        self.debounce = None;
        self.start_new_query(text.to_string());
    }

    /// Requests the next page. No-op while a fetch is pending or the feed
    /// already holds everything the upstream reported.
    pub fn load_more(&mut self) {
        if self.in_flight.is_some() || self.queued.is_some() {
            return;
        }
        if self.is_exhausted() {
            return;
        }
        let query = self.debounced_query.clone();
        self.issue(query, self.page_number + 1, FetchKind::More);
    }

    /// Page-1 reload of the current query. The visible list survives until
    /// the reload resolves; frontends key off `is_refreshing` to avoid the
    /// full-screen skeleton.
    pub fn refresh(&mut self) {
        self.refreshing = true;
        let query = self.debounced_query.clone();
        self.issue(query, 1, FetchKind::Refresh);
    }

    /// Replays the most recent failed fetch, if any.
    pub fn retry(&mut self) {
        if let Some(failed) = self.last_failed.take() {
            info!("retrying fetch for {:?} page {}", failed.query, failed.page);
            self.issue(failed.query, failed.page, failed.kind);
        }
    }

    /// Fires a due debounce timer and hands out the queued request, if any.
    /// Handing out a request makes it current; whatever was in flight
    /// before is superseded.
    pub fn poll(&mut self, now: Instant) -> Option<FetchRequest> {
        let due = self
            .debounce
            .as_ref()
            .map_or(false, |debounce| now >= debounce.deadline);
        if due {
            if let Some(debounce) = self.debounce.take() {
                if debounce.text != self.debounced_query {
                    info!("debounced query is now {:?}", debounce.text);
                    self.debounced_query = debounce.text.clone();
                    self.start_new_query(debounce.text);
                }
            }
        }

        let request = self.queued.take()?;
        if let Some(stale) = self.in_flight.replace(request.clone()) {
            debug!(
                "superseding in-flight fetch for {:?} page {}",
                stale.query, stale.page
            );
        }
        Some(request)
    }

    /// Merges the outcome of a fetch. Results for anything but the current
    /// in-flight request are stale and dropped without touching state.
    pub fn complete(&mut self, request: &FetchRequest, result: Result<Page, FetchError>) {
        match &self.in_flight {
            Some(current) if current.ticket == request.ticket => {}
            _ => {
                debug!(
                    "discarding stale result for {:?} page {}",
                    request.query, request.page
                );
                return;
            }
        }
        self.in_flight = None;
        self.loaded_once = true;

        match result {
            Ok(page) => self.apply_page(request, page),
            Err(err) => {
                warn!(
                    "fetch for {:?} page {} failed: {}",
                    request.query, request.page, err
                );
                self.phase = Phase::Error;
                self.error_message = Some(err.to_string());
                self.refreshing = false;
                self.last_failed = Some(request.clone());
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn items(&self) -> &[Photo] {
        &self.photos
    }

    pub fn displayed_count(&self) -> usize {
        self.photos.len()
    }

    pub fn total_count(&self) -> u64 {
        self.total_results
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn debounced_query(&self) -> &str {
        &self.debounced_query
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn is_exhausted(&self) -> bool {
        self.photos.len() as u64 >= self.total_results
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some() || self.queued.is_some()
    }

    pub fn debounce_pending(&self) -> bool {
        self.debounce.is_some()
    }

    /// Whether a frontend should cover the whole grid with a skeleton.
    /// Pull-to-refresh keeps the list visible instead.
    pub fn show_full_skeleton(&self) -> bool {
        matches!(self.phase, Phase::InitialLoading | Phase::LoadingPage1) && !self.refreshing
    }

    pub fn splash_report(&self) -> SplashReport {
        SplashReport {
            images_loaded: self.loaded_once,
            total_images: self.photos.len(),
        }
    }

    fn start_new_query(&mut self, query: String) {
        self.photos.clear();
        self.total_results = 0;
        self.page_number = 1;
        self.issue(query, 1, FetchKind::Page1);
    }

    fn issue(&mut self, query: String, page: u32, kind: FetchKind) {
        self.next_ticket += 1;
        self.phase = match kind {
            FetchKind::More => Phase::LoadingMore,
            FetchKind::Page1 | FetchKind::Refresh => {
                if self.loaded_once {
                    Phase::LoadingPage1
                } else {
                    Phase::InitialLoading
                }
            }
        };
        self.error_message = None;
        self.queued = Some(FetchRequest {
            ticket: self.next_ticket,
            query,
            page,
            kind,
        });
    }

    fn apply_page(&mut self, request: &FetchRequest, page: Page) {
        let total = page.total_results;
        match request.kind {
            FetchKind::Page1 | FetchKind::Refresh => {
                let mut seen = HashSet::new();
                self.photos = page
                    .photos
                    .into_iter()
                    .filter(|photo| seen.insert(photo.key()))
                    .collect();
                self.page_number = 1;
            }
            FetchKind::More => {
                let mut seen: HashSet<(Provider, u64)> =
                    self.photos.iter().map(Photo::key).collect();
                self.photos
                    .extend(page.photos.into_iter().filter(|photo| seen.insert(photo.key())));
                self.page_number = request.page;
            }
        }
        self.total_results = total;
        self.phase = Phase::Idle;
        self.error_message = None;
        self.refreshing = false;
        self.last_failed = None;
        info!(
            "feed holds {}/{} photos for {:?}",
            self.photos.len(),
            self.total_results,
            self.debounced_query
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::PhotoSources;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn photo(id: u64) -> Photo {
        Photo {
            id,
            src: PhotoSources {
                original: format!("https://example.test/{}/original", id),
                medium: format!("https://example.test/{}/medium", id),
                small: format!("https://example.test/{}/small", id),
            },
            provider: Provider::Pexels,
            title: format!("Photo {}", id),
            blur_hash: None,
        }
    }

    fn page(ids: &[u64], total: u64) -> Page {
        Page {
            photos: ids.iter().copied().map(photo).collect(),
            total_results: total,
        }
    }

    fn ids(feed: &FeedController) -> Vec<u64> {
        feed.items().iter().map(|p| p.id).collect()
    }

    fn upstream_err() -> FetchError {
        FetchError::Upstream { status: 500 }
    }

    #[test]
    fn test_initial_load_resolves_to_idle() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        assert_eq!(feed.phase(), Phase::InitialLoading);
        assert!(feed.show_full_skeleton());
        assert!(!feed.splash_report().images_loaded);

        let request = feed.poll(t0).expect("initial fetch queued");
        assert_eq!(request.query, "");
        assert_eq!(request.page, 1);
        assert_eq!(request.kind, FetchKind::Page1);

        feed.complete(&request, Ok(page(&[1, 2], 40)));
        assert_eq!(feed.phase(), Phase::Idle);
        assert_eq!(feed.displayed_count(), 2);
        assert_eq!(feed.total_count(), 40);
        assert_eq!(
            feed.splash_report(),
            SplashReport {
                images_loaded: true,
                total_images: 2
            }
        );
    }

    #[test]
    fn test_debounce_coalesces_rapid_typing() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1], 10)));

        feed.set_query_text("c", t0);
        feed.set_query_text("ca", t0 + ms(50));
        feed.set_query_text("cat", t0 + ms(100));
        assert_eq!(feed.query_text(), "cat");

        // Last edit at t0+100ms, so nothing fires before t0+400ms.
        assert!(feed.poll(t0 + ms(350)).is_none());

        let request = feed.poll(t0 + ms(450)).expect("debounced fetch");
        assert_eq!(request.query, "cat");
        assert_eq!(request.page, 1);
        assert_eq!(feed.debounced_query(), "cat");

        // Exactly one fetch for the whole burst.
        assert!(feed.poll(t0 + ms(500)).is_none());
    }

    #[test]
    fn test_retyping_current_query_does_not_refetch() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1], 10)));

        feed.select_suggestion("cat");
        let request = feed.poll(t0).unwrap();
        feed.complete(&request, Ok(page(&[2], 5)));

        feed.set_query_text("cat", t0);
        assert!(feed.poll(t0 + ms(400)).is_none());
    }

    #[test]
    fn test_clearing_query_reloads_curated_after_debounce() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1], 10)));

        feed.select_suggestion("cat");
        let request = feed.poll(t0).unwrap();
        feed.complete(&request, Ok(page(&[2], 5)));

        feed.set_query_text("", t0);
        assert!(feed.poll(t0 + ms(100)).is_none());

        let request = feed.poll(t0 + ms(300)).expect("curated reload");
        assert_eq!(request.query, "");
        assert_eq!(request.page, 1);
    }

    #[test]
    fn test_suggestion_bypasses_debounce() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1], 10)));

        feed.select_suggestion("Nature");
        let request = feed.poll(t0).expect("immediate fetch");
        assert_eq!(request.query, "Nature");
        assert_eq!(request.page, 1);
    }

    #[test]
    fn test_new_query_clears_items_before_load() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1, 2, 3], 10)));

        feed.select_suggestion("dog");
        assert_eq!(feed.displayed_count(), 0);
        assert_eq!(feed.total_count(), 0);
    }

    #[test]
    fn test_load_more_appends_and_advances_page() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1, 2, 3], 10)));
        assert_eq!(feed.page_number(), 1);

        feed.load_more();
        assert_eq!(feed.phase(), Phase::LoadingMore);
        let request = feed.poll(t0).expect("page 2 fetch");
        assert_eq!(request.page, 2);
        assert_eq!(request.kind, FetchKind::More);

        feed.complete(&request, Ok(page(&[4, 5], 10)));
        assert_eq!(ids(&feed), vec![1, 2, 3, 4, 5]);
        assert_eq!(feed.page_number(), 2);
        assert_eq!(feed.total_count(), 10);
    }

    #[test]
    fn test_load_more_skips_duplicate_photos() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1, 2, 3], 6)));

        feed.load_more();
        let request = feed.poll(t0).unwrap();
        feed.complete(&request, Ok(page(&[3, 4], 6)));
        assert_eq!(ids(&feed), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_load_more_noop_when_exhausted() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1, 2], 2)));
        assert!(feed.is_exhausted());

        feed.load_more();
        assert!(feed.poll(t0).is_none());
        assert_eq!(feed.page_number(), 1);
    }

    #[test]
    fn test_load_more_noop_while_fetch_in_flight() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1], 10)));

        feed.load_more();
        let request = feed.poll(t0).unwrap();
        feed.load_more();
        assert!(feed.poll(t0).is_none());

        feed.complete(&request, Ok(page(&[2], 10)));
        assert_eq!(feed.page_number(), 2);
    }

    #[test]
    fn test_load_more_failure_preserves_items() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1, 2, 3], 10)));

        feed.load_more();
        let request = feed.poll(t0).unwrap();
        feed.complete(&request, Err(upstream_err()));

        assert_eq!(feed.phase(), Phase::Error);
        assert!(feed.error_message().is_some());
        assert_eq!(ids(&feed), vec![1, 2, 3]);
        assert_eq!(feed.page_number(), 1);
    }

    #[test]
    fn test_retry_replays_failed_fetch() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1, 2, 3], 10)));

        feed.load_more();
        let request = feed.poll(t0).unwrap();
        feed.complete(&request, Err(upstream_err()));

        feed.retry();
        assert_eq!(feed.phase(), Phase::LoadingMore);
        let replay = feed.poll(t0).expect("replayed fetch");
        assert_eq!(replay.query, request.query);
        assert_eq!(replay.page, request.page);
        assert_eq!(replay.kind, request.kind);

        feed.complete(&replay, Ok(page(&[4, 5], 10)));
        assert_eq!(ids(&feed), vec![1, 2, 3, 4, 5]);
        assert_eq!(feed.page_number(), 2);
        assert!(feed.error_message().is_none());
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1], 10)));

        feed.select_suggestion("cat");
        let cat = feed.poll(t0).expect("cat fetch");

        feed.select_suggestion("dog");
        let dog = feed.poll(t0).expect("dog fetch supersedes cat");

        feed.complete(&dog, Ok(page(&[7, 8], 2)));
        assert_eq!(ids(&feed), vec![7, 8]);

        // The slow cat response lands afterwards and must not win.
        feed.complete(&cat, Ok(page(&[3], 5)));
        assert_eq!(ids(&feed), vec![7, 8]);
        assert_eq!(feed.total_count(), 2);
        assert_eq!(feed.phase(), Phase::Idle);
    }

    #[test]
    fn test_initial_fetch_superseded_by_suggestion() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();

        feed.select_suggestion("dog");
        let dog = feed.poll(t0).unwrap();

        feed.complete(&initial, Ok(page(&[1, 2], 40)));
        assert_eq!(feed.displayed_count(), 0);

        feed.complete(&dog, Ok(page(&[9], 1)));
        assert_eq!(ids(&feed), vec![9]);
    }

    #[test]
    fn test_refresh_keeps_list_and_suppresses_skeleton() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1, 2], 10)));

        feed.refresh();
        assert!(feed.is_refreshing());
        assert!(!feed.show_full_skeleton());
        assert_eq!(feed.displayed_count(), 2);

        let request = feed.poll(t0).expect("refresh fetch");
        assert_eq!(request.kind, FetchKind::Refresh);
        assert_eq!(request.page, 1);

        feed.complete(&request, Ok(page(&[2, 3], 10)));
        assert!(!feed.is_refreshing());
        assert_eq!(feed.phase(), Phase::Idle);
        assert_eq!(ids(&feed), vec![2, 3]);
    }

    #[test]
    fn test_refresh_is_idempotent_against_stable_upstream() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[1, 2], 10)));

        for _ in 0..2 {
            feed.refresh();
            let request = feed.poll(t0).unwrap();
            feed.complete(&request, Ok(page(&[1, 2], 10)));
        }
        assert_eq!(ids(&feed), vec![1, 2]);
        assert_eq!(feed.page_number(), 1);
        assert_eq!(feed.total_count(), 10);
    }

    #[test]
    fn test_empty_result_page_reports_total() {
        let mut feed = FeedController::new();
        let t0 = Instant::now();
        let initial = feed.poll(t0).unwrap();
        feed.complete(&initial, Ok(page(&[], 0)));

        assert_eq!(feed.phase(), Phase::Idle);
        assert_eq!(feed.displayed_count(), 0);
        assert!(feed.is_exhausted());
    }
}
