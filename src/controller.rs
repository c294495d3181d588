use std::fmt;
use std::time::Duration;

use crate::cache::{CacheEvent, PrefetchCache};
use crate::config::{default_download_dir, ViewerConfig};
use crate::error::{ClipboardError, SaveError};
use crate::export::{self, Saved};
use crate::fetcher::{FetchCompletion, FetchLauncher};
use crate::history::{HistoryNavigator, RecordOutcome};
use crate::record::ImageRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing shown, nothing cached, nothing in flight.
    Empty,
    /// Waiting for a fetch to land before something can be shown.
    Loading,
    Displaying,
    ShuttingDown,
}

/// Status produced by a controller operation, shown by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A new image from the prefetch queue is on screen.
    Fresh { queued: usize, capacity: usize },
    /// An image from history is on screen.
    FromHistory { position: usize, len: usize },
    Cached { queued: usize, capacity: usize },
    /// Everything taken from the queue repeated the image already on screen.
    Repeated { queued: usize, capacity: usize },
    Loading,
    AtHistoryStart,
    NoHistory,
    FetchFailed(String),
    Exhausted(String),
    Reconfigured { capacity: usize },
    SettingsSaved,
    Saved { path: String, fell_back: bool },
    SaveFailed(String),
    Copied,
    CopyFailed(String),
    ShuttingDown,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Fresh { queued, capacity } => {
                write!(f, "Showing cached image. Cache: {}/{}", queued, capacity)
            }
            Notice::FromHistory { position, len } => {
                write!(f, "History: {}/{}", position, len)
            }
            Notice::Cached { queued, capacity } => {
                write!(f, "Cached. Cache: {}/{}", queued, capacity)
            }
            Notice::Repeated { queued, capacity } => write!(
                f,
                "Source sent the same image again. Cache: {}/{}",
                queued, capacity
            ),
            Notice::Loading => write!(f, "Cache empty, fetching a new image..."),
            Notice::AtHistoryStart => write!(f, "Already at the first image in history."),
            Notice::NoHistory => write!(f, "No more history."),
            Notice::FetchFailed(e) => write!(f, "Error: {}", e),
            Notice::Exhausted(e) => write!(
                f,
                "No image available ({}). Check the network and API URL.",
                e
            ),
            Notice::Reconfigured { capacity } => {
                write!(f, "Settings updated, refilling cache (size {})...", capacity)
            }
            Notice::SettingsSaved => write!(f, "Settings saved."),
            Notice::Saved { path, fell_back: false } => write!(f, "Saved to {}", path),
            Notice::Saved { path, fell_back: true } => write!(
                f,
                "Download directory unusable; saved to {} instead",
                path
            ),
            Notice::SaveFailed(e) => write!(f, "Save failed: {}", e),
            Notice::Copied => write!(f, "Image copied to clipboard."),
            Notice::CopyFailed(e) => write!(f, "Copy failed: {}", e),
            Notice::ShuttingDown => write!(f, "Shutting down..."),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct ViewerController<L> {
    config: ViewerConfig,
    cache: PrefetchCache<L>,
    history: HistoryNavigator,
    phase: Phase,
}

impl<L: FetchLauncher> ViewerController<L> {
    pub fn new(config: ViewerConfig, launcher: L) -> Self {
        let cache = PrefetchCache::new(config.max_cache_size, config.api_url.clone(), launcher);
        Self {
            config,
            cache,
            history: HistoryNavigator::new(),
            phase: Phase::Empty,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn cache(&self) -> &PrefetchCache<L> {
        &self.cache
    }

    pub fn history(&self) -> &HistoryNavigator {
        &self.history
    }

    /// The image on screen, if any.
    pub fn current(&self) -> Option<&ImageRecord> {
        self.history.current()
    }

    fn is_shutting_down(&self) -> bool {
        self.phase == Phase::ShuttingDown
    }

    /// Kick off the initial fill.
    pub fn start(&mut self) {
        if self.phase == Phase::Empty && self.cache.ensure_filled() > 0 {
            self.phase = Phase::Loading;
        }
    }

    /// Pop queued images until one is not a repeat of the current one.
    fn show_from_cache(&mut self) -> Option<Notice> {
        let mut record = self.cache.pop_front()?;
        let shown_new = loop {
            let id = record.id();
            match self.history.record_new(record) {
                RecordOutcome::Duplicate => {
                    log::debug!("[nav] {} repeats the current image, skipped", id);
                    match self.cache.pop_front() {
                        Some(next) => record = next,
                        None => break false,
                    }
                }
                outcome => {
                    log::debug!("[nav] fresh {} ({:?})", id, outcome);
                    break true;
                }
            }
        };
        self.cache.ensure_filled();
        self.phase = Phase::Displaying;

        let queued = self.cache.len();
        let capacity = self.cache.capacity();
        Some(if shown_new {
            Notice::Fresh { queued, capacity }
        } else {
            Notice::Repeated { queued, capacity }
        })
    }

    fn from_history(&self) -> Notice {
        let (position, len) = self.history.position().unwrap_or((0, 0));
        Notice::FromHistory {
            position,
            len,
        }
    }

    /// Go forward: through history first, then the prefetch queue.
    pub fn next(&mut self) -> Notice {
        if self.is_shutting_down() {
            return Notice::ShuttingDown;
        }

        if self.history.go_forward().is_some() {
            self.phase = Phase::Displaying;
            return self.from_history();
        }

        if let Some(notice) = self.show_from_cache() {
            return notice;
        }

        // Queue is empty here, so this always launches at least one fetch.
        self.phase = Phase::Loading;
        self.cache.retry();
        Notice::Loading
    }

    pub fn previous(&mut self) -> Notice {
        if self.is_shutting_down() {
            return Notice::ShuttingDown;
        }
        if self.history.go_back().is_some() {
            self.phase = Phase::Displaying;
            self.from_history()
        } else if self.history.is_empty() {
            Notice::NoHistory
        } else {
            Notice::AtHistoryStart
        }
    }

    /// Manual or timed retry after the cache ran dry.
    pub fn retry(&mut self) -> Option<Notice> {
        if self.is_shutting_down() || self.cache.in_flight() > 0 || !self.cache.is_empty() {
            return None;
        }
        if self.cache.retry() > 0 && self.phase == Phase::Empty {
            self.phase = Phase::Loading;
        }
        Some(Notice::Loading)
    }

    fn settle_after_exhaustion(&mut self) {
        self.phase = if self.current().is_some() {
            Phase::Displaying
        } else {
            Phase::Empty
        };
    }

    /// Feed one fetch result back in. Must be called on the controller's thread.
    pub fn on_fetch_complete(&mut self, completion: FetchCompletion) -> Option<Notice> {
        if self.is_shutting_down() {
            return None;
        }

        match self.cache.on_completion(completion) {
            CacheEvent::Stale | CacheEvent::Cancelled | CacheEvent::Dropped => None,
            CacheEvent::Stored => {
                if matches!(self.phase, Phase::Empty | Phase::Loading) {
                    self.show_from_cache()
                } else {
                    Some(Notice::Cached {
                        queued: self.cache.len(),
                        capacity: self.cache.capacity(),
                    })
                }
            }
            CacheEvent::Failed(err) => Some(Notice::FetchFailed(err.to_string())),
            CacheEvent::Exhausted(err) => {
                if self.phase == Phase::Loading {
                    self.settle_after_exhaustion();
                }
                Some(Notice::Exhausted(err.to_string()))
            }
        }
    }

    /// Apply new settings. Only a changed URL or cache size resets the cache;
    /// history is always kept.
    pub fn reconfigure(&mut self, config: ViewerConfig) -> Notice {
        if self.is_shutting_down() {
            return Notice::ShuttingDown;
        }
        let refill = config.api_url != self.config.api_url
            || config.max_cache_size != self.config.max_cache_size;
        self.config = config;

        if !refill {
            return Notice::SettingsSaved;
        }

        self.cache
            .reconfigure(self.config.max_cache_size, self.config.api_url.clone());
        self.phase = Phase::Loading;
        Notice::Reconfigured {
            capacity: self.cache.capacity(),
        }
    }

    /// Cancel everything and wait at most `grace` for fetch threads.
    pub fn shutdown(&mut self, grace: Duration) {
        if self.is_shutting_down() {
            return;
        }
        self.phase = Phase::ShuttingDown;
        let cancelled = self.cache.cancel_all();
        log::info!("shutting down, cancelled {} fetch(es)", cancelled);
        self.cache.launcher_mut().shutdown(grace);
    }

    pub fn download_current(&mut self) -> Result<Saved, SaveError> {
        let fallback = default_download_dir();
        let saved = export::save_to_dir(self.current(), &self.config.download_dir, &fallback)?;
        if saved.fell_back {
            self.config.download_dir = fallback;
        }
        Ok(saved)
    }

    pub fn copy_current(&self) -> Result<(), ClipboardError> {
        export::copy_to_clipboard(self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetcher::tests::RecordingLauncher;
    use crate::fetcher::FetchRequest;
    use crate::history::HISTORY_CAPACITY;
    use crate::record::tests::record;

    fn controller(cap: usize) -> ViewerController<RecordingLauncher> {
        let config = ViewerConfig {
            api_url: "https://api/random".into(),
            max_cache_size: cap,
            ..ViewerConfig::default()
        };
        ViewerController::new(config, RecordingLauncher::default())
    }

    fn launched(c: &ViewerController<RecordingLauncher>) -> Vec<FetchRequest> {
        c.cache().launcher().launched.clone()
    }

    fn succeed(c: &mut ViewerController<RecordingLauncher>, req: &FetchRequest, url: &str) -> Option<Notice> {
        c.on_fetch_complete(FetchCompletion {
            id: req.id,
            result: Ok(record(url)),
        })
    }

    fn fail(c: &mut ViewerController<RecordingLauncher>, req: &FetchRequest) -> Option<Notice> {
        c.on_fetch_complete(FetchCompletion {
            id: req.id,
            result: Err(FetchError::Network("unreachable".into())),
        })
    }

    fn current_url(c: &ViewerController<RecordingLauncher>) -> String {
        c.current().unwrap().source_url().to_string()
    }

    fn check(c: &ViewerController<RecordingLauncher>) {
        c.cache().check_invariant();
        let h = c.history();
        assert!(h.len() <= HISTORY_CAPACITY);
        if let Some(cur) = h.cursor() {
            assert!(cur < h.len());
        }
    }

    #[test]
    fn start_moves_to_loading() {
        let mut c = controller(3);
        assert_eq!(c.phase(), Phase::Empty);
        c.start();
        assert_eq!(c.phase(), Phase::Loading);
        assert_eq!(c.cache().in_flight(), 3);
        c.start();
        assert_eq!(launched(&c).len(), 3);
    }

    #[test]
    fn first_success_is_displayed() {
        let mut c = controller(2);
        c.start();
        let reqs = launched(&c);

        let notice = succeed(&mut c, &reqs[0], "A").unwrap();
        assert!(matches!(notice, Notice::Fresh { .. }));
        assert_eq!(c.phase(), Phase::Displaying);
        assert_eq!(current_url(&c), "A");
        // Popped slot was refilled.
        assert_eq!(c.cache().in_flight(), 2);
        check(&c);

        assert_eq!(
            succeed(&mut c, &reqs[1], "B"),
            Some(Notice::Cached { queued: 1, capacity: 2 })
        );
        assert_eq!(current_url(&c), "A");
    }

    #[test]
    fn next_walks_cache_in_order() {
        let mut c = controller(3);
        // Fill the queue while "displaying" so nothing is auto-shown.
        c.phase = Phase::Displaying;
        c.cache.ensure_filled();
        let reqs = launched(&c);
        for (req, url) in reqs.iter().zip(["A", "B", "C"]) {
            succeed(&mut c, req, url);
        }
        assert_eq!(c.cache().len(), 3);
        assert_eq!(c.cache().in_flight(), 0);

        for url in ["A", "B", "C"] {
            assert!(matches!(c.next(), Notice::Fresh { .. }));
            assert_eq!(current_url(&c), url);
            check(&c);
        }
        assert_eq!(c.history().len(), 3);
        assert_eq!(c.history().cursor(), Some(2));
    }

    #[test]
    fn repeated_image_is_skipped_for_the_next_one() {
        let mut c = controller(3);
        c.start();
        let reqs = launched(&c);
        succeed(&mut c, &reqs[0], "A");
        succeed(&mut c, &reqs[1], "A");
        succeed(&mut c, &reqs[2], "B");
        assert_eq!(c.cache().len(), 2);

        assert!(matches!(c.next(), Notice::Fresh { .. }));
        assert_eq!(current_url(&c), "B");
        assert_eq!(c.history().len(), 2);
        assert!(c.cache().is_empty());
        check(&c);
    }

    #[test]
    fn only_repeats_queued_reports_repeated() {
        let mut c = controller(2);
        c.start();
        let reqs = launched(&c);
        succeed(&mut c, &reqs[0], "A");
        assert_eq!(
            succeed(&mut c, &reqs[1], "A"),
            Some(Notice::Cached { queued: 1, capacity: 2 })
        );

        let notice = c.next();
        assert!(matches!(notice, Notice::Repeated { queued: 0, capacity: 2 }));
        assert_ne!(notice.to_string(), Notice::Fresh { queued: 0, capacity: 2 }.to_string());
        assert_eq!(current_url(&c), "A");
        assert_eq!(c.history().len(), 1);
        assert_eq!(c.phase(), Phase::Displaying);
        check(&c);
    }

    #[test]
    fn next_with_empty_queue_always_launches() {
        let mut c = controller(2);
        c.start();
        let mut rounds = 0;
        while c.cache().in_flight() > 0 {
            // Already-failed requests come back stale and are ignored.
            for req in launched(&c) {
                fail(&mut c, &req);
            }
            rounds += 1;
            assert!(rounds < 10, "failures never drained");
        }
        assert_eq!(c.phase(), Phase::Empty);

        assert_eq!(c.next(), Notice::Loading);
        assert_eq!(c.phase(), Phase::Loading);
        assert_eq!(c.cache().in_flight(), 2);
        check(&c);
    }

    #[test]
    fn previous_then_next_returns_to_same_image() {
        let mut c = controller(3);
        c.start();
        for (req, url) in launched(&c).iter().zip(["A", "B", "C"]) {
            succeed(&mut c, req, url);
        }
        c.next();
        c.next();
        assert_eq!(current_url(&c), "C");

        let before_id = c.current().unwrap().id();
        let queued = c.cache().len();
        let flights = c.cache().in_flight();
        let hist = c.history().len();

        c.previous();
        assert_eq!(current_url(&c), "B");
        let notice = c.next();
        assert!(matches!(notice, Notice::FromHistory { position: 3, len: 3, .. }));

        assert_eq!(c.current().unwrap().id(), before_id);
        assert_eq!(c.cache().len(), queued);
        assert_eq!(c.cache().in_flight(), flights);
        assert_eq!(c.history().len(), hist);
    }

    #[test]
    fn back_twice_then_next_uses_history() {
        let mut c = controller(3);
        c.start();
        for (req, url) in launched(&c).iter().zip(["A", "B", "C"]) {
            succeed(&mut c, req, url);
        }
        c.next();
        c.next();
        let launches = launched(&c).len();

        c.previous();
        assert!(matches!(c.previous(), Notice::FromHistory { position: 1, .. }));
        assert_eq!(current_url(&c), "A");
        assert_eq!(c.previous(), Notice::AtHistoryStart);

        c.next();
        assert_eq!(c.history().cursor(), Some(1));
        assert_eq!(current_url(&c), "B");
        assert_eq!(launched(&c).len(), launches);
    }

    #[test]
    fn previous_without_history() {
        let mut c = controller(1);
        assert_eq!(c.previous(), Notice::NoHistory);
    }

    #[test]
    fn next_on_empty_cache_goes_loading() {
        let mut c = controller(1);
        c.start();
        let req = launched(&c)[0].clone();
        succeed(&mut c, &req, "A");
        assert_eq!(c.phase(), Phase::Displaying);

        // Queue empty, one fetch in flight.
        assert_eq!(c.next(), Notice::Loading);
        assert_eq!(c.phase(), Phase::Loading);

        // Arrival while loading is shown straight away.
        let req = launched(&c).last().unwrap().clone();
        assert!(matches!(succeed(&mut c, &req, "B"), Some(Notice::Fresh { .. })));
        assert_eq!(current_url(&c), "B");
        assert_eq!(c.phase(), Phase::Displaying);
    }

    #[test]
    fn all_failures_leave_empty_and_exhausted() {
        let mut c = controller(2);
        c.start();

        let mut last = None;
        let mut handled = 0;
        while c.cache().in_flight() > 0 {
            let pending: Vec<_> = launched(&c).into_iter().skip(handled).collect();
            for req in pending {
                handled += 1;
                last = fail(&mut c, &req);
                check(&c);
            }
            assert!(handled < 50);
        }

        assert!(matches!(last, Some(Notice::Exhausted(_))));
        assert_eq!(c.phase(), Phase::Empty);
        assert!(c.current().is_none());
        assert!(last.unwrap().to_string().contains("No image available"));

        // Retrying is allowed and relaunches.
        assert_eq!(c.retry(), Some(Notice::Loading));
        assert_eq!(c.phase(), Phase::Loading);
        assert_eq!(c.cache().in_flight(), 2);
    }

    #[test]
    fn reconfigure_while_fetching() {
        let mut c = controller(3);
        c.start();
        let old = launched(&c);
        assert_eq!(old.len(), 3);

        let mut cfg = c.config().clone();
        cfg.max_cache_size = 1;
        cfg.api_url = "https://new/api".into();
        assert_eq!(c.reconfigure(cfg), Notice::Reconfigured { capacity: 1 });

        assert!(old.iter().all(|r| r.cancel.is_cancelled()));
        let now = launched(&c);
        assert_eq!(now.len(), 4);
        assert_eq!(now[3].url, "https://new/api");
        assert_eq!(c.cache().in_flight(), 1);

        for req in &old {
            assert_eq!(succeed(&mut c, req, "stale"), None);
        }
        assert!(c.current().is_none());
        assert!(c.cache().is_empty());
        check(&c);
    }

    #[test]
    fn reconfigure_keeps_history() {
        let mut c = controller(1);
        c.start();
        let req = launched(&c)[0].clone();
        succeed(&mut c, &req, "A");

        let mut cfg = c.config().clone();
        cfg.api_url = "https://elsewhere".into();
        c.reconfigure(cfg);
        assert_eq!(c.phase(), Phase::Loading);
        assert_eq!(c.history().len(), 1);
        assert_eq!(current_url(&c), "A");
    }

    #[test]
    fn theme_change_does_not_touch_cache() {
        let mut c = controller(2);
        c.start();
        let mut cfg = c.config().clone();
        cfg.theme = cfg.theme.toggled();
        assert_eq!(c.reconfigure(cfg.clone()), Notice::SettingsSaved);
        assert_eq!(c.config().theme, cfg.theme);
        assert_eq!(launched(&c).len(), 2);
        assert!(launched(&c).iter().all(|r| !r.cancel.is_cancelled()));
    }

    #[test]
    fn shutdown_cancels_and_goes_quiet() {
        let mut c = controller(3);
        c.start();
        let reqs = launched(&c);

        c.shutdown(Duration::from_millis(10));
        assert_eq!(c.phase(), Phase::ShuttingDown);
        assert!(reqs.iter().all(|r| r.cancel.is_cancelled()));
        assert_eq!(c.cache().launcher().shutdowns, 1);

        assert_eq!(succeed(&mut c, &reqs[0], "late"), None);
        assert_eq!(c.next(), Notice::ShuttingDown);
        c.shutdown(Duration::from_millis(10));
        assert_eq!(c.cache().launcher().shutdowns, 1);
    }

    #[test]
    fn download_requires_an_image() {
        let mut c = controller(1);
        assert!(matches!(c.download_current(), Err(SaveError::NoImage)));
        assert!(matches!(c.copy_current(), Err(ClipboardError::NoImage)));
    }

    #[test]
    fn download_writes_current_image() {
        let dir = std::env::temp_dir().join(format!("randview-ctl-{}", std::process::id()));
        let mut c = controller(1);
        c.config.download_dir = dir.clone();
        c.start();
        let req = launched(&c)[0].clone();
        succeed(&mut c, &req, "https://x.org/a.png");

        let saved = c.download_current().unwrap();
        assert_eq!(saved.path, dir.join("a.png"));
        assert_eq!(std::fs::read(&saved.path).unwrap(), b"https://x.org/a.png");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn notices_render_as_status_text() {
        assert_eq!(
            Notice::FromHistory { position: 2, len: 7 }.to_string(),
            "History: 2/7"
        );
        assert_eq!(Notice::Cached { queued: 3, capacity: 5 }.to_string(), "Cached. Cache: 3/5");
    }
}
