//! Fixed-interval polling loop.
//!
//! Each tick scans the whole tree, compares it with the previous scan and
//! pushes the resulting events through the bus before the next tick is
//! considered. Network shares rarely deliver inotify events, which is why
//! this polls instead of subscribing to OS notifications.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use super::bus::EventBus;
use super::detector::ChangeDetector;
use super::error::WatchError;
use super::handler::WatchHandler;
use super::snapshot;

/// Polling watcher that owns its subscribers and its last snapshot.
#[derive(Debug)]
pub struct PollingWatcher {
    root: PathBuf,
    interval: Duration,
    bus: EventBus,
    detector: ChangeDetector,
    shutdown: CancellationToken,
}

impl PollingWatcher {
    /// Create a builder for configuring the watcher.
    pub fn builder() -> PollingWatcherBuilder {
        PollingWatcherBuilder::new()
    }

    /// Run one scan, detect changes and deliver them.
    ///
    /// Returns the number of events delivered. The first call only records
    /// the baseline. Once shutdown is requested no further event is handed
    /// to subscribers; a delivery already in progress runs to completion.
    pub async fn poll_once(&mut self) -> Result<usize, WatchError> {
        let root = self.root.clone();
        let current = tokio::task::spawn_blocking(move || snapshot::scan(&root)).await?;

        let events = self.detector.apply(&self.root, current);

        let mut delivered = 0;
        for event in &events {
            if self.shutdown.is_cancelled() {
                crate::log_event!(
                    "watcher",
                    "shutdown requested",
                    "dropping {} pending events",
                    events.len() - delivered
                );
                break;
            }
            match event.state {
                Some(state) => crate::log_event!(
                    "scan",
                    event.kind,
                    "{} ({} bytes)",
                    event.relative_path.display(),
                    state.size
                ),
                None => crate::log_event!("scan", event.kind, "{}", event.relative_path.display()),
            }
            self.bus.notify(event).await;
            delivered += 1;
        }

        Ok(delivered)
    }

    /// Poll until `shutdown` is cancelled.
    ///
    /// Scans never overlap: a tick that falls due while handlers are still
    /// running is delayed, not queued up.
    pub async fn watch(mut self, shutdown: CancellationToken) -> Result<(), WatchError> {
        self.shutdown = shutdown.clone();
        crate::log_event!(
            "watcher",
            "polling",
            "{} every {:?}",
            self.root.display(),
            self.interval
        );

        self.poll_once().await?;
        crate::log_event!(
            "watcher",
            "baseline",
            "{} files",
            self.detector.known().len()
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the baseline scan covered it
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    crate::log_event!("watcher", "stopped");
                    return Ok(());
                }

                _ = ticker.tick() => {
                    self.poll_once().await?;
                }
            }
        }
    }
}

/// Builder for constructing a PollingWatcher.
pub struct PollingWatcherBuilder {
    root: Option<PathBuf>,
    interval: Duration,
    bus: EventBus,
}

impl PollingWatcherBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            root: None,
            interval: Duration::from_secs(5),
            bus: EventBus::new(),
        }
    }

    /// Set the directory to watch.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Set the time between scans.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Add a subscriber.
    pub fn handler(mut self, handler: Arc<dyn WatchHandler>) -> Self {
        self.bus.subscribe(handler);
        self
    }

    /// Build the PollingWatcher.
    pub fn build(self) -> Result<PollingWatcher, WatchError> {
        let root = self.root.ok_or_else(|| WatchError::InitFailed {
            reason: "Watch root is required".to_string(),
        })?;

        if self.interval.is_zero() {
            return Err(WatchError::InitFailed {
                reason: "Poll interval must be greater than zero".to_string(),
            });
        }

        if !root.is_dir() {
            return Err(WatchError::PathWatchFailed {
                path: root,
                reason: "not a directory".to_string(),
            });
        }

        Ok(PollingWatcher {
            root,
            interval: self.interval,
            bus: self.bus,
            detector: ChangeDetector::new(),
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for PollingWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::event::{ChangeEvent, ChangeKind};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::fs;
    use std::path::Path;
    use std::time::Instant;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Collector {
        events: Mutex<Vec<ChangeEvent>>,
    }

    #[async_trait]
    impl WatchHandler for Collector {
        fn name(&self) -> &str {
            "collector"
        }

        async fn on_event(&self, event: &ChangeEvent) {
            self.events.lock().push(event.clone());
        }
    }

    impl Collector {
        fn take(&self) -> Vec<ChangeEvent> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    fn watcher(root: &Path, collector: &Arc<Collector>) -> PollingWatcher {
        PollingWatcher::builder()
            .root(root)
            .interval(Duration::from_millis(20))
            .handler(collector.clone())
            .build()
            .unwrap()
    }

    /// Bump a file's mtime far enough that coarse filesystem clocks notice.
    fn touch_later(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        let modified = file.metadata().unwrap().modified().unwrap();
        file.set_modified(modified + Duration::from_secs(secs)).unwrap();
    }

    #[test]
    fn test_build_requires_root() {
        let result = PollingWatcher::builder().build();
        assert!(matches!(result, Err(WatchError::InitFailed { .. })));
    }

    #[test]
    fn test_build_rejects_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = PollingWatcher::builder()
            .root(temp_dir.path().join("missing"))
            .build();
        assert!(matches!(result, Err(WatchError::PathWatchFailed { .. })));
    }

    #[test]
    fn test_build_rejects_zero_interval() {
        let temp_dir = TempDir::new().unwrap();
        let result = PollingWatcher::builder()
            .root(temp_dir.path())
            .interval(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(WatchError::InitFailed { .. })));
    }

    #[tokio::test]
    async fn test_poll_once_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("a.txt");
        fs::write(&file, vec![b'x'; 100]).unwrap();

        let collector = Arc::new(Collector::default());
        let mut watcher = watcher(root, &collector);

        // Baseline: populated tree, no events
        assert_eq!(watcher.poll_once().await.unwrap(), 0);
        assert!(collector.take().is_empty());

        // Grow to 150 bytes
        fs::write(&file, vec![b'x'; 150]).unwrap();
        touch_later(&file, 2);
        assert_eq!(watcher.poll_once().await.unwrap(), 1);
        let events = collector.take();
        assert_eq!(events[0].kind, ChangeKind::Modified);
        assert_eq!(events[0].relative_path, PathBuf::from("a.txt"));
        assert_eq!(events[0].size(), Some(150));

        // Unchanged tree, nothing new
        assert_eq!(watcher.poll_once().await.unwrap(), 0);

        // Remove
        fs::remove_file(&file).unwrap();
        assert_eq!(watcher.poll_once().await.unwrap(), 1);
        let events = collector.take();
        assert_eq!(events[0].kind, ChangeKind::Deleted);
        assert_eq!(events[0].relative_path, PathBuf::from("a.txt"));
    }

    #[tokio::test]
    async fn test_created_file_in_subdirectory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let collector = Arc::new(Collector::default());
        let mut watcher = watcher(root, &collector);
        watcher.poll_once().await.unwrap();

        fs::create_dir_all(root.join("src/lib")).unwrap();
        fs::write(root.join("src/lib/util.py"), "x = 1").unwrap();
        watcher.poll_once().await.unwrap();

        let events = collector.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Created);
        assert_eq!(events[0].relative_path, PathBuf::from("src/lib/util.py"));
        assert_eq!(
            events[0].absolute_path,
            Some(root.join("src/lib/util.py"))
        );
    }

    #[tokio::test]
    async fn test_watch_stops_on_cancel() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();

        let collector = Arc::new(Collector::default());
        let watcher = watcher(&root, &collector);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(watcher.watch(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(60)).await;
        fs::write(root.join("late.txt"), "hello").unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("watch did not stop")
            .unwrap();
        assert!(result.is_ok());

        let events = collector.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Created);
        assert_eq!(events[0].relative_path, PathBuf::from("late.txt"));
    }

    /// Subscriber that takes a while per event, like a redeploy does.
    struct Slow {
        delay: Duration,
        handled: Mutex<usize>,
    }

    #[async_trait]
    impl WatchHandler for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn on_event(&self, _event: &ChangeEvent) {
            tokio::time::sleep(self.delay).await;
            *self.handled.lock() += 1;
        }
    }

    #[tokio::test]
    async fn test_cancel_drops_pending_events() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();

        let slow = Arc::new(Slow {
            delay: Duration::from_millis(300),
            handled: Mutex::new(0),
        });
        let mut watcher = PollingWatcher::builder()
            .root(&root)
            .interval(Duration::from_millis(20))
            .handler(slow.clone())
            .build()
            .unwrap();
        watcher.poll_once().await.unwrap();

        for i in 0..5 {
            fs::write(root.join(format!("batch-{i}.txt")), "payload").unwrap();
        }

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(watcher.watch(shutdown.clone()));

        // watch() opens with a scan, so the first delivery is under way by now
        tokio::time::sleep(Duration::from_millis(150)).await;
        let cancelled_at = Instant::now();
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("watch did not stop")
            .unwrap();
        assert!(result.is_ok());

        // At most the in-flight event finishes after cancellation
        assert!(cancelled_at.elapsed() < Duration::from_millis(500));
        assert!(*slow.handled.lock() <= 1);
    }
}
