//! Background polling of content file existence
//!
//! The watcher thread never touches the project. It works on its own copy of
//! `(path, absolute path, last known existence)` entries and reports every
//! flip over a channel; the controller drains the channel on the foreground.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, trace};

/// Default polling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Longest uninterrupted sleep, so `stop` never waits a full interval.
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// One watched content file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry {
    /// Project-relative path identifying the item.
    pub path: String,
    pub absolute: PathBuf,
    pub exists: bool,
}

impl WatchEntry {
    pub fn new(path: impl Into<String>, absolute: impl Into<PathBuf>, exists: bool) -> Self {
        Self {
            path: path.into(),
            absolute: absolute.into(),
            exists,
        }
    }
}

/// A watched file appeared or disappeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistenceChange {
    pub path: String,
    pub exists: bool,
}

pub struct ExistenceWatcher {
    interval: Duration,
    entries: Arc<Mutex<Vec<WatchEntry>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    tx: Sender<ExistenceChange>,
    rx: Receiver<ExistenceChange>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ExistenceWatcher {
    pub fn new(interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            interval,
            entries: Arc::new(Mutex::new(Vec::new())),
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
            tx,
            rx,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Replace the watched set.
    pub fn set_items(&self, entries: Vec<WatchEntry>) {
        *lock(&self.entries) = entries;
    }

    pub fn watched(&self) -> Vec<WatchEntry> {
        lock(&self.entries).clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Start polling. Does nothing if already running.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        self.stop.store(false, Ordering::SeqCst);

        let entries = Arc::clone(&self.entries);
        let stop = Arc::clone(&self.stop);
        let tx = self.tx.clone();
        let interval = self.interval;

        let spawned = thread::Builder::new()
            .name("pipeworks-watcher".to_string())
            .spawn(move || {
                trace!("Watcher started");
                while !stop.load(Ordering::Relaxed) {
                    poll(&entries, &tx);
                    sleep_unless_stopped(interval, &stop);
                }
                trace!("Watcher stopped");
            });

        match spawned {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => log::warn!("Failed to start file watcher: {}", e),
        }
    }

    /// Stop polling and join the thread. Does nothing if not running.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.store(true, Ordering::SeqCst);
            let _ = handle.join();
        }
    }

    /// Run one polling cycle on the calling thread.
    pub fn poll_now(&self) {
        poll(&self.entries, &self.tx);
    }

    /// Every change reported since the last drain, in order.
    pub fn drain(&self) -> Vec<ExistenceChange> {
        self.rx.try_iter().collect()
    }
}

impl Default for ExistenceWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Drop for ExistenceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll(entries: &Mutex<Vec<WatchEntry>>, tx: &Sender<ExistenceChange>) {
    let snapshot = lock(entries).clone();

    let flips: Vec<ExistenceChange> = snapshot
        .iter()
        .filter_map(|entry| {
            let exists = match fs::metadata(&entry.absolute) {
                Ok(_) => true,
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => {
                    trace!("stat {} failed: {}", entry.absolute.display(), e);
                    return None;
                }
            };
            (exists != entry.exists).then(|| ExistenceChange {
                path: entry.path.clone(),
                exists,
            })
        })
        .collect();

    if flips.is_empty() {
        return;
    }

    {
        let mut current = lock(entries);
        for flip in &flips {
            if let Some(entry) = current.iter_mut().find(|e| e.path == flip.path) {
                entry.exists = flip.exists;
            }
        }
    }

    for flip in flips {
        debug!(
            "{} {}",
            flip.path,
            if flip.exists { "appeared" } else { "disappeared" }
        );
        if tx.send(flip).is_err() {
            return;
        }
    }
}

fn sleep_unless_stopped(interval: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + interval;
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_poll_reports_flips_once() {
        let dir = TempDir::new().unwrap();
        let hero = dir.path().join("hero.png");
        let watcher = ExistenceWatcher::default();
        watcher.set_items(vec![
            WatchEntry::new("hero.png", &hero, false),
            WatchEntry::new("gone.png", dir.path().join("gone.png"), false),
        ]);

        watcher.poll_now();
        assert!(watcher.drain().is_empty());

        fs::write(&hero, b"png").unwrap();
        watcher.poll_now();
        watcher.poll_now();
        assert_eq!(
            watcher.drain(),
            vec![ExistenceChange {
                path: "hero.png".to_string(),
                exists: true
            }]
        );

        fs::remove_file(&hero).unwrap();
        watcher.poll_now();
        assert_eq!(
            watcher.drain(),
            vec![ExistenceChange {
                path: "hero.png".to_string(),
                exists: false
            }]
        );
    }

    #[test]
    fn test_background_thread_detects_new_file() {
        let dir = TempDir::new().unwrap();
        let font = dir.path().join("font.spritefont");
        let mut watcher = ExistenceWatcher::new(Duration::from_millis(10));
        watcher.set_items(vec![WatchEntry::new("font.spritefont", &font, false)]);

        watcher.start();
        watcher.start();
        assert!(watcher.is_running());
        fs::write(&font, b"<xml/>").unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut changes = Vec::new();
        while changes.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
            changes = watcher.drain();
        }
        watcher.stop();
        watcher.stop();

        assert!(!watcher.is_running());
        assert_eq!(changes.len(), 1);
        assert!(changes[0].exists);
    }

    #[test]
    fn test_restart_after_stop() {
        let dir = TempDir::new().unwrap();
        let mut watcher = ExistenceWatcher::new(Duration::from_millis(10));
        watcher.start();
        watcher.stop();

        let path = dir.path().join("a.txt");
        watcher.set_items(vec![WatchEntry::new("a.txt", &path, true)]);
        watcher.start();

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut changes = Vec::new();
        while changes.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
            changes = watcher.drain();
        }
        watcher.stop();
        assert_eq!(
            changes,
            vec![ExistenceChange {
                path: "a.txt".to_string(),
                exists: false
            }]
        );
    }
}
