//! Per-file debounce state machine driving rebuilds.
//!
//! Each watched file moves through three states:
//!
//! - `Idle`: waiting for a change notification
//! - `Pending`: a notification arrived and the debounce timer is running;
//!   further notifications for the file are dropped
//! - `Rebuilding`: the timer ran out and the file's contents really changed,
//!   so the whole document is being rebuilt
//!
//! When the timer runs out the file is fingerprinted; if the contents are the
//! same as last time (a metadata-only touch, an editor's atomic save that wrote
//! identical bytes) the file goes back to `Idle` without a rebuild.
//!
//! Rebuilds are awaited inside the loop, so there is never more than one in
//! flight. Signals arriving meanwhile wait in the channel and are handled once
//! the rebuild is done.

use super::fingerprint::Fingerprint;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// How long a file has to settle after a notification before it is checked.
pub const DEBOUNCE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Idle,
    Pending,
    Rebuilding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchSignal {
    /// The filesystem reported a change to the file at this index
    Changed(usize),
    /// The debounce timer of the file at this index ran out
    Settled(usize),
}

/// A watched file and what we last saw of it.
#[derive(Debug)]
pub struct FileEntry {
    pub path: PathBuf,
    pub fingerprint: Option<Fingerprint>,
    pub state: FileState,
}

/// Whatever needs to happen when a watched file changed.
#[async_trait]
pub trait Rebuild: Send {
    async fn rebuild(&mut self);
}

pub struct WatchLoop<R> {
    entries: Vec<FileEntry>,
    debounce: Duration,
    rebuilder: R,
    tx: UnboundedSender<WatchSignal>,
    rx: UnboundedReceiver<WatchSignal>,
}

impl<R: Rebuild> WatchLoop<R> {
    pub fn new(paths: Vec<PathBuf>, debounce: Duration, rebuilder: R) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let entries = paths
            .into_iter()
            .map(|path| FileEntry {
                path,
                fingerprint: None,
                state: FileState::Idle,
            })
            .collect();

        Self {
            entries,
            debounce,
            rebuilder,
            tx,
            rx,
        }
    }

    /// Where change notifications for this loop go.
    pub fn sender(&self) -> UnboundedSender<WatchSignal> {
        self.tx.clone()
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Record the current contents of every file so that the first
    /// notification after startup isn't mistaken for a change.
    pub async fn seed(&mut self) {
        for entry in &mut self.entries {
            match Fingerprint::of_file(&entry.path).await {
                Ok(fingerprint) => {
                    log::debug!("{} starts at {fingerprint}", entry.path.display());
                    entry.fingerprint = Some(fingerprint);
                }
                Err(e) => log::debug!("{e:#}"),
            }
        }
    }

    /// Handle signals forever.
    pub async fn run(mut self) {
        while let Some(signal) = self.rx.recv().await {
            self.handle(signal).await;
        }
    }

    pub(crate) async fn handle(&mut self, signal: WatchSignal) {
        match signal {
            WatchSignal::Changed(index) => self.on_changed(index),
            WatchSignal::Settled(index) => self.on_settled(index).await,
        }
    }

    fn on_changed(&mut self, index: usize) {
        let Some(entry) = self.entries.get_mut(index) else {
            log::warn!("change notification for unknown file #{index}");
            return;
        };

        if entry.state != FileState::Idle {
            log::trace!("{} is {:?}, ignoring", entry.path.display(), entry.state);
            return;
        }

        entry.state = FileState::Pending;

        let tx = self.tx.clone();
        let delay = self.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(WatchSignal::Settled(index));
        });
    }

    async fn on_settled(&mut self, index: usize) {
        let Some(entry) = self.entries.get_mut(index) else {
            return;
        };
        if entry.state != FileState::Pending {
            return;
        }

        let current = match Fingerprint::of_file(&entry.path).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                log::warn!("{e:#}");
                // whatever shows up at this path next counts as a change
                entry.fingerprint = None;
                entry.state = FileState::Idle;
                return;
            }
        };

        if entry.fingerprint == Some(current) {
            log::debug!("{} is unchanged ({current})", entry.path.display());
            entry.state = FileState::Idle;
            return;
        }

        log::info!(
            "{} changed, compiling...",
            console::style(entry.path.display()).underlined()
        );
        entry.fingerprint = Some(current);
        entry.state = FileState::Rebuilding;

        self.rebuilder.rebuild().await;

        self.entries[index].state = FileState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Counter {
        rebuilds: Arc<AtomicUsize>,
        done: Option<UnboundedSender<usize>>,
    }

    impl Counter {
        fn count(&self) -> usize {
            self.rebuilds.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Rebuild for Counter {
        async fn rebuild(&mut self) {
            let n = self.rebuilds.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(done) = &self.done {
                let _ = done.send(n);
            }
        }
    }

    fn fixture(contents: &[&str]) -> (tempfile::TempDir, Vec<PathBuf>) {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let paths = contents
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let path = dir.path().join(format!("{i}.md"));
                std::fs::write(&path, text).expect("can write fixture");
                path
            })
            .collect();
        (dir, paths)
    }

    #[tokio::test]
    async fn notification_moves_idle_file_to_pending() {
        let (_dir, paths) = fixture(&["a", "b"]);
        let mut watch_loop = WatchLoop::new(paths, DEBOUNCE, Counter::default());

        watch_loop.handle(WatchSignal::Changed(1)).await;
        assert_eq!(watch_loop.entries()[0].state, FileState::Idle);
        assert_eq!(watch_loop.entries()[1].state, FileState::Pending);
    }

    #[tokio::test]
    async fn settled_file_with_new_contents_rebuilds() {
        let (_dir, paths) = fixture(&["a"]);
        let counter = Counter::default();
        let mut watch_loop = WatchLoop::new(paths.clone(), DEBOUNCE, counter.clone());
        watch_loop.seed().await;

        std::fs::write(&paths[0], "a, edited").expect("can edit fixture");
        watch_loop.handle(WatchSignal::Changed(0)).await;
        watch_loop.handle(WatchSignal::Settled(0)).await;

        assert_eq!(counter.count(), 1);
        assert_eq!(watch_loop.entries()[0].state, FileState::Idle);
        assert_eq!(
            watch_loop.entries()[0].fingerprint,
            Some(Fingerprint::of(b"a, edited"))
        );
    }

    #[tokio::test]
    async fn unchanged_contents_are_not_rebuilt() {
        let (_dir, paths) = fixture(&["a"]);
        let counter = Counter::default();
        let mut watch_loop = WatchLoop::new(paths.clone(), DEBOUNCE, counter.clone());
        watch_loop.seed().await;

        // touch without changing a byte
        std::fs::write(&paths[0], "a").expect("can rewrite fixture");
        watch_loop.handle(WatchSignal::Changed(0)).await;
        watch_loop.handle(WatchSignal::Settled(0)).await;

        assert_eq!(counter.count(), 0);
        assert_eq!(watch_loop.entries()[0].state, FileState::Idle);
    }

    #[tokio::test]
    async fn stray_settle_is_ignored() {
        let (_dir, paths) = fixture(&["a"]);
        let counter = Counter::default();
        let mut watch_loop = WatchLoop::new(paths, DEBOUNCE, counter.clone());

        watch_loop.handle(WatchSignal::Settled(0)).await;
        watch_loop.handle(WatchSignal::Changed(7)).await;
        assert_eq!(counter.count(), 0);
        assert_eq!(watch_loop.entries()[0].state, FileState::Idle);
    }

    #[tokio::test]
    async fn unreadable_file_resets_fingerprint() {
        let (_dir, paths) = fixture(&["a"]);
        let counter = Counter::default();
        let mut watch_loop = WatchLoop::new(paths.clone(), DEBOUNCE, counter.clone());
        watch_loop.seed().await;

        std::fs::remove_file(&paths[0]).expect("can remove fixture");
        watch_loop.handle(WatchSignal::Changed(0)).await;
        watch_loop.handle(WatchSignal::Settled(0)).await;
        assert_eq!(counter.count(), 0);
        assert_eq!(watch_loop.entries()[0].fingerprint, None);

        // the same bytes coming back still count as a change
        std::fs::write(&paths[0], "a").expect("can restore fixture");
        watch_loop.handle(WatchSignal::Changed(0)).await;
        watch_loop.handle(WatchSignal::Settled(0)).await;
        assert_eq!(counter.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_notifications_rebuilds_once() {
        let (_dir, paths) = fixture(&["a", "b"]);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let counter = Counter {
            done: Some(done_tx),
            ..Counter::default()
        };
        let mut watch_loop = WatchLoop::new(paths.clone(), DEBOUNCE, counter.clone());
        watch_loop.seed().await;
        let tx = watch_loop.sender();
        let task = tokio::spawn(watch_loop.run());

        std::fs::write(&paths[0], "a, edited").expect("can edit fixture");
        for _ in 0..5 {
            tx.send(WatchSignal::Changed(0)).expect("loop is running");
            tokio::time::sleep(Duration::from_millis(150)).await;
        }

        let n = tokio::time::timeout(Duration::from_secs(30), done_rx.recv())
            .await
            .expect("rebuild happens")
            .expect("counter alive");
        assert_eq!(n, 1);

        tokio::time::sleep(DEBOUNCE * 5).await;
        assert!(done_rx.try_recv().is_err());
        assert_eq!(counter.count(), 1);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn later_edit_rebuilds_again() {
        let (_dir, paths) = fixture(&["a", "b"]);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let counter = Counter {
            done: Some(done_tx),
            ..Counter::default()
        };
        let mut watch_loop = WatchLoop::new(paths.clone(), DEBOUNCE, counter.clone());
        watch_loop.seed().await;
        let tx = watch_loop.sender();
        let task = tokio::spawn(watch_loop.run());

        std::fs::write(&paths[0], "a, edited").expect("can edit fixture");
        tx.send(WatchSignal::Changed(0)).expect("loop is running");
        let first = tokio::time::timeout(Duration::from_secs(30), done_rx.recv())
            .await
            .expect("first rebuild happens");
        assert_eq!(first, Some(1));

        // a different file, once the first has settled
        std::fs::write(&paths[1], "b, edited").expect("can edit fixture");
        tx.send(WatchSignal::Changed(1)).expect("loop is running");
        let second = tokio::time::timeout(Duration::from_secs(30), done_rx.recv())
            .await
            .expect("second rebuild happens");
        assert_eq!(second, Some(2));

        task.abort();
    }
}
