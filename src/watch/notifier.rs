//! Filesystem change notifications for the watched files.

use super::debounce::WatchSignal;
use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

/// Keeps the underlying watcher alive; notifications stop when dropped.
pub struct Notifier {
    _watcher: RecommendedWatcher,
}

/// Resolve symlinks and relative paths so they compare equal to the paths
/// the watcher reports. A file that doesn't exist (yet) gets its directory
/// resolved instead.
fn canonical(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }

    let absolute = match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    };
    let resolved = match (absolute.parent(), absolute.file_name()) {
        (Some(dir), Some(name)) => dir.canonicalize().ok().map(|dir| dir.join(name)),
        _ => None,
    };
    resolved.unwrap_or(absolute)
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Any | EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Indices of the watched files touched by `event`.
fn touched(files: &[PathBuf], event: &Event) -> Vec<usize> {
    if !is_content_change(&event.kind) {
        return Vec::new();
    }

    files
        .iter()
        .enumerate()
        .filter(|(_, file)| event.paths.iter().any(|path| path == *file))
        .map(|(i, _)| i)
        .collect()
}

/// Start watching `paths`, sending a [`WatchSignal::Changed`] with the file's
/// index into `tx` whenever the filesystem reports a change to it.
///
/// Parent directories are watched rather than the files themselves so that
/// editors which save by replacing the file keep being noticed.
pub fn subscribe(paths: &[PathBuf], tx: UnboundedSender<WatchSignal>) -> Result<Notifier> {
    let files: Vec<PathBuf> = paths.iter().map(|path| canonical(path)).collect();
    let dirs: BTreeSet<PathBuf> = files
        .iter()
        .filter_map(|file| file.parent().map(Path::to_path_buf))
        .collect();

    let handler_files = files.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for index in touched(&handler_files, &event) {
                    log::trace!("{:?} on {}", event.kind, handler_files[index].display());
                    let _ = tx.send(WatchSignal::Changed(index));
                }
            }
            Err(e) => log::warn!("File watcher error: {e}"),
        },
        Config::default(),
    )
    .with_context(|| "Failed to create file watcher")?;

    for dir in &dirs {
        if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
            let affected = files
                .iter()
                .filter(|file| file.parent() == Some(dir.as_path()))
                .map(|file| file.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            log::warn!("Can't watch {affected} for changes");
            return Err(e).with_context(|| format!("Failed to watch {}", dir.display()));
        }
        log::debug!("watching {}", dir.display());
    }

    Ok(Notifier { _watcher: watcher })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use std::time::Duration;

    #[test]
    fn can_map_event_to_file_indices() {
        let files = vec![PathBuf::from("/doc/a.md"), PathBuf::from("/doc/b.md")];

        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/doc/b.md"))
            .add_path(PathBuf::from("/doc/other.md"));
        assert_eq!(touched(&files, &event), vec![1]);

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/doc/a.md"));
        assert_eq!(touched(&files, &event), vec![0]);
    }

    #[test]
    fn access_events_are_ignored() {
        let files = vec![PathBuf::from("/doc/a.md")];
        let event = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/doc/a.md"));
        assert!(touched(&files, &event).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn missing_file_resolves_through_symlinked_dir() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let real = dir.path().join("real");
        let link = dir.path().join("link");
        std::fs::create_dir(&real).expect("can create dir");
        std::os::unix::fs::symlink(&real, &link).expect("can symlink");

        let expected = real
            .canonicalize()
            .expect("real dir exists")
            .join("later.md");
        assert_eq!(canonical(&link.join("later.md")), expected);
    }

    #[test]
    fn missing_dir_fails_to_subscribe() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let nowhere = dir.path().join("nowhere").join("a.md");

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let err = subscribe(&[nowhere], tx).err().expect("can't watch a missing dir");
        assert!(format!("{err:#}").contains("nowhere"));
    }

    #[tokio::test]
    async fn can_notify_about_edited_file() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let a = dir.path().join("a.md");
        let b = dir.path().join("b.md");
        std::fs::write(&a, "a").expect("can write a");
        std::fs::write(&b, "b").expect("can write b");

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _notifier = subscribe(&[a, b.clone()], tx).expect("can watch files");

        std::fs::write(&b, "b, edited").expect("can edit b");

        let signal = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("notification arrives")
            .expect("watcher alive");
        assert_eq!(signal, WatchSignal::Changed(1));
    }
}
