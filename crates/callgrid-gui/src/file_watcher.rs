//! Reloads the open file when it changes on disk.
//!
//! The parent directory is watched rather than the file itself, since many
//! editors save by writing a temporary file and renaming it over the target.

use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};
use std::time::{Duration, Instant};

pub struct FileWatcher {
    watcher: RecommendedWatcher,
    rx: Receiver<Result<NotifyEvent, notify::Error>>,
    target: Option<PathBuf>,
    watched_dir: Option<PathBuf>,
    /// Time of the latest relevant change not yet reported.
    pending: Option<Instant>,
    debounce: Duration,
}

impl FileWatcher {
    pub fn new() -> Result<Self, notify::Error> {
        let (tx, rx) = channel();
        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;

        Ok(Self {
            watcher,
            rx,
            target: None,
            watched_dir: None,
            pending: None,
            debounce: Duration::from_millis(300),
        })
    }

    /// Follow `file`, replacing any previous target.
    pub fn watch(&mut self, file: &Path) -> Result<(), notify::Error> {
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        if self.watched_dir.as_deref() != Some(dir.as_path()) {
            if let Some(old) = self.watched_dir.take()
                && let Err(e) = self.watcher.unwatch(&old)
            {
                tracing::debug!("Unwatch {:?} failed: {}", old, e);
            }
            self.watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            self.watched_dir = Some(dir);
        }
        self.target = Some(file.to_path_buf());
        self.pending = None;
        Ok(())
    }

    /// Call once per frame. Returns true once the target changed and no
    /// further change arrived for the debounce period.
    pub fn poll(&mut self, now: Instant) -> bool {
        while let Ok(result) = self.rx.try_recv() {
            match result {
                Ok(event) => self.handle_notify_event(&event, now),
                Err(e) => tracing::warn!("File watcher error: {}", e),
            }
        }
        match self.pending {
            Some(at) if now.saturating_duration_since(at) >= self.debounce => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn handle_notify_event(&mut self, event: &NotifyEvent, now: Instant) {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => {}
            _ => return,
        }
        if event.paths.iter().any(|p| self.is_target(p)) {
            self.pending = Some(now);
        }
    }

    fn is_target(&self, path: &Path) -> bool {
        let Some(target) = &self.target else {
            return false;
        };
        // Only the target's directory is watched, non-recursively.
        path.file_name().is_some() && path.file_name() == target.file_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn modify(path: &Path) -> NotifyEvent {
        NotifyEvent::new(EventKind::Modify(ModifyKind::Any)).add_path(path.to_path_buf())
    }

    #[test]
    fn test_changes_are_debounced() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.rs");
        std::fs::write(&file, "fn main() {}\n").unwrap();

        let mut watcher = FileWatcher::new().unwrap();
        watcher.watch(&file).unwrap();
        let t0 = Instant::now() + Duration::from_secs(10);

        watcher.handle_notify_event(&modify(&file), t0);
        watcher.handle_notify_event(&modify(&file), t0 + Duration::from_millis(200));
        assert!(!watcher.poll(t0 + Duration::from_millis(400)));
        assert!(watcher.poll(t0 + Duration::from_millis(500)));
        assert!(!watcher.poll(t0 + Duration::from_millis(900)));
    }

    #[test]
    fn test_other_files_and_removals_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.rs");
        std::fs::write(&file, "fn main() {}\n").unwrap();

        let mut watcher = FileWatcher::new().unwrap();
        watcher.watch(&file).unwrap();
        let t0 = Instant::now();

        watcher.handle_notify_event(&modify(&dir.path().join("other.rs")), t0);
        watcher.handle_notify_event(
            &NotifyEvent::new(EventKind::Remove(RemoveKind::File)).add_path(file.clone()),
            t0,
        );
        assert!(!watcher.is_pending());

        watcher.handle_notify_event(
            &NotifyEvent::new(EventKind::Create(CreateKind::File)).add_path(file.clone()),
            t0,
        );
        assert!(watcher.is_pending());
    }
}
