use eframe::egui;
use egui_notify::{Anchor, Toast, Toasts};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    fn duration(self) -> Duration {
        match self {
            Self::Info => Duration::from_secs(3),
            Self::Success => Duration::from_secs(4),
            Self::Warning => Duration::from_secs(5),
            Self::Error => Duration::from_secs(8),
        }
    }
}

/// Toasts with duplicate suppression. Trace errors tend to arrive in bursts
/// with the same message.
pub struct NotificationManager {
    toasts: Toasts,
    recent: Vec<(String, Instant)>,
    max_recent: usize,
    dedup_window: Duration,
}

impl NotificationManager {
    pub fn new() -> Self {
        let toasts = Toasts::new()
            .with_anchor(Anchor::TopRight)
            .with_margin(egui::vec2(8.0, 8.0));

        Self {
            toasts,
            recent: Vec::new(),
            max_recent: 50,
            dedup_window: Duration::from_secs(2),
        }
    }

    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notify_at(level, message.into(), Instant::now());
    }

    fn notify_at(&mut self, level: NotificationLevel, message: String, now: Instant) -> bool {
        if self.is_duplicate(&message, now) {
            return false;
        }
        self.recent.push((message.clone(), now));
        if self.recent.len() > self.max_recent {
            self.recent.remove(0);
        }

        let mut toast = match level {
            NotificationLevel::Info => Toast::info(message),
            NotificationLevel::Success => Toast::success(message),
            NotificationLevel::Warning => Toast::warning(message),
            NotificationLevel::Error => Toast::error(message),
        };
        toast.duration(Some(level.duration()));
        self.toasts.add(toast);
        true
    }

    fn is_duplicate(&mut self, message: &str, now: Instant) -> bool {
        self.recent
            .retain(|(_, at)| now.saturating_duration_since(*at) < Duration::from_secs(60));
        self.recent.iter().any(|(msg, at)| {
            msg == message && now.saturating_duration_since(*at) < self.dedup_window
        })
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.notify(NotificationLevel::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.notify(NotificationLevel::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.notify(NotificationLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(NotificationLevel::Error, message);
    }

    /// Call once per frame.
    pub fn render(&mut self, ctx: &egui::Context) {
        self.toasts.show(ctx);
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_inside_window_are_dropped() {
        let mut mgr = NotificationManager::new();
        let t0 = Instant::now();
        assert!(mgr.notify_at(NotificationLevel::Error, "boom".into(), t0));
        assert!(!mgr.notify_at(
            NotificationLevel::Error,
            "boom".into(),
            t0 + Duration::from_millis(500)
        ));
        assert!(mgr.notify_at(NotificationLevel::Error, "other".into(), t0));
        assert!(mgr.notify_at(
            NotificationLevel::Error,
            "boom".into(),
            t0 + Duration::from_secs(3)
        ));
    }

    #[test]
    fn test_recent_list_is_bounded() {
        let mut mgr = NotificationManager::new();
        let t0 = Instant::now();
        for i in 0..60 {
            mgr.notify_at(NotificationLevel::Info, format!("message {i}"), t0);
        }
        assert_eq!(mgr.recent.len(), 50);
    }
}
