//! Where the guard's side effects land.
//!
//! The guard never touches a router or a toast widget directly; hosts plug in
//! a `Navigator` and a `Notifier`.

use parking_lot::RwLock;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Current-route context and navigation.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;

    /// In-app route change; in-memory state survives
    fn navigate(&self, path: &str);

    /// Full reset to `path`, discarding all in-memory state tied to the old session
    fn hard_reset(&self, path: &str);
}

/// Notifier that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Success | NoticeLevel::Info => info!(notice = message),
            NoticeLevel::Warning => warn!(notice = message),
            NoticeLevel::Error => error!(notice = message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    Navigate(String),
    HardReset(String),
}

/// Navigator that keeps the route in memory and records every move.
#[derive(Debug)]
pub struct MemoryNavigator {
    current: RwLock<String>,
    history: RwLock<Vec<NavigationEvent>>,
}

impl MemoryNavigator {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(start.into()),
            history: RwLock::new(Vec::new()),
        }
    }

    pub fn set_path(&self, path: impl Into<String>) {
        *self.current.write() = path.into();
    }

    pub fn history(&self) -> Vec<NavigationEvent> {
        self.history.read().clone()
    }

    pub fn hard_reset_count(&self) -> usize {
        self.history
            .read()
            .iter()
            .filter(|e| matches!(e, NavigationEvent::HardReset(_)))
            .count()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.current.read().clone()
    }

    fn navigate(&self, path: &str) {
        self.set_path(path);
        self.history
            .write()
            .push(NavigationEvent::Navigate(path.to_string()));
    }

    fn hard_reset(&self, path: &str) {
        self.set_path(path);
        self.history
            .write()
            .push(NavigationEvent::HardReset(path.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_navigator_records_moves() {
        let nav = MemoryNavigator::new("/homepage");
        assert_eq!(nav.current_path(), "/homepage");

        nav.navigate("/unauthorized");
        nav.hard_reset("/login");

        assert_eq!(nav.current_path(), "/login");
        assert_eq!(
            nav.history(),
            vec![
                NavigationEvent::Navigate("/unauthorized".into()),
                NavigationEvent::HardReset("/login".into()),
            ]
        );
        assert_eq!(nav.hard_reset_count(), 1);
    }
}
