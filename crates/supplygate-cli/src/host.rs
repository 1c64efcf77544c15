//! Terminal implementations of the guard's navigation and notification hooks.

use std::sync::atomic::{AtomicBool, Ordering};

use supplygate_core::guard::{MemoryNavigator, Navigator, NoticeLevel, Notifier};

/// Tracks the simulated route and reports navigation on stderr.
pub struct CliNavigator {
    routes: MemoryNavigator,
    reset: AtomicBool,
}

impl CliNavigator {
    pub fn new(route: &str) -> Self {
        Self {
            routes: MemoryNavigator::new(route),
            reset: AtomicBool::new(false),
        }
    }

    /// Move to a route without announcing it
    pub fn enter(&self, route: &str) {
        self.routes.set_path(route);
    }

    /// Whether the session was torn down during this run
    pub fn was_reset(&self) -> bool {
        self.reset.load(Ordering::SeqCst)
    }
}

impl Navigator for CliNavigator {
    fn current_path(&self) -> String {
        self.routes.current_path()
    }

    fn navigate(&self, path: &str) {
        eprintln!("-> {}", path);
        self.routes.navigate(path);
    }

    fn hard_reset(&self, path: &str) {
        eprintln!("-> {} (session cleared, run `supplygate login`)", path);
        self.routes.hard_reset(path);
        self.reset.store(true, Ordering::SeqCst);
    }
}

pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        let tag = match level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{}] {}", tag, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigator_tracks_route_and_reset() {
        let nav = CliNavigator::new("/homepage");
        assert_eq!(nav.current_path(), "/homepage");
        assert!(!nav.was_reset());

        nav.enter("/login");
        assert_eq!(nav.current_path(), "/login");

        nav.navigate("/unauthorized");
        assert!(!nav.was_reset());

        nav.hard_reset("/login");
        assert!(nav.was_reset());
        assert_eq!(nav.current_path(), "/login");
    }
}
