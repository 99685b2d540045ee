//! Per-session exclusion: at most one request drives a session at a time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct SessionLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when the session is already being driven.
    pub fn try_acquire(&self, session_id: &str) -> Option<SessionGuard> {
        let mut held = self.held.lock().ok()?;
        if !held.insert(session_id.to_string()) {
            return None;
        }
        Some(SessionGuard {
            held: self.held.clone(),
            session_id: session_id.to_string(),
        })
    }

    pub fn is_held(&self, session_id: &str) -> bool {
        self.held
            .lock()
            .map(|h| h.contains(session_id))
            .unwrap_or(false)
    }
}

/// Releases the session on drop.
pub struct SessionGuard {
    held: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let locks = SessionLocks::new();
        let guard = locks.try_acquire("s1").unwrap();
        assert!(locks.try_acquire("s1").is_none());
        assert!(locks.try_acquire("s2").is_some());
        drop(guard);
        assert!(!locks.is_held("s1"));
        assert!(locks.try_acquire("s1").is_some());
    }
}
