//! Lifecycle registry of actively sampled pids.
//!
//! Shared between the discovery loop (insert) and the dispatcher (remove);
//! the backing map keeps every check-and-insert atomic so the same pid can
//! never get two samplers.

use dashmap::DashMap;

/// Invariant: a pid is present iff exactly one sampler task is running for
/// it.
#[derive(Debug, Default)]
pub struct Registry {
    pids: DashMap<i32, ()>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically insert a pid if absent. Returns `true` when this call
    /// performed the insert, meaning the caller must spawn the sampler.
    /// `false` means a sampler is already active and no second one may be
    /// spawned.
    pub fn register(&self, pid: i32) -> bool {
        self.pids.insert(pid, ()).is_none()
    }

    /// Atomically remove a pid. Valid once its terminal event has been
    /// processed, or when its sampler exits without ever producing events.
    pub fn unregister(&self, pid: i32) -> bool {
        self.pids.remove(&pid).is_some()
    }

    pub fn contains(&self, pid: i32) -> bool {
        self.pids.contains_key(&pid)
    }

    /// Drop every pid the predicate rejects.
    pub fn retain<F: FnMut(i32) -> bool>(&self, mut keep: F) {
        self.pids.retain(|pid, _| keep(*pid));
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_check_and_insert() {
        let registry = Registry::new();
        assert!(registry.register(100));
        // Second registration before the terminal event is a no-op; the
        // caller must not spawn another sampler.
        assert!(!registry.register(100));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_allows_reregistration() {
        let registry = Registry::new();
        assert!(registry.register(100));
        assert!(registry.unregister(100));
        assert!(!registry.unregister(100));
        assert!(registry.register(100));
    }

    #[test]
    fn test_retain_drops_rejected_pids() {
        let registry = Registry::new();
        registry.register(100);
        registry.register(200);
        registry.retain(|pid| pid == 100);
        assert!(registry.contains(100));
        assert!(!registry.contains(200));
    }

    #[test]
    fn test_concurrent_register_single_winner() {
        use std::sync::Arc;

        let registry = Arc::new(Registry::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || registry.register(7777)));
        }
        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }
}
