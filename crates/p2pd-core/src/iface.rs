// ── Interface handles ──
//
// A handle is what IPC callers hold on to. It is created when the
// engine announces an interface and invalidated, once and for good,
// when the interface goes away. Callers may keep a stale handle around
// and keep asking `is_valid`; every operation through it fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tracing::debug;

#[derive(Debug)]
pub struct InterfaceHandle {
    name: String,
    valid: AtomicBool,
}

impl InterfaceHandle {
    pub(crate) fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            valid: AtomicBool::new(true),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Returns `true` if this call performed the invalidation.
    pub(crate) fn invalidate(&self) -> bool {
        self.valid.swap(false, Ordering::AcqRel)
    }
}

// ── InterfaceRegistry ───────────────────────────────────────────────

/// Live handles keyed by interface name.
///
/// Written only by the event loop; read concurrently by callers looking
/// up handles.
#[derive(Debug, Default)]
pub struct InterfaceRegistry {
    handles: DashMap<String, Arc<InterfaceHandle>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the handle for a newly announced interface. A previous
    /// handle under the same name is invalidated first.
    pub(crate) fn register(&self, name: &str) -> Arc<InterfaceHandle> {
        let handle = InterfaceHandle::new(name);
        if let Some(old) = self.handles.insert(name.to_owned(), Arc::clone(&handle)) {
            old.invalidate();
            debug!(iface = name, "replaced stale interface handle");
        }
        handle
    }

    pub(crate) fn unregister(&self, name: &str) -> Option<Arc<InterfaceHandle>> {
        let (_, handle) = self.handles.remove(name)?;
        handle.invalidate();
        Some(handle)
    }

    pub fn get(&self, name: &str) -> Option<Arc<InterfaceHandle>> {
        self.handles.get(name).map(|h| Arc::clone(h.value()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn invalidation_happens_once() {
        let handle = InterfaceHandle::new("p2p-dev-wlan0");
        assert!(handle.is_valid());
        assert!(handle.invalidate());
        assert!(!handle.invalidate());
        assert!(!handle.is_valid());
    }

    #[test]
    fn unregister_invalidates_outstanding_handles() {
        let registry = InterfaceRegistry::new();
        let handle = registry.register("wlan0");
        let held = registry.get("wlan0").unwrap();
        assert!(Arc::ptr_eq(&handle, &held));

        registry.unregister("wlan0");
        assert!(!held.is_valid());
        assert!(registry.get("wlan0").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn re_registration_does_not_revive_old_handle() {
        let registry = InterfaceRegistry::new();
        let first = registry.register("wlan0");
        let second = registry.register("wlan0");
        assert!(!first.is_valid());
        assert!(second.is_valid());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn names_are_sorted() {
        let registry = InterfaceRegistry::new();
        registry.register("wlan1");
        registry.register("p2p-dev-wlan0");
        assert_eq!(registry.names(), vec!["p2p-dev-wlan0", "wlan1"]);
    }
}
