//! Single-slot sink registries keyed by surface.
//!
//! One slot per [`SurfaceKey`]. Registering overwrites the slot (last writer
//! wins); unregistering is idempotent. Lookups hand out a clone of the sink
//! so it is invoked outside the lock.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::identifiers::SurfaceKey;

// ============================================================================
// Registry
// ============================================================================

/// Keyed single-slot store for reply or push sinks.
pub struct Registry<T> {
    /// Label used in logs ("responder", "callback").
    kind: &'static str,
    /// Active slots.
    slots: RwLock<FxHashMap<SurfaceKey, T>>,
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("keys", &slots.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T: Clone> Registry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: RwLock::new(FxHashMap::default()),
        }
    }

    /// Upserts the slot for `key`, returning the replaced sink.
    pub fn register(&self, key: SurfaceKey, sink: T) -> Option<T> {
        let previous = self.slots.write().insert(key.clone(), sink);
        trace!(kind = self.kind, %key, replaced = previous.is_some(), "Sink registered");
        previous
    }

    /// Removes the slot for `key` if present.
    pub fn unregister(&self, key: &SurfaceKey) -> Option<T> {
        let removed = self.slots.write().remove(key);
        trace!(kind = self.kind, %key, removed = removed.is_some(), "Sink unregistered");
        removed
    }

    /// Returns a clone of the sink for `key`.
    #[must_use]
    pub fn get(&self, key: &SurfaceKey) -> Option<T> {
        self.slots.read().get(key).cloned()
    }

    /// Returns `true` if a sink is registered for `key`.
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &SurfaceKey) -> bool {
        self.slots.read().contains_key(key)
    }

    /// Returns the number of active slots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns `true` if no slots are active.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_last_writer_wins() {
        let registry = Registry::new("test");
        let key = SurfaceKey::user_webview("v1");

        assert_eq!(registry.register(key.clone(), 1), None);
        assert_eq!(registry.register(key.clone(), 2), Some(1));
        assert_eq!(registry.get(&key), Some(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = Registry::new("test");
        let key = SurfaceKey::note_text_viewer("v1");
        registry.register(key.clone(), "sink");

        assert_eq!(registry.unregister(&key), Some("sink"));
        assert_eq!(registry.unregister(&key), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_keys_are_independent_per_surface_type() {
        let registry = Registry::new("test");
        registry.register(SurfaceKey::note_text_viewer("v1"), 'n');
        registry.register(SurfaceKey::user_webview("v1"), 'u');

        assert_eq!(registry.get(&SurfaceKey::note_text_viewer("v1")), Some('n'));
        assert_eq!(registry.get(&SurfaceKey::user_webview("v1")), Some('u'));
        assert!(!registry.contains(&SurfaceKey::user_webview("v2")));
    }

    #[test]
    fn test_debug_lists_keys() {
        let registry = Registry::new("responder");
        registry.register(SurfaceKey::user_webview("v1"), 0u8);
        let text = format!("{registry:?}");
        assert!(text.contains("responder"));
        assert!(text.contains("v1"));
    }
}
