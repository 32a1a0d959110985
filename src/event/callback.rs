//! Callback management for mug state updates.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::types::MugData;

/// Callback invoked with the full mug state after it changed.
pub type MugCallback = Arc<dyn Fn(&MugData) + Send + Sync>;

/// Handle returned by registration, used to unregister later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u64);

impl CallbackHandle {
    /// Returns the raw id.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

/// Registry of state callbacks.
///
/// Registration order is preserved when firing.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    callbacks: RwLock<Vec<(CallbackHandle, MugCallback)>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Registers a callback.
    ///
    /// Registering the same `Arc` again returns the handle it already has.
    pub fn register(&self, callback: MugCallback) -> CallbackHandle {
        let mut callbacks = self.callbacks.write();
        if let Some((handle, _)) = callbacks.iter().find(|(_, c)| Arc::ptr_eq(c, &callback)) {
            return *handle;
        }
        let handle = CallbackHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        callbacks.push((handle, callback));
        handle
    }

    /// Removes a callback. Returns false if the handle was unknown.
    pub fn unregister(&self, handle: CallbackHandle) -> bool {
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        callbacks.retain(|(h, _)| *h != handle);
        callbacks.len() != before
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Invokes every callback with the given state.
    pub fn fire(&self, data: &MugData) {
        // Clone out so callbacks may register or unregister
        let callbacks: Vec<MugCallback> =
            self.callbacks.read().iter().map(|(_, c)| Arc::clone(c)).collect();
        for callback in callbacks {
            callback(data);
        }
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_register_same_callback_twice() {
        let registry = CallbackRegistry::new();
        let callback: MugCallback = Arc::new(|_| {});

        let first = registry.register(Arc::clone(&callback));
        let second = registry.register(callback);

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_fire_and_unregister() {
        let registry = CallbackRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = registry.register(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        registry.fire(&MugData::default());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(registry.unregister(handle));
        assert!(!registry.unregister(handle));
        registry.fire(&MugData::default());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }
}
