//! The current sandbox session, shared by every request handler.

use std::sync::{Arc, PoisonError, RwLock};

use super::Sandbox;

/// Holds at most one active sandbox.
///
/// Cloning shares the same slot, so a registry handed to the HTTP state
/// observes sandboxes registered elsewhere.
#[derive(Clone, Default)]
pub(crate) struct SessionRegistry {
    active: Arc<RwLock<Option<Arc<dyn Sandbox>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `sandbox` the active session, replacing any previous one.
    pub fn register(&self, sandbox: Arc<dyn Sandbox>) {
        let mut slot = self.active.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(sandbox);
    }

    /// Returns the active session, if one is registered.
    pub fn get(&self) -> Option<Arc<dyn Sandbox>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forgets the active session, as a provider teardown would.
    #[cfg(test)]
    pub fn clear(&self) {
        let mut slot = self.active.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }
}
