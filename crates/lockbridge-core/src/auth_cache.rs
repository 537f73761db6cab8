// ── Per-device credential cache ──
//
// Populated by pairing, read by WiFi provisioning and key transfer.
// Lives for the process; nothing is persisted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::model::{AuthMaterial, MacAddress};

/// Case-insensitive map from device identifier to [`AuthMaterial`].
#[derive(Debug, Default)]
pub struct AuthCache {
    entries: Mutex<HashMap<String, Arc<AuthMaterial>>>,
}

impl AuthCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<AuthMaterial>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store material for `mac`, replacing anything cached earlier.
    pub fn set(&self, mac: &MacAddress, material: AuthMaterial) {
        let replaced = self
            .entries()
            .insert(mac.normalized().to_owned(), Arc::new(material))
            .is_some();
        debug!(device = %mac, replaced, "cached auth material");
    }

    pub fn get(&self, mac: &MacAddress) -> Option<Arc<AuthMaterial>> {
        self.entries().get(mac.normalized()).cloned()
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.entries().contains_key(mac.normalized())
    }

    /// Forget `mac`. Returns whether anything was removed.
    pub fn clear(&self, mac: &MacAddress) -> bool {
        let removed = self.entries().remove(mac.normalized()).is_some();
        debug!(device = %mac, removed, "cleared auth material");
        removed
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
