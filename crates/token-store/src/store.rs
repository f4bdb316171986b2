//! Session token persistence.
//!
//! `TokenStore` never surfaces backend errors. A failed read or a corrupt
//! value is reported as absence; a failed write is logged and leaves the
//! previous value in place.

use crate::{AdminProfile, KeyValueStorage, MemoryStorage, StorageKeys};
use tracing::{debug, warn};

/// Access token, refresh token and cached profile for the current session.
pub struct TokenStore {
    storage: Box<dyn KeyValueStorage>,
}

impl TokenStore {
    /// Create a token store over the given backend
    pub fn new(storage: Box<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Token store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Token store read failed, treating as absent");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) -> bool {
        match self.storage.set(key, value) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Token store write failed");
                false
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        match self.storage.delete(key) {
            Ok(_) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Token store delete failed");
                false
            }
        }
    }

    // ==========================================
    // Access token
    // ==========================================

    pub fn get_access_token(&self) -> Option<String> {
        self.read(StorageKeys::ACCESS_TOKEN)
    }

    /// Persist the access token. Returns whether the write landed.
    pub fn set_access_token(&self, token: &str) -> bool {
        self.write(StorageKeys::ACCESS_TOKEN, token)
    }

    pub fn clear_access_token(&self) -> bool {
        self.remove(StorageKeys::ACCESS_TOKEN)
    }

    // ==========================================
    // Refresh token
    // ==========================================

    pub fn get_refresh_token(&self) -> Option<String> {
        self.read(StorageKeys::REFRESH_TOKEN)
    }

    /// Persist the refresh token. Returns whether the write landed.
    pub fn set_refresh_token(&self, token: &str) -> bool {
        self.write(StorageKeys::REFRESH_TOKEN, token)
    }

    pub fn clear_refresh_token(&self) -> bool {
        self.remove(StorageKeys::REFRESH_TOKEN)
    }

    // ==========================================
    // Profile
    // ==========================================

    /// Cached profile. Malformed JSON reads as absent.
    pub fn get_profile(&self) -> Option<AdminProfile> {
        let json = self.read(StorageKeys::PROFILE)?;
        match serde_json::from_str(&json) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "Cached profile is malformed, treating as absent");
                None
            }
        }
    }

    /// Persist the profile. Returns whether the write landed.
    pub fn set_profile(&self, profile: &AdminProfile) -> bool {
        match serde_json::to_string(profile) {
            Ok(json) => self.write(StorageKeys::PROFILE, &json),
            Err(e) => {
                warn!(error = %e, "Failed to encode profile");
                false
            }
        }
    }

    pub fn clear_profile(&self) -> bool {
        self.remove(StorageKeys::PROFILE)
    }

    // ==========================================
    // Whole session
    // ==========================================

    /// Persist tokens and profile together.
    ///
    /// If any write fails, the keys are restored to what they held before the
    /// call and `false` is returned, so readers never see a mix of old and new.
    pub fn set_all(
        &self,
        access_token: &str,
        refresh_token: &str,
        profile: &AdminProfile,
    ) -> bool {
        let profile_json = match serde_json::to_string(profile) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to encode profile");
                return false;
            }
        };

        let written = self.write_together(&[
            (StorageKeys::ACCESS_TOKEN, access_token),
            (StorageKeys::REFRESH_TOKEN, refresh_token),
            (StorageKeys::PROFILE, profile_json.as_str()),
        ]);
        if written {
            debug!("Session persisted");
        }
        written
    }

    /// Replace both tokens, leaving the profile alone. All-or-nothing like
    /// [`TokenStore::set_all`].
    pub fn set_tokens(&self, access_token: &str, refresh_token: &str) -> bool {
        self.write_together(&[
            (StorageKeys::ACCESS_TOKEN, access_token),
            (StorageKeys::REFRESH_TOKEN, refresh_token),
        ])
    }

    fn write_together(&self, entries: &[(&str, &str)]) -> bool {
        let previous: Vec<(&str, Option<String>)> = entries
            .iter()
            .map(|(key, _)| (*key, self.read(key)))
            .collect();

        for (key, value) in entries {
            if !self.write(key, value) {
                self.restore(&previous);
                return false;
            }
        }
        true
    }

    fn restore(&self, previous: &[(&str, Option<String>)]) {
        for (key, value) in previous {
            match value {
                Some(value) => {
                    self.write(key, value);
                }
                None => {
                    self.remove(key);
                }
            }
        }
        warn!("Session write rolled back");
    }

    /// Remove tokens and profile.
    pub fn clear_all(&self) {
        for key in StorageKeys::SESSION {
            self.remove(key);
        }
        debug!("Session cleared from store");
    }

    /// True when tokens and profile are all present and readable.
    pub fn has_session(&self) -> bool {
        self.get_access_token().is_some()
            && self.get_refresh_token().is_some()
            && self.get_profile().is_some()
    }

    /// True when any session key is present, readable or not.
    pub fn has_any(&self) -> bool {
        StorageKeys::SESSION
            .iter()
            .any(|key| self.storage.has(key).unwrap_or(true))
    }
}
