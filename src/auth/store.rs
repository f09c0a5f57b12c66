//! Secure password storage backed by the OS keychain.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use keyring::Entry;

/// Keychain service name entries are filed under by default
const SERVICE_NAME: &str = "clientlogin";

/// Password storage keyed by account email. Keeps passwords out of
/// config files on disk. Keychain entries are created lazily and
/// reused, so repeated operations on one account go through a single
/// keychain handle.
pub struct CredentialStore {
    service: String,
    entries: Mutex<HashMap<String, Entry>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Store filing entries under a custom keychain service name
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store the password for an account
    pub fn store(&self, email: &str, password: &str) -> Result<()> {
        self.with_entry(email, |entry| entry.set_password(password))
            .context("Failed to store password in keychain")
    }

    /// Retrieve the password for an account
    pub fn get_password(&self, email: &str) -> Result<String> {
        self.with_entry(email, |entry| entry.get_password())
            .context("Failed to retrieve password from keychain")
    }

    /// Delete the stored password for an account
    pub fn delete(&self, email: &str) -> Result<()> {
        self.with_entry(email, |entry| entry.delete_credential())
            .context("Failed to delete password from keychain")
    }

    /// Check if a password is stored for an account
    pub fn has_password(&self, email: &str) -> bool {
        self.with_entry(email, |entry| entry.get_password()).is_ok()
    }

    fn with_entry<T>(
        &self,
        email: &str,
        op: impl FnOnce(&Entry) -> keyring::Result<T>,
    ) -> keyring::Result<T> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = match entries.entry(email.to_string()) {
            MapEntry::Occupied(occupied) => occupied.into_mut(),
            MapEntry::Vacant(vacant) => vacant.insert(Entry::new(&self.service, email)?),
        };
        op(entry)
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
