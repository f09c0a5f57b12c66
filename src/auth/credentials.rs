//! Caller-supplied identity fields and change notification.
//!
//! Credentials are an ordered field/value map. Login needs `email` and
//! `password`; any other fields pass through into request headers
//! untouched. Subscribed listeners are told about every mutation so the
//! auth handler can drop a token minted for stale credentials.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::store::CredentialStore;

/// Field holding the account email address.
pub const FIELD_EMAIL: &str = "email";

/// Field holding the account password.
pub const FIELD_PASSWORD: &str = "password";

/// Field holding a caller-provided token that bypasses generation.
pub const FIELD_AUTH_TOKEN: &str = "auth_token";

/// Observer for credential mutations. The owner of a [`Credentials`] map
/// calls subscribers on every change; a subscriber decides what, if
/// anything, the change invalidates.
pub trait CredentialListener: Send + Sync {
    /// Called after `field` changed. `value` is the new value, or `None`
    /// when the field was removed.
    fn credential_changed(&self, field: &str, value: Option<&str>);
}

/// Ordered credential map with change notification.
#[derive(Default, Clone)]
pub struct Credentials {
    fields: BTreeMap<String, String>,
    listeners: Vec<Arc<dyn CredentialListener>>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credentials carrying just an email and password.
    pub fn from_login(email: impl Into<String>, password: impl Into<String>) -> Self {
        let mut credentials = Self::new();
        credentials
            .fields
            .insert(FIELD_EMAIL.to_string(), email.into());
        credentials
            .fields
            .insert(FIELD_PASSWORD.to_string(), password.into());
        credentials
    }

    /// Login credentials for `email` with the password pulled from the
    /// given store.
    pub fn from_store(store: &CredentialStore, email: &str) -> Result<Self> {
        let password = store
            .get_password(email)
            .with_context(|| format!("No stored password for {}", email))?;
        Ok(Self::from_login(email, password))
    }

    /// Persist this map's password for its email in the given store, so
    /// a later session can rebuild the login with [`Self::from_store`].
    pub fn remember(&self, store: &CredentialStore) -> Result<()> {
        let email = self
            .get(FIELD_EMAIL)
            .context("Credentials have no email to remember")?;
        let password = self
            .get(FIELD_PASSWORD)
            .context("Credentials have no password to remember")?;
        store.store(email, password)
    }

    /// Register a listener for future mutations.
    pub fn subscribe(&mut self, listener: Arc<dyn CredentialListener>) {
        self.listeners.push(listener);
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Set a field and notify subscribers.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        self.fields.insert(field.clone(), value.clone());
        for listener in &self.listeners {
            listener.credential_changed(&field, Some(&value));
        }
    }

    /// Remove a field and notify subscribers.
    pub fn unset(&mut self, field: &str) {
        if self.fields.remove(field).is_some() {
            for listener in &self.listeners {
                listener.credential_changed(field, None);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Field/value pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
    }
}
