//! Authentication module for ClientLogin token handling.
//!
//! This module provides:
//! - `TokenAuthHandler`: token generation, caching, and header building
//! - `Credentials`: the caller-supplied identity fields with change
//!   notification
//! - `CredentialStore`: secure OS-level password storage via keyring
//!
//! Tokens are cached in memory for the lifetime of a handler instance
//! and invalidated when the email, password, or provided auth token
//! changes.

pub mod credentials;
pub mod error;
pub mod handler;
pub mod store;

pub use credentials::{CredentialListener, Credentials};
pub use error::{AuthError, ConfigurationError};
pub use handler::{ErrorStrategy, Propagate, TokenAuthHandler};
pub use store::CredentialStore;
