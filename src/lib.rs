//! ClientLogin token authentication.
//!
//! This library exchanges account credentials for a short-lived bearer
//! token at a ClientLogin endpoint, and attaches that token to the
//! header set of subsequent requests. It either uses a pre-supplied
//! token from configuration, or logs in, caches the token, and drops it
//! when a watched credential field changes.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use clientlogin::{Config, Credentials, TokenAuthHandler};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(Config::load()?);
//! let handler = TokenAuthHandler::new(config, "https://www.google.com", "adwords")?;
//!
//! let credentials = Credentials::from_login("user@example.com", "password");
//! let headers = handler.headers(&credentials).await?;
//! assert!(headers.contains_key("authToken"));
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;

pub use auth::{
    AuthError, ConfigurationError, CredentialListener, CredentialStore, Credentials,
    ErrorStrategy, Propagate, TokenAuthHandler,
};
pub use config::Config;
