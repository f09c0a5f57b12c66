//! ClientLogin token acquisition and request-header construction.
//!
//! The handler either uses a token supplied through configuration, or
//! posts the account credentials to the ClientLogin endpoint and caches
//! the token it gets back. The cache lives for the lifetime of the
//! handler instance and is dropped whenever a watched credential field
//! changes.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::Config;

use super::credentials::{
    CredentialListener, Credentials, FIELD_AUTH_TOKEN, FIELD_EMAIL, FIELD_PASSWORD,
};
use super::error::{AuthError, ConfigurationError};

// ============================================================================
// Constants
// ============================================================================

/// Account type sent with every login request
const ACCOUNT_TYPE: &str = "GOOGLE";

/// Path of the login endpoint on the auth server
const AUTH_PATH: &str = "/accounts/ClientLogin";

/// Scheme prefix for the authorization string
const AUTH_SCHEME: &str = "GoogleLogin";

/// Configuration key checked for a pre-supplied token
const AUTH_TOKEN_CONFIG_KEY: &str = "authentication.auth_token";

/// Header field carrying the resolved token
const TOKEN_HEADER_FIELD: &str = "authToken";

/// Credential fields never forwarded verbatim into request headers
const IGNORED_FIELDS: [&str; 3] = [FIELD_EMAIL, FIELD_PASSWORD, FIELD_AUTH_TOKEN];

/// Credential fields whose mutation invalidates the cached token
const WATCHED_FIELDS: [&str; 3] = [FIELD_AUTH_TOKEN, FIELD_EMAIL, FIELD_PASSWORD];

/// HTTP request timeout in seconds.
/// 30s allows for slow login responses while failing fast enough for
/// good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Response body key carrying the token on success
const KEY_AUTH: &str = "Auth";

/// Response body key carrying the server's error code
const KEY_ERROR: &str = "Error";

/// Response body key carrying extra failure detail
const KEY_INFO: &str = "Info";

// ============================================================================
// Error strategy
// ============================================================================

/// Hook applied to login failures before they reach the caller.
///
/// The default strategy propagates the error unchanged. A future
/// strategy could react to token expiry here without changing the
/// handler's contract.
pub trait ErrorStrategy: Send + Sync {
    fn handle(&self, error: AuthError) -> AuthError {
        error
    }
}

/// Default strategy: surface every failure to the caller as-is.
pub struct Propagate;

impl ErrorStrategy for Propagate {}

// ============================================================================
// Handler
// ============================================================================

/// Token auth handler for the ClientLogin endpoint.
///
/// One instance owns one cached token. Sharing an instance between
/// tasks is fine: generation is serialized so at most one login request
/// is in flight per handler, and waiters pick up the cached result.
pub struct TokenAuthHandler {
    client: Client,
    config: Arc<Config>,
    server: String,
    service_name: String,
    token: Mutex<Option<String>>,
    generation: tokio::sync::Mutex<()>,
    error_strategy: Box<dyn ErrorStrategy>,
}

impl TokenAuthHandler {
    /// Create a handler with its own connection pool
    pub fn new(
        config: Arc<Config>,
        server: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(client, config, server, service_name))
    }

    /// Create a handler on an existing client, sharing its connection
    /// pool. reqwest::Client is Arc-backed, so the clone is cheap.
    pub fn with_client(
        client: Client,
        config: Arc<Config>,
        server: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            config,
            server: server.into(),
            service_name: service_name.into(),
            token: Mutex::new(None),
            generation: tokio::sync::Mutex::new(()),
            error_strategy: Box::new(Propagate),
        }
    }

    /// Replace the failure-handling strategy
    pub fn with_error_strategy(mut self, strategy: Box<dyn ErrorStrategy>) -> Self {
        self.error_strategy = strategy;
        self
    }

    /// Names of all header fields this handler will fill for the given
    /// credentials. Never performs network I/O.
    pub fn header_list(&self, credentials: &Credentials) -> Vec<String> {
        let mut fields: Vec<String> = credentials
            .field_names()
            .filter(|field| !IGNORED_FIELDS.contains(field))
            .map(String::from)
            .collect();
        fields.push(TOKEN_HEADER_FIELD.to_string());
        fields
    }

    /// All non-ignored credential fields plus `authToken` mapped to the
    /// resolved token. Generates a token if none is cached.
    pub async fn headers(
        &self,
        credentials: &Credentials,
    ) -> Result<BTreeMap<String, String>, AuthError> {
        let token = self.resolve_token(credentials).await?;
        let mut headers: BTreeMap<String, String> = credentials
            .iter()
            .filter(|(field, _)| !IGNORED_FIELDS.contains(field))
            .map(|(field, value)| (field.to_string(), value.to_string()))
            .collect();
        headers.insert(TOKEN_HEADER_FIELD.to_string(), token);
        Ok(headers)
    }

    /// Authorization string embedding the resolved token
    pub async fn auth_string(&self, credentials: &Credentials) -> Result<String, AuthError> {
        let token = self.resolve_token(credentials).await?;
        Ok(format!("{} auth={}", AUTH_SCHEME, token))
    }

    /// Resolve the token: configuration first, then the cache, then a
    /// login round-trip.
    async fn resolve_token(&self, credentials: &Credentials) -> Result<String, AuthError> {
        // A token supplied through configuration is used verbatim and
        // never enters the cache.
        if let Some(token) = self.config.read(AUTH_TOKEN_CONFIG_KEY) {
            debug!("using token supplied by configuration");
            return Ok(token);
        }

        // One login request in flight per handler. Waiters re-check the
        // cache once the in-flight attempt finishes.
        let _in_flight = self.generation.lock().await;

        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        match self.generate_token(credentials).await {
            Ok(token) => {
                *self.token_guard() = Some(token.clone());
                Ok(token)
            }
            // A failed attempt leaves the cache empty; the next call
            // starts over.
            Err(error) => Err(self.error_strategy.handle(error)),
        }
    }

    /// Perform the ClientLogin round-trip and extract the token
    async fn generate_token(&self, credentials: &Credentials) -> Result<String, AuthError> {
        let (email, password) = Self::validate_credentials(credentials)?;

        let url = format!("{}{}", self.server, AUTH_PATH);
        let form = [
            ("accountType", ACCOUNT_TYPE),
            ("Email", email),
            ("Passwd", password),
            ("service", self.service_name.as_str()),
        ];

        debug!(url = %url, email = %email, "requesting auth token");

        // .form() percent-encodes the values and sets the
        // application/x-www-form-urlencoded content type.
        let response = self.client.post(&url).form(&form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        let fields = parse_response_body(&body);

        if status == StatusCode::OK {
            // An empty Auth value is not a token; treat it as a failed
            // login so nothing gets cached.
            if let Some(token) = fields.get(KEY_AUTH).filter(|token| !token.is_empty()) {
                debug!(email = %email, "auth token generated");
                return Ok(token.clone());
            }
        }

        let error = fields
            .get(KEY_ERROR)
            .cloned()
            .unwrap_or_else(|| body.clone());
        let info = fields.get(KEY_INFO).cloned();
        warn!(email = %email, status = status.as_u16(), error = %error, "login failed");

        Err(AuthError::LoginFailed {
            email: email.to_string(),
            status: status.as_u16(),
            error,
            info,
        })
    }

    /// Check the credentials needed for token generation, in a fixed
    /// order so error messages are deterministic.
    fn validate_credentials(credentials: &Credentials) -> Result<(&str, &str), ConfigurationError> {
        if credentials.is_empty() {
            return Err(ConfigurationError::NoCredentials);
        }
        let email = credentials
            .get(FIELD_EMAIL)
            .ok_or(ConfigurationError::MissingEmail)?;
        let password = credentials
            .get(FIELD_PASSWORD)
            .ok_or(ConfigurationError::MissingPassword)?;
        Ok((email, password))
    }

    fn cached_token(&self) -> Option<String> {
        self.token_guard().clone()
    }

    fn token_guard(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned lock only ever holds a fully written Option; keep
        // going with the value instead of panicking.
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialListener for TokenAuthHandler {
    /// Drop the cached token when a field it was minted from changes.
    fn credential_changed(&self, field: &str, _value: Option<&str>) {
        if WATCHED_FIELDS.contains(&field) && self.token_guard().take().is_some() {
            debug!(field = %field, "credential changed, cached token invalidated");
        }
    }
}

// TODO: regenerate the token automatically when the server reports it
// expired, via an ErrorStrategy that retries the login once.

/// Extract key/value pairs from a ClientLogin response body.
///
/// Lines are `key=value` with the first `=` as the separator. The wire
/// format defines no escaping and no duplicate handling; we keep the
/// last occurrence of a duplicate key and skip lines without a `=`.
fn parse_response_body(body: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for line in body.lines() {
        match line.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                fields.insert(key.to_string(), value.to_string());
            }
            _ => debug!(line = %line, "skipping malformed response line"),
        }
    }
    fields
}
