use std::fmt::Write as _;

use thiserror::Error;

/// Credential problems detected before any network call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no credentials supplied")]
    NoCredentials,

    #[error("email address not included in credentials")]
    MissingEmail,

    #[error("password not included in credentials")]
    MissingPassword,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{}", login_failed_message(.email, .status, .error, .info))]
    LoginFailed {
        /// Account identifier the login was attempted for.
        email: String,
        /// HTTP status code returned by the login endpoint.
        status: u16,
        /// The server's `Error` field, or the whole raw response body
        /// when the server supplied none.
        error: String,
        /// The server's `Info` field, when present.
        info: Option<String>,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AuthError {
    /// True for errors raised by credential validation, before any
    /// network call was attempted.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AuthError::Configuration(_))
    }

    /// Raw error string reported by the login endpoint, if any.
    pub fn server_error(&self) -> Option<&str> {
        match self {
            AuthError::LoginFailed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Raw info string reported by the login endpoint, if any.
    pub fn server_info(&self) -> Option<&str> {
        match self {
            AuthError::LoginFailed { info, .. } => info.as_deref(),
            _ => None,
        }
    }
}

fn login_failed_message(email: &str, status: &u16, error: &str, info: &Option<String>) -> String {
    let mut message = format!("login failed for email {}: HTTP code {}.", email, status);
    if !error.is_empty() {
        let _ = write!(message, " Error: {}.", error);
    }
    if let Some(info) = info {
        let _ = write!(message, " Info: {}.", info);
    }
    message
}
