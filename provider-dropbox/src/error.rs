//! Error types for the Dropbox provider

use bridge_traits::error::BridgeError;
use bytes::Bytes;
use core_auth::AuthError;
use thiserror::Error;

/// Dropbox provider errors
#[derive(Error, Debug)]
pub enum DropboxError {
    /// No stored credentials; sign in first
    #[error("Not authorized")]
    NotAuthorized,

    /// The API answered with a non-2xx status. `body` is passed through
    /// untouched; Dropbox puts a JSON error summary there.
    #[error("Dropbox API error (status {status}, {} bytes)", body.len())]
    Response { status: u16, body: Bytes },

    /// Refreshing or loading credentials failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Request parameters could not be encoded
    #[error("Failed to encode request: {0}")]
    Encode(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The HTTP bridge cannot perform requests on this host
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

/// Result type for Dropbox operations
pub type Result<T> = std::result::Result<T, DropboxError>;

impl From<BridgeError> for DropboxError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::NotAvailable(msg) => DropboxError::Unimplemented(msg),
            other => DropboxError::NetworkError(other.to_string()),
        }
    }
}

impl DropboxError {
    /// Body of a non-2xx response as text, for display to the user.
    pub fn response_text(&self) -> Option<String> {
        match self {
            DropboxError::Response { body, .. } => Some(String::from_utf8_lossy(body).into_owned()),
            _ => None,
        }
    }
}
