use bridge_traits::error::BridgeError;
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The redirect carried an `error` query parameter.
    #[error("Authorization failed: {0}")]
    CodeError(String),

    #[error("Authorization code not found in redirect URL")]
    CodeNotFoundInRedirectUrl,

    /// Non-2xx from the token endpoint. `body` is exactly what the server sent.
    #[error("Token endpoint returned status {status} ({} bytes)", body.len())]
    Response { status: u16, body: Bytes },

    /// The token endpoint sent an `expires_in` that is negative or too large.
    #[error("Token endpoint returned an unusable expires_in: {0}")]
    InvalidExpiry(i64),

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Serialization failed ({context}): {source}")]
    SerializationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Stored credentials were corrupted and have been removed")]
    TokenCorrupted,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    /// A bridge reported that it cannot perform the operation at all.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl AuthError {
    /// Map a transport failure from the HTTP bridge.
    pub(crate) fn from_transport(error: BridgeError) -> Self {
        match error {
            BridgeError::NotAvailable(message) => AuthError::Unimplemented(message),
            other => AuthError::NetworkError(other.to_string()),
        }
    }

    pub(crate) fn serialization(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AuthError::SerializationFailed {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Map a failure from the secure storage bridge.
    pub(crate) fn from_storage(error: BridgeError) -> Self {
        AuthError::SecureStorageUnavailable(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
