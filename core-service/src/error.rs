use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Dropbox error: {0}")]
    Dropbox(#[from] provider_dropbox::DropboxError),
}

impl CoreError {
    /// Status and raw body when the server rejected the request.
    pub fn response(&self) -> Option<(u16, &[u8])> {
        match self {
            CoreError::Auth(core_auth::AuthError::Response { status, body })
            | CoreError::Dropbox(provider_dropbox::DropboxError::Response { status, body }) => {
                Some((*status, body.as_ref()))
            }
            _ => None,
        }
    }

    pub fn is_not_authorized(&self) -> bool {
        matches!(
            self,
            CoreError::Dropbox(provider_dropbox::DropboxError::NotAuthorized)
                | CoreError::Auth(core_auth::AuthError::NotAuthorized)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
