//! Platform integration hooks.
//!
//! The authorization step of the OAuth flow needs a user agent. The core only
//! builds the URL; handing it to a browser (or a webview, or a terminal prompt)
//! is the host's job.

use async_trait::async_trait;

use crate::error::Result;

/// Opens a URL in the host's user agent.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::platform::UrlOpener;
///
/// async fn start(opener: &dyn UrlOpener, url: &str) -> Result<()> {
///     opener.open_url(url).await
/// }
/// ```
#[async_trait]
pub trait UrlOpener: Send + Sync {
    /// Present `url` to the user.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::NotAvailable` when the host has no way to show a
    /// URL, or `BridgeError::OperationFailed` when launching it failed.
    async fn open_url(&self, url: &str) -> Result<()>;
}
