//! Opens the authorization URL in the system browser.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    platform::UrlOpener,
};
use tracing::{info, warn};

/// Launches URLs with the platform default handler (`open`, `xdg-open`,
/// `start`).
#[derive(Debug, Clone, Default)]
pub struct BrowserUrlOpener;

impl BrowserUrlOpener {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UrlOpener for BrowserUrlOpener {
    async fn open_url(&self, url: &str) -> Result<()> {
        let target = url.to_string();
        let launched = tokio::task::spawn_blocking(move || open::that(target))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Browser task failed: {}", e)))?;

        match launched {
            Ok(()) => {
                info!("Opened authorization page in browser");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Could not launch browser");
                Err(BridgeError::NotAvailable(format!(
                    "No browser available to open {}: {}",
                    url, e
                )))
            }
        }
    }
}
