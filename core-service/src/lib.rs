//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, secure
//! storage, URL opener, clock) into the Dropbox client core. Desktop apps
//! typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) and let [`CoreConfig`] fill in the default bridges;
//! other hosts inject their own.
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_service::{CoreConfig, DropboxClient, ListFolderParams};
//!
//! let config = CoreConfig::builder()
//!     .app_key("my-app-key")
//!     .redirect_uri("db-my-app-key://oauth")
//!     .build()?;
//! let client = DropboxClient::new(config);
//!
//! if !client.is_signed_in().await? {
//!     let url = client.sign_in().await?;
//!     println!("Authorize at {url}");
//!     return Ok(());
//! }
//!
//! let page = client.list_folder(ListFolderParams::new("")).await?;
//! for entry in page.entries {
//!     println!("{}", entry.path_display);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use core_auth::{AuthManager, AuthState, Credentials};
pub use core_runtime::config::{CoreConfig, CoreConfigBuilder, Endpoints};
pub use core_runtime::events::{AuthEvent, CoreEvent, EventBus, EventStream};
pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
pub use provider_dropbox::{
    DeleteFileParams, DeleteResult, DownloadFileParams, DropboxConnector, FileMetadata,
    GetMetadataParams, ListFolderParams, ListFolderResult, Metadata, MetadataTag,
    UploadFileParams, UploadMode,
};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{BrowserUrlOpener, FileSecureStore, KeyringSecureStore, ReqwestHttpClient};

use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::info;

/// Primary façade exposed to host applications.
///
/// Cheap to clone; clones share the same authorization state and event bus.
#[derive(Clone)]
pub struct DropboxClient {
    event_bus: EventBus,
    auth: Arc<AuthManager>,
    files: Arc<DropboxConnector>,
}

impl DropboxClient {
    /// Create a client from a validated configuration.
    pub fn new(config: CoreConfig) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size);
        let auth = Arc::new(AuthManager::new(&config, event_bus.clone()));
        Self::with_auth(config, event_bus, auth)
    }

    /// Create a client around an already configured [`AuthManager`], e.g.
    /// one with a custom PKCE generator.
    pub fn with_auth(config: CoreConfig, event_bus: EventBus, auth: Arc<AuthManager>) -> Self {
        let files = Arc::new(DropboxConnector::new(
            Arc::clone(&config.http_client),
            config.endpoints.clone(),
            auth.clone(),
        ));

        info!(app_key = %config.app_key, "Dropbox client initialized");

        Self {
            event_bus,
            auth,
            files,
        }
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    pub fn files(&self) -> &Arc<DropboxConnector> {
        &self.files
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to all core events from now on.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub async fn sign_in(&self) -> Result<String> {
        Ok(self.auth.sign_in().await?)
    }

    pub async fn handle_redirect(&self, url: &str) -> Result<bool> {
        Ok(self.auth.handle_redirect(url).await?)
    }

    pub async fn refresh_token(&self) -> Result<()> {
        Ok(self.auth.refresh_token().await?)
    }

    pub async fn sign_out(&self) -> Result<()> {
        Ok(self.auth.sign_out().await?)
    }

    pub async fn cancel_sign_in(&self) -> bool {
        self.auth.cancel_sign_in().await
    }

    pub async fn is_signed_in(&self) -> Result<bool> {
        Ok(self.auth.is_signed_in().await?)
    }

    pub async fn signed_in_stream(&self) -> BoxStream<'static, bool> {
        self.auth.signed_in_stream().await
    }

    pub async fn list_folder(&self, params: ListFolderParams) -> Result<ListFolderResult> {
        Ok(self.files.list_folder(params).await?)
    }

    pub async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderResult> {
        Ok(self.files.list_folder_continue(cursor).await?)
    }

    pub async fn download_file(&self, params: DownloadFileParams) -> Result<Bytes> {
        Ok(self.files.download_file(params).await?)
    }

    pub async fn upload_file(&self, params: UploadFileParams) -> Result<FileMetadata> {
        Ok(self.files.upload_file(params).await?)
    }

    pub async fn delete_file(&self, params: DeleteFileParams) -> Result<DeleteResult> {
        Ok(self.files.delete_file(params).await?)
    }

    pub async fn get_metadata(&self, params: GetMetadataParams) -> Result<Metadata> {
        Ok(self.files.get_metadata(params).await?)
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses the default bridges: reqwest for HTTP, the OS keychain for
/// credentials and the system browser for the authorization page.
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(
    app_key: impl Into<String>,
    redirect_uri: impl Into<String>,
    auth_scope: Option<String>,
) -> Result<DropboxClient> {
    let mut builder = CoreConfig::builder()
        .app_key(app_key)
        .redirect_uri(redirect_uri);
    if let Some(scope) = auth_scope {
        builder = builder.auth_scope(scope);
    }

    let config = builder
        .build()
        .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
    Ok(DropboxClient::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::platform::UrlOpener;
    use bridge_traits::storage::SecureStore;
    use bridge_traits::time::FixedClock;
    use chrono::{TimeZone, Utc};
    use futures::StreamExt;
    use mockall::mock;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        secrets: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl SecureStore for MemoryStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            self.secrets
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(self.secrets.lock().await.get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
            self.secrets.lock().await.remove(key);
            Ok(())
        }
    }

    struct NoopOpener;

    #[async_trait]
    impl UrlOpener for NoopOpener {
        async fn open_url(&self, _url: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn client(http: MockHttpClient) -> DropboxClient {
        let config = CoreConfig::builder()
            .app_key("app-key")
            .redirect_uri("db-app-key://oauth")
            .endpoints(Endpoints::single_host("https://dropbox.test"))
            .http_client(Arc::new(http))
            .secure_store(Arc::new(MemoryStore::default()))
            .url_opener(Arc::new(NoopOpener))
            .clock(Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            )))
            .build()
            .unwrap();
        DropboxClient::new(config)
    }

    #[tokio::test]
    async fn test_sign_in_then_list_folder() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| req.url == "https://dropbox.test/oauth2/token")
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"access_token": "at", "token_type": "bearer", "expires_in": 14400,
                        "refresh_token": "rt", "scope": "files.metadata.read",
                        "uid": "1", "account_id": "dbid:1"}"#,
                ))
            });
        http.expect_execute()
            .withf(|req| {
                req.url == "https://dropbox.test/2/files/list_folder"
                    && req.headers.get("Authorization").map(String::as_str) == Some("bearer at")
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"cursor": "c", "has_more": false, "entries": [
                        {".tag": "folder", "id": "id:1", "name": "Photos",
                         "path_display": "/Photos", "path_lower": "/photos"}
                    ]}"#,
                ))
            });

        let client = client(http);
        let mut signed_in = client.signed_in_stream().await;
        assert_eq!(signed_in.next().await, Some(false));

        client.sign_in().await.unwrap();
        assert!(client
            .handle_redirect("db-app-key://oauth?code=xyz")
            .await
            .unwrap());
        assert_eq!(signed_in.next().await, Some(true));

        let page = client.list_folder(ListFolderParams::new("")).await.unwrap();
        assert_eq!(page.entries[0].name, "Photos");
    }

    #[tokio::test]
    async fn test_file_operation_requires_sign_in() {
        let client = client(MockHttpClient::new());

        let error = client
            .get_metadata(GetMetadataParams::new("/a"))
            .await
            .unwrap_err();

        assert!(error.is_not_authorized());
        assert!(error.response().is_none());
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let client = client(MockHttpClient::new());
        let mut events = client.subscribe_events();

        client.sign_in().await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SigningIn)
        );
        assert!(client.cancel_sign_in().await);
    }
}
