//! # Core Configuration Module
//!
//! Provides configuration management for the Dropbox client core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding the Dropbox app settings and every bridge the core needs. It
//! validates eagerly so a misconfigured client fails at construction, not at
//! the first network call.
//!
//! ## Settings
//!
//! - `app_key` - Dropbox app key (the OAuth `client_id`), required
//! - `redirect_uri` - Registered redirect URI, required
//! - `auth_scope` - Space-separated scopes, optional
//! - `endpoints` - Base URLs for the authorize page, RPC and content hosts
//!
//! ## Bridges
//!
//! - `HttpClient` - required (desktop default: reqwest)
//! - `SecureStore` - required (desktop default: OS keychain)
//! - `UrlOpener` - optional (desktop default: system browser)
//! - `Clock` - optional, defaults to the system clock
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .app_key("abc123")
//!     .redirect_uri("db-abc123://2/token")
//!     .auth_scope("files.metadata.read files.content.read")
//!     .http_client(Arc::new(MyHttpClient))
//!     .secure_store(Arc::new(MySecureStore))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Panics: no app key, no redirect URI
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required settings");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, HttpClient, SecureStore, SystemClock, UrlOpener};
use std::sync::Arc;
use url::Url;

/// Default host serving the OAuth authorize page.
pub const DEFAULT_AUTH_BASE: &str = "https://www.dropbox.com";
/// Default host for RPC-style endpoints (token, delete, metadata, listing).
pub const DEFAULT_API_BASE: &str = "https://api.dropboxapi.com";
/// Default host for content endpoints (upload, download).
pub const DEFAULT_CONTENT_BASE: &str = "https://content.dropboxapi.com";

/// Base URLs of the three Dropbox hosts.
///
/// Stored without a trailing slash; paths are appended as `/oauth2/...` or `/2/...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth_base: String,
    pub api_base: String,
    pub content_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            content_base: DEFAULT_CONTENT_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Point all three hosts at one base URL, e.g. a local mock server.
    pub fn single_host(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            auth_base: base.clone(),
            api_base: base.clone(),
            content_base: base,
        }
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/oauth2/authorize", self.auth_base)
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.api_base)
    }

    /// RPC endpoint, e.g. `api("files/delete_v2")`.
    pub fn api(&self, route: &str) -> String {
        format!("{}/2/{}", self.api_base, route)
    }

    /// Content endpoint, e.g. `content("files/download")`.
    pub fn content(&self, route: &str) -> String {
        format!("{}/2/{}", self.content_base, route)
    }

    fn normalized(self) -> Result<Self> {
        Ok(Self {
            auth_base: normalize_base("auth_base", self.auth_base)?,
            api_base: normalize_base("api_base", self.api_base)?,
            content_base: normalize_base("content_base", self.content_base)?,
        })
    }
}

fn normalize_base(name: &str, value: String) -> Result<String> {
    let trimmed = value.trim_end_matches('/').to_string();
    let parsed = Url::parse(&trimmed)
        .map_err(|e| Error::Config(format!("Endpoint {} is not a valid URL: {}", name, e)))?;

    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(Error::Config(format!(
            "Endpoint {} must use http or https, got '{}'",
            name,
            parsed.scheme()
        )));
    }

    Ok(trimmed)
}

/// Core configuration for the Dropbox client.
///
/// Immutable once built. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Dropbox app key, sent as `client_id`
    pub app_key: String,

    /// Space-separated OAuth scopes; `None` requests the app's configured scopes
    pub auth_scope: Option<String>,

    /// Redirect URI registered for the app
    pub redirect_uri: String,

    pub endpoints: Endpoints,

    pub http_client: Arc<dyn HttpClient>,

    /// Where the credential record lives
    pub secure_store: Arc<dyn SecureStore>,

    /// Browser launcher for the authorize page; without one the host presents
    /// the URL returned by sign-in itself
    pub url_opener: Option<Arc<dyn UrlOpener>>,

    pub clock: Arc<dyn Clock>,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("app_key", &self.app_key)
            .field("auth_scope", &self.auth_scope)
            .field("redirect_uri", &self.redirect_uri)
            .field("endpoints", &self.endpoints)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field(
                "url_opener",
                &self.url_opener.as_ref().map(|_| "UrlOpener { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - App key is not empty and contains no whitespace
    /// - Redirect URI parses as an absolute URL
    /// - Event buffer size is within bounds
    pub fn validate(&self) -> Result<()> {
        if self.app_key.trim().is_empty() {
            return Err(Error::Config("App key cannot be empty".to_string()));
        }

        if self.app_key.chars().any(char::is_whitespace) {
            return Err(Error::Config(
                "App key must not contain whitespace".to_string(),
            ));
        }

        Url::parse(&self.redirect_uri).map_err(|e| {
            Error::Config(format!(
                "Redirect URI '{}' is not a valid absolute URL: {}",
                self.redirect_uri, e
            ))
        })?;

        if let Some(scope) = &self.auth_scope {
            if scope.trim().is_empty() {
                return Err(Error::Config(
                    "Auth scope cannot be blank; omit it to use the app's scopes".to_string(),
                ));
            }
        }

        if self.event_buffer_size == 0 || self.event_buffer_size > 10_000 {
            return Err(Error::Config(
                "Event buffer size must be between 1 and 10,000".to_string(),
            ));
        }

        Ok(())
    }

    /// Key under which the credential record is stored.
    ///
    /// Scoped by app key so two apps sharing a keychain do not collide.
    pub fn credentials_key(&self) -> String {
        format!("credentials:{}", self.app_key)
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Other hosts: inject an HttpClient that performs a single request and returns status and body."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn secure_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required for credential persistence. \
                 Desktop: enable the 'desktop-shims' feature to use the default KeyringSecureStore, \
                 or inject bridge_desktop::FileSecureStore on hosts without a keychain."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Ok(Arc::new(bridge_desktop::KeyringSecureStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(secure_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_url_opener() -> Option<Arc<dyn UrlOpener>> {
    Some(Arc::new(bridge_desktop::BrowserUrlOpener::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_url_opener() -> Option<Arc<dyn UrlOpener>> {
    None
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    app_key: Option<String>,
    auth_scope: Option<String>,
    redirect_uri: Option<String>,
    endpoints: Option<Endpoints>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    url_opener: Option<Arc<dyn UrlOpener>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the Dropbox app key.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder().app_key("abc123");
    /// ```
    pub fn app_key(mut self, app_key: impl Into<String>) -> Self {
        self.app_key = Some(app_key.into());
        self
    }

    /// Sets the requested OAuth scopes (space-separated).
    pub fn auth_scope(mut self, scope: impl Into<String>) -> Self {
        self.auth_scope = Some(scope.into());
        self
    }

    /// Sets the redirect URI. Incoming redirects are matched against it by prefix.
    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Overrides the Dropbox hosts. Mostly useful for tests and proxies.
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the reqwest-based desktop client is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the secure store implementation.
    ///
    /// If not provided, the OS keychain is used when the `desktop-shims`
    /// feature is enabled.
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn url_opener(mut self, opener: Arc<dyn UrlOpener>) -> Self {
        self.url_opener = Some(opener);
        self
    }

    /// Sets the time source used for token expiry. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns an error if:
    /// - App key or redirect URI is missing or invalid
    /// - An endpoint does not parse as an http(s) URL
    /// - A required bridge is missing and no desktop default is available
    pub fn build(self) -> Result<CoreConfig> {
        let app_key = self.app_key.ok_or_else(|| {
            Error::Config("App key is required. Use .app_key() to set it.".to_string())
        })?;

        let redirect_uri = self.redirect_uri.ok_or_else(|| {
            Error::Config("Redirect URI is required. Use .redirect_uri() to set it.".to_string())
        })?;

        let endpoints = self.endpoints.unwrap_or_default().normalized()?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let config = CoreConfig {
            app_key,
            auth_scope: self.auth_scope,
            redirect_uri,
            endpoints,
            http_client,
            secure_store,
            url_opener: self.url_opener.or_else(provide_default_url_opener),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, HttpRequest, HttpResponse};

    struct MockSecureStore;

    #[async_trait]
    impl SecureStore for MockSecureStore {
        async fn set_secret(
            &self,
            _key: &str,
            _value: &[u8],
        ) -> std::result::Result<(), BridgeError> {
            Ok(())
        }

        async fn get_secret(
            &self,
            _key: &str,
        ) -> std::result::Result<Option<Vec<u8>>, BridgeError> {
            Ok(None)
        }

        async fn delete_secret(&self, _key: &str) -> std::result::Result<(), BridgeError> {
            Ok(())
        }
    }

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, BridgeError> {
            Ok(HttpResponse::new(200, ""))
        }
    }

    fn base_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .app_key("appKey-test")
            .redirect_uri("db-appkey://oauth")
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = base_builder().build().unwrap();

        assert_eq!(config.app_key, "appKey-test");
        assert_eq!(config.redirect_uri, "db-appkey://oauth");
        assert_eq!(config.auth_scope, None);
        assert_eq!(config.endpoints, Endpoints::default());
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.credentials_key(), "credentials:appKey-test");
    }

    #[test]
    fn test_builder_requires_app_key() {
        let err = CoreConfig::builder()
            .redirect_uri("db-appkey://oauth")
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("App key is required"));
    }

    #[test]
    fn test_builder_requires_redirect_uri() {
        let err = CoreConfig::builder()
            .app_key("appKey-test")
            .http_client(Arc::new(MockHttpClient))
            .secure_store(Arc::new(MockSecureStore))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("Redirect URI is required"));
    }

    #[test]
    fn test_validate_rejects_blank_app_key() {
        let err = base_builder().app_key("   ").build().unwrap_err();
        assert!(err.to_string().contains("App key cannot be empty"));
    }

    #[test]
    fn test_validate_rejects_relative_redirect_uri() {
        let err = base_builder().redirect_uri("/oauth").build().unwrap_err();
        assert!(err.to_string().contains("not a valid absolute URL"));
    }

    #[test]
    fn test_validate_rejects_blank_scope() {
        let err = base_builder().auth_scope(" ").build().unwrap_err();
        assert!(err.to_string().contains("Auth scope cannot be blank"));
    }

    #[test]
    fn test_validate_rejects_zero_event_buffer() {
        let err = base_builder().event_buffer_size(0).build().unwrap_err();
        assert!(err.to_string().contains("Event buffer size"));
    }

    #[test]
    fn test_endpoints_trailing_slash_is_trimmed() {
        let config = base_builder()
            .endpoints(Endpoints::single_host("http://127.0.0.1:8080/"))
            .build()
            .unwrap();

        assert_eq!(
            config.endpoints.token_url(),
            "http://127.0.0.1:8080/oauth2/token"
        );
        assert_eq!(
            config.endpoints.content("files/download"),
            "http://127.0.0.1:8080/2/files/download"
        );
    }

    #[test]
    fn test_endpoints_reject_invalid_url() {
        let err = base_builder()
            .endpoints(Endpoints {
                api_base: "not a url".to_string(),
                ..Endpoints::default()
            })
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("api_base"));
    }

    #[test]
    fn test_endpoints_reject_non_http_scheme() {
        let err = base_builder()
            .endpoints(Endpoints::single_host("ftp://example.com"))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_default_endpoint_urls() {
        let endpoints = Endpoints::default();

        assert_eq!(
            endpoints.authorize_url(),
            "https://www.dropbox.com/oauth2/authorize"
        );
        assert_eq!(
            endpoints.token_url(),
            "https://api.dropboxapi.com/oauth2/token"
        );
        assert_eq!(
            endpoints.api("files/get_metadata"),
            "https://api.dropboxapi.com/2/files/get_metadata"
        );
        assert_eq!(
            endpoints.content("files/upload"),
            "https://content.dropboxapi.com/2/files/upload"
        );
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_http_client() {
        let err = CoreConfig::builder()
            .app_key("appKey-test")
            .redirect_uri("db-appkey://oauth")
            .secure_store(Arc::new(MockSecureStore))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::CapabilityMissing { ref capability, .. } if capability == "HttpClient"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_secure_store() {
        let err = CoreConfig::builder()
            .app_key("appKey-test")
            .redirect_uri("db-appkey://oauth")
            .http_client(Arc::new(MockHttpClient))
            .build()
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("SecureStore"));
        assert!(message.contains("credential persistence"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_url_opener_is_optional() {
        let config = base_builder().build().unwrap();
        assert!(config.url_opener.is_none());
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder()
            .app_key("appKey-test")
            .redirect_uri("db-appkey://oauth")
            .build()
            .expect("desktop defaults should succeed");

        assert!(config.url_opener.is_some());
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = base_builder().build().unwrap();
        let debug = format!("{:?}", config);

        assert!(debug.contains("appKey-test"));
        assert!(debug.contains("HttpClient { ... }"));
    }
}
