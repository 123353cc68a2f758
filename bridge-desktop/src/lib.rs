//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` (one attempt per request, no retries)
//! - `SecureStore` using the `keyring` crate (OS keychain)
//! - `SecureStore` backed by a permission-restricted JSON file, for headless hosts
//! - `UrlOpener` launching the system browser through the `open` crate
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{BrowserUrlOpener, FileSecureStore, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .app_key("my-app-key")
//!     .redirect_uri("myapp://oauth")
//!     .http_client(Arc::new(ReqwestHttpClient::new()))
//!     .secure_store(Arc::new(FileSecureStore::new()))
//!     .url_opener(Arc::new(BrowserUrlOpener::new()))
//!     .build()?;
//! ```

mod file_store;
mod http;
mod url_opener;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use file_store::FileSecureStore;
pub use http::ReqwestHttpClient;
pub use url_opener::BrowserUrlOpener;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
