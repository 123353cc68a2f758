//! # Authentication Module
//!
//! Dropbox OAuth 2.0 authorization (code flow with PKCE) and credential
//! lifecycle.
//!
//! ## Overview
//!
//! [`AuthManager`] drives the sign-in state machine: it issues the
//! authorization URL, completes the flow from the redirect, refreshes expired
//! access tokens and publishes signed-in changes on the event bus.
//! Credentials are persisted through the host's `SecureStore`.
//!
//! ## Features
//!
//! - Authorization code flow with PKCE (S256), offline access
//! - Refresh of expired access tokens, serialized across callers
//! - Secure credential storage via platform-specific secure stores
//! - Signed-in state as a broadcast stream

pub mod error;
pub mod manager;
pub mod oauth;
pub mod pkce;
pub mod token_store;
pub mod types;

#[cfg(test)]
mod test_support;

pub use error::{AuthError, Result};
pub use manager::{AuthManager, CredentialProvider};
pub use oauth::OAuthFlow;
pub use pkce::{PkceUtils, S256Pkce};
pub use token_store::CredentialStore;
pub use types::{AuthState, Credentials, RefreshResponse, TokenResponse};
