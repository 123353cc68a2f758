//! # Authorization Manager
//!
//! Owns the Dropbox sign-in state machine.
//!
//! ## Overview
//!
//! ```text
//! SignedOut --sign_in()--> PendingRedirect --handle_redirect()--> SignedIn
//!     ^                          |                                   |
//!     +------cancel_sign_in()----+-----sign_out() / refresh failure--+
//! ```
//!
//! The PKCE verifier is held in memory only. Credentials are persisted through
//! [`CredentialStore`]. Every change of the signed-in flag is published on the
//! [`EventBus`] as `AuthEvent::SignedIn` / `AuthEvent::SignedOut`, and
//! [`AuthManager::signed_in_stream`] turns those into a `bool` stream.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::AuthManager;
//! use core_runtime::config::CoreConfig;
//! use core_runtime::events::EventBus;
//!
//! # async fn example(config: CoreConfig) -> core_auth::Result<()> {
//! let manager = AuthManager::new(&config, EventBus::new(config.event_buffer_size));
//!
//! let url = manager.sign_in().await?;
//! println!("Authorize at {url}");
//!
//! // Later, when the host receives the redirect:
//! let redirect = "db-app-key://oauth?code=abc";
//! if manager.handle_redirect(redirect).await? {
//!     assert!(manager.is_signed_in().await?);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::oauth::OAuthFlow;
use crate::pkce::{PkceUtils, S256Pkce};
use crate::token_store::CredentialStore;
use crate::types::{AuthState, Credentials};
use async_trait::async_trait;
use bridge_traits::platform::UrlOpener;
use bridge_traits::time::Clock;
use core_runtime::config::CoreConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Access to valid credentials for API calls.
///
/// Implemented by [`AuthManager`]; file operations depend on this seam so
/// they can be tested without a full authorization flow.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Refresh the access token if it has expired.
    async fn refresh_token(&self) -> Result<()>;

    /// The stored credentials, if signed in.
    async fn credentials(&self) -> Result<Option<Credentials>>;
}

pub struct AuthManager {
    flow: OAuthFlow,
    store: CredentialStore,
    pkce: Arc<dyn PkceUtils>,
    url_opener: Option<Arc<dyn UrlOpener>>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    pending_verifier: Mutex<Option<String>>,
    /// Last published signed-in value. Events are emitted while holding it.
    signed_in: Arc<Mutex<bool>>,
    refresh_lock: Mutex<()>,
}

impl AuthManager {
    pub fn new(config: &CoreConfig, event_bus: EventBus) -> Self {
        Self {
            flow: OAuthFlow::from_config(config),
            store: CredentialStore::new(
                Arc::clone(&config.secure_store),
                config.credentials_key(),
            ),
            pkce: Arc::new(S256Pkce),
            url_opener: config.url_opener.clone(),
            clock: Arc::clone(&config.clock),
            event_bus,
            pending_verifier: Mutex::new(None),
            signed_in: Arc::new(Mutex::new(false)),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Replace the verifier/challenge generator.
    pub fn with_pkce(mut self, pkce: Arc<dyn PkceUtils>) -> Self {
        self.pkce = pkce;
        self
    }

    /// Start an authorization flow.
    ///
    /// Caches a fresh verifier (replacing any earlier pending one), hands the
    /// authorization URL to the configured [`UrlOpener`] and returns it. A
    /// failing opener is logged and does not fail the call; the host can
    /// still present the returned URL itself.
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> Result<String> {
        let verifier = self.pkce.code_verifier();
        let challenge = self.pkce.code_challenge(&verifier);
        let url = self.flow.authorize_url(&challenge)?;

        *self.pending_verifier.lock().await = Some(verifier);
        self.emit(AuthEvent::SigningIn);

        match &self.url_opener {
            Some(opener) => {
                if let Err(e) = opener.open_url(&url).await {
                    warn!(error = %e, "Could not open authorization URL");
                }
            }
            None => debug!("No UrlOpener configured, host presents the URL"),
        }

        info!("Sign-in flow initiated");
        Ok(url)
    }

    /// Complete the flow from the redirect the host received.
    ///
    /// Returns `Ok(false)` without side effects when no sign-in is pending or
    /// `url` is not a redirect for this app. Returns `Ok(true)` once the code
    /// was exchanged and the credentials persisted.
    #[instrument(skip(self, url))]
    pub async fn handle_redirect(&self, url: &str) -> Result<bool> {
        let Some(verifier) = self.pending_verifier.lock().await.clone() else {
            debug!("Redirect ignored, no sign-in pending");
            return Ok(false);
        };

        if !url.starts_with(self.flow.redirect_uri()) {
            debug!("Redirect ignored, prefix does not match");
            return Ok(false);
        }

        let parsed =
            Url::parse(url).map_err(|e| AuthError::InvalidUrl(format!("Invalid redirect: {}", e)))?;

        let mut code = None;
        let mut error = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            warn!(error = %error, "Authorization was denied");
            return Err(self.report(AuthError::CodeError(error), false));
        }

        let Some(code) = code else {
            return Err(self.report(AuthError::CodeNotFoundInRedirectUrl, false));
        };

        let token = self
            .flow
            .exchange_code(&code, &verifier)
            .await
            .map_err(|e| self.report(e, true))?;

        let credentials = token
            .into_credentials(self.clock.now())
            .map_err(|e| self.report(e, false))?;

        // Held until the state is published so sign_out() cannot interleave.
        let mut pending = self.pending_verifier.lock().await;
        if pending.as_deref() != Some(verifier.as_str()) {
            debug!("Sign-in was cancelled during the code exchange, result dropped");
            return Ok(false);
        }

        self.store.save(&credentials).await?;
        *pending = None;
        self.set_signed_in(true, Some(credentials.account_id.clone()))
            .await;
        drop(pending);

        info!(account_id = %credentials.account_id, "Signed in");
        Ok(true)
    }

    /// Refresh the access token when it has expired.
    ///
    /// No-op when signed out or when the token is still valid. Concurrent
    /// callers are serialized; a caller that waited re-reads the record and
    /// finds it fresh. A rejected refresh deletes the credentials.
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> Result<()> {
        let _refresh = self.refresh_lock.lock().await;

        let Some(credentials) = self.load_credentials().await? else {
            debug!("No credentials, nothing to refresh");
            return Ok(());
        };

        if !credentials.is_expired(self.clock.now()) {
            debug!("Access token still valid");
            return Ok(());
        }

        info!("Access token expired, refreshing");
        self.emit(AuthEvent::TokenRefreshing);

        let refreshed = match self.flow.refresh(&credentials.refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(e @ AuthError::Response { .. }) => {
                warn!("Refresh rejected, discarding credentials");
                if let Err(delete_err) = self.store.delete().await {
                    warn!(error = %delete_err, "Failed to delete rejected credentials");
                }
                self.set_signed_in(false, None).await;
                return Err(self.report(e, false));
            }
            Err(e) => return Err(self.report(e, true)),
        };

        let now = self.clock.now();
        match self
            .store
            .update(|stored| refreshed.apply_to(stored, now))
            .await
            .map_err(|e| self.report(e, false))?
        {
            Some(updated) => {
                self.emit(AuthEvent::TokenRefreshed {
                    expires_at: updated.expires_at.timestamp(),
                });
                info!("Token refreshed");
            }
            None => debug!("Credentials removed during refresh, result dropped"),
        }

        Ok(())
    }

    /// Forget the credentials and any pending flow.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        *self.pending_verifier.lock().await = None;
        self.store.delete().await?;
        self.set_signed_in(false, None).await;
        info!("Signed out");
        Ok(())
    }

    /// Re-check the store and publish the result.
    pub async fn is_signed_in(&self) -> Result<bool> {
        let credentials = match self.load_credentials().await {
            Ok(credentials) => credentials,
            Err(AuthError::TokenCorrupted) => None,
            Err(e) => return Err(e),
        };

        let account_id = credentials.as_ref().map(|c| c.account_id.clone());
        let signed_in = credentials.is_some();
        self.set_signed_in(signed_in, account_id).await;
        Ok(signed_in)
    }

    /// Current signed-in value followed by every change.
    ///
    /// Each call gets its own subscription; all subscribers see the same
    /// values in the same order. Consecutive duplicates are suppressed. An
    /// observer that falls behind the event bus resumes from the current
    /// value.
    pub async fn signed_in_stream(&self) -> BoxStream<'static, bool> {
        if let Err(e) = self.is_signed_in().await {
            warn!(error = %e, "Could not re-check credentials, using last known state");
        }

        let (receiver, current) = {
            let state = self.signed_in.lock().await;
            (self.event_bus.subscribe(), *state)
        };
        let state = Arc::clone(&self.signed_in);

        let changes = stream::unfold(
            (receiver, state, current),
            |(mut receiver, state, mut last)| async move {
                loop {
                    let value = match receiver.recv().await {
                        Ok(CoreEvent::Auth(event)) => match event.signed_in_state() {
                            Some(value) => value,
                            None => continue,
                        },
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Signed-in observer lagged behind, resyncing");
                            *state.lock().await
                        }
                        Err(RecvError::Closed) => return None,
                    };

                    if value != last {
                        last = value;
                        return Some((value, (receiver, state, last)));
                    }
                }
            },
        );

        stream::once(async move { current }).chain(changes).boxed()
    }

    /// Abandon a pending sign-in. Returns whether one was pending.
    pub async fn cancel_sign_in(&self) -> bool {
        let cancelled = self.pending_verifier.lock().await.take().is_some();
        if cancelled {
            info!("Sign-in cancelled");
        }
        cancelled
    }

    pub async fn credentials(&self) -> Result<Option<Credentials>> {
        self.load_credentials().await
    }

    pub async fn current_state(&self) -> AuthState {
        if *self.signed_in.lock().await {
            AuthState::SignedIn
        } else if self.pending_verifier.lock().await.is_some() {
            AuthState::PendingRedirect
        } else {
            AuthState::SignedOut
        }
    }

    async fn load_credentials(&self) -> Result<Option<Credentials>> {
        match self.store.load().await {
            Err(AuthError::TokenCorrupted) => {
                self.set_signed_in(false, None).await;
                Err(AuthError::TokenCorrupted)
            }
            other => other,
        }
    }

    async fn set_signed_in(&self, value: bool, account_id: Option<String>) {
        let mut state = self.signed_in.lock().await;
        if *state == value {
            return;
        }
        *state = value;

        if value {
            self.emit(AuthEvent::SignedIn { account_id });
        } else {
            self.emit(AuthEvent::SignedOut);
        }
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }

    fn report(&self, error: AuthError, recoverable: bool) -> AuthError {
        self.emit(AuthEvent::AuthError {
            message: error.to_string(),
            recoverable,
        });
        error
    }
}

#[async_trait]
impl CredentialProvider for AuthManager {
    async fn refresh_token(&self) -> Result<()> {
        AuthManager::refresh_token(self).await
    }

    async fn credentials(&self) -> Result<Option<Credentials>> {
        AuthManager::credentials(self).await
    }
}
