//! Credential persistence.
//!
//! The credential record is stored as one JSON document under a single key
//! in the host's [`SecureStore`]. All access goes through an async mutex so a
//! read-modify-write (token refresh) cannot interleave with a sign-out or a
//! second refresh and lose an update.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::CredentialStore;
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let store = CredentialStore::new(secure_store, "credentials:my-app-key");
//!
//! if let Some(credentials) = store.load().await? {
//!     println!("Signed in as {}", credentials.account_id);
//! }
//!
//! store.delete().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::Credentials;
use bridge_traits::storage::SecureStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Serialized access to the stored [`Credentials`].
///
/// Token values are never logged; failures are reported without exposing
/// the stored bytes.
#[derive(Clone)]
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        debug!(key = %key, "Initializing CredentialStore");
        Self {
            secure_store,
            key,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the stored record.
    ///
    /// Returns:
    /// - `Ok(Some(credentials))` if a valid record exists
    /// - `Ok(None)` if nothing is stored
    /// - `Err(TokenCorrupted)` if the record could not be decoded; the record
    ///   has been deleted by the time this returns
    pub async fn load(&self) -> Result<Option<Credentials>> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    /// Replace the stored record.
    pub async fn save(&self, credentials: &Credentials) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write(credentials).await?;
        info!(account_id = %credentials.account_id, "Credentials stored securely");
        Ok(())
    }

    /// Remove the stored record. Succeeds when nothing is stored.
    pub async fn delete(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.remove().await?;
        info!("Credentials deleted");
        Ok(())
    }

    /// Load, mutate and persist the record as one step.
    ///
    /// Returns the updated record, or `None` without writing anything when no
    /// record is stored. Nothing is written when `mutate` fails.
    pub async fn update<F>(&self, mutate: F) -> Result<Option<Credentials>>
    where
        F: FnOnce(&mut Credentials) -> Result<()>,
    {
        let _guard = self.lock.lock().await;

        let Some(mut credentials) = self.read().await? else {
            debug!("No credentials to update");
            return Ok(None);
        };

        mutate(&mut credentials)?;
        self.write(&credentials).await?;

        debug!(expires_at = %credentials.expires_at, "Credentials updated");
        Ok(Some(credentials))
    }

    async fn read(&self) -> Result<Option<Credentials>> {
        let data = self
            .secure_store
            .get_secret(&self.key)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to read credentials from secure storage");
                AuthError::from_storage(e)
            })?;

        let Some(data) = data else {
            debug!("No credentials found in storage");
            return Ok(None);
        };

        match serde_json::from_slice::<Credentials>(&data) {
            Ok(credentials) => Ok(Some(credentials)),
            Err(e) => {
                warn!(error = %e, "Stored credentials are corrupted, removing them");

                if let Err(delete_err) = self.secure_store.delete_secret(&self.key).await {
                    warn!(error = %delete_err, "Failed to delete corrupted credentials");
                }

                Err(AuthError::TokenCorrupted)
            }
        }
    }

    async fn write(&self, credentials: &Credentials) -> Result<()> {
        let json = serde_json::to_vec(credentials)
            .map_err(|e| AuthError::serialization("credential serialization", e))?;

        self.secure_store
            .set_secret(&self.key, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to write credentials to secure storage");
                AuthError::from_storage(e)
            })
    }

    async fn remove(&self) -> Result<()> {
        self.secure_store
            .delete_secret(&self.key)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete credentials from secure storage");
                AuthError::from_storage(e)
            })
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_credentials, MemorySecureStore};
    use chrono::{Duration, TimeZone, Utc};

    fn store() -> (Arc<MemorySecureStore>, CredentialStore) {
        let secure_store = Arc::new(MemorySecureStore::new());
        let store = CredentialStore::new(secure_store.clone(), "credentials:test");
        (secure_store, store)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (_, store) = store();
        let credentials = sample_credentials(Utc::now());

        store.save(&credentials).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(credentials));
    }

    #[tokio::test]
    async fn test_load_missing() {
        let (_, store) = store();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_is_camel_case_json() {
        let (secure_store, store) = store();
        store.save(&sample_credentials(Utc::now())).await.unwrap();

        let raw = secure_store.raw("credentials:test").await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["accessToken"], "access");
        assert_eq!(json["accountId"], "dbid:abc");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_, store) = store();
        store.save(&sample_credentials(Utc::now())).await.unwrap();

        store.delete().await.unwrap();
        store.delete().await.unwrap();

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupted_record_is_removed() {
        let (secure_store, store) = store();
        secure_store
            .set_secret("credentials:test", b"{not json")
            .await
            .unwrap();

        let error = store.load().await.unwrap_err();
        assert!(matches!(error, AuthError::TokenCorrupted));
        assert!(secure_store.raw("credentials:test").await.is_none());
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_without_record_writes_nothing() {
        let (secure_store, store) = store();

        let updated = store
            .update(|c| {
                c.access_token = "changed".to_string();
                Ok(())
            })
            .await
            .unwrap();

        assert!(updated.is_none());
        assert!(secure_store.raw("credentials:test").await.is_none());
    }

    #[tokio::test]
    async fn test_update_persists_mutation() {
        let (_, store) = store();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        store.save(&sample_credentials(now)).await.unwrap();

        let updated = store
            .update(|c| {
                c.access_token = "fresh".to_string();
                c.expires_at = now + Duration::hours(4);
                Ok(())
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.access_token, "fresh");
        assert_eq!(updated.refresh_token, "refresh");
        assert_eq!(store.load().await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_stored_record() {
        let (_, store) = store();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let original = sample_credentials(now);
        store.save(&original).await.unwrap();

        let result = store
            .update(|c| {
                c.access_token = "half-written".to_string();
                Err(AuthError::InvalidExpiry(-1))
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidExpiry(-1))));
        assert_eq!(store.load().await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let (_, store) = store();
        let mut credentials = sample_credentials(Utc::now());
        credentials.scope = String::new();
        store.save(&credentials).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .update(move |c| {
                            c.scope.push_str(&format!("{i};"));
                            Ok(())
                        })
                        .await
                        .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let scope = store.load().await.unwrap().unwrap().scope;
        assert_eq!(scope.matches(';').count(), 16);
    }

    #[tokio::test]
    async fn test_storage_failure_maps_to_unavailable() {
        let secure_store = Arc::new(MemorySecureStore::failing());
        let store = CredentialStore::new(secure_store, "credentials:test");

        let error = store.load().await.unwrap_err();
        assert!(matches!(error, AuthError::SecureStorageUnavailable(_)));
    }
}
