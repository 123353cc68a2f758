//! In-memory bridge doubles shared by the unit tests.

use crate::types::Credentials;
use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::platform::UrlOpener;
use bridge_traits::storage::SecureStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;

pub(crate) fn sample_credentials(expires_at: DateTime<Utc>) -> Credentials {
    Credentials {
        access_token: "access".to_string(),
        token_type: "bearer".to_string(),
        expires_at,
        refresh_token: "refresh".to_string(),
        scope: "files.metadata.read".to_string(),
        uid: "42".to_string(),
        account_id: "dbid:abc".to_string(),
    }
}

#[derive(Default)]
pub(crate) struct MemorySecureStore {
    storage: Mutex<HashMap<String, Vec<u8>>>,
    failing: bool,
}

impl MemorySecureStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every operation reports the store as unavailable.
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub(crate) async fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.storage.lock().await.get(key).cloned()
    }

    fn check(&self) -> BridgeResult<()> {
        if self.failing {
            Err(BridgeError::NotAvailable("keychain locked".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.check()?;
        self.storage
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.storage.lock().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.check()?;
        self.storage.lock().await.remove(key);
        Ok(())
    }
}

/// Remembers every URL it was asked to open.
#[derive(Default)]
pub(crate) struct RecordingUrlOpener {
    opened: StdMutex<Vec<String>>,
    fail: bool,
}

impl RecordingUrlOpener {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl UrlOpener for RecordingUrlOpener {
    async fn open_url(&self, url: &str) -> BridgeResult<()> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(url.to_string());
        }
        if self.fail {
            return Err(BridgeError::NotAvailable("no browser".to_string()));
        }
        Ok(())
    }
}
